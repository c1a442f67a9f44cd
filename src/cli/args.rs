//! CLI argument parsing

use crate::{Compression, DEFAULT_PREFETCH_LIMIT, EntryNaming};

#[derive(Debug, Clone)]
pub struct PackArgs {
    pub root: String,
    pub output: Option<String>,
    pub workers: Option<usize>,
    pub max_pending: Option<usize>,
    pub naming: EntryNaming,
    pub compression: Compression,
    pub level: Option<i64>,
    pub prefetch_limit: u64,
    pub follow_symlinks: bool,
    pub comment: Option<String>,
    pub progress_interval_secs: Option<u64>,
    pub json: bool,
    pub quiet: bool,
}

impl Default for PackArgs {
    fn default() -> Self {
        Self {
            root: String::new(),
            output: None,
            workers: None,
            max_pending: None,
            naming: EntryNaming::RelativePath,
            compression: Compression::Deflate,
            level: None,
            prefetch_limit: DEFAULT_PREFETCH_LIMIT,
            follow_symlinks: false,
            comment: None,
            progress_interval_secs: None,
            json: false,
            quiet: false,
        }
    }
}

fn take_value<'a>(
    args: &'a [String],
    i: &mut usize,
    flag: &str,
    what: &str,
) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires {what}"))
}

fn parse_positive(value: &str, flag: &str) -> Result<usize, String> {
    let n: usize = value
        .parse()
        .map_err(|_| format!("{flag} must be a positive integer"))?;
    if n == 0 {
        return Err(format!("{flag} must be greater than zero"));
    }
    Ok(n)
}

/// Parse command line arguments (`args[0]` is the program name)
pub fn parse_args(args: &[String]) -> Result<PackArgs, String> {
    if args.len() < 2 {
        return Err("Missing required argument: ROOT".to_string());
    }

    let args = &args[1..];
    let mut pack = PackArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                let value = take_value(args, &mut i, "--output", "a file path")?;
                pack.output = Some(value.to_string());
            }
            "--workers" => {
                let value = take_value(args, &mut i, "--workers", "a value")?;
                pack.workers = Some(parse_positive(value, "--workers")?);
            }
            "--max-pending" => {
                let value = take_value(args, &mut i, "--max-pending", "a value")?;
                pack.max_pending = Some(parse_positive(value, "--max-pending")?);
            }
            "--naming" => {
                let value = take_value(args, &mut i, "--naming", "a value")?;
                pack.naming = value.parse()?;
            }
            "--compression" => {
                let value = take_value(args, &mut i, "--compression", "a value")?;
                pack.compression = value.parse()?;
            }
            "--level" => {
                let value = take_value(args, &mut i, "--level", "a value")?;
                let level: i64 = value
                    .parse()
                    .map_err(|_| "--level must be a number".to_string())?;
                if !(1..=9).contains(&level) {
                    return Err("--level must be between 1 and 9".to_string());
                }
                pack.level = Some(level);
            }
            "--prefetch-limit" => {
                let value = take_value(args, &mut i, "--prefetch-limit", "a byte count")?;
                pack.prefetch_limit = value
                    .parse()
                    .map_err(|_| "--prefetch-limit must be a byte count".to_string())?;
            }
            "--follow-symlinks" => {
                pack.follow_symlinks = true;
            }
            "--comment" => {
                let value = take_value(args, &mut i, "--comment", "a value")?;
                pack.comment = Some(value.to_string());
            }
            "--progress-interval" => {
                let value = take_value(args, &mut i, "--progress-interval", "a value")?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| "--progress-interval must be a positive integer".to_string())?;
                if secs == 0 {
                    return Err("--progress-interval must be greater than zero".to_string());
                }
                pack.progress_interval_secs = Some(secs);
            }
            "--json" => {
                pack.json = true;
            }
            "--quiet" | "-q" => {
                pack.quiet = true;
            }
            arg if !arg.starts_with('-') => {
                if pack.root.is_empty() {
                    pack.root = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            other => return Err(format!("Unknown option: {other}")),
        }
        i += 1;
    }

    if pack.root.is_empty() {
        return Err("Missing required argument: ROOT".to_string());
    }

    if pack.level.is_some() && pack.compression == Compression::Stored {
        return Err("--level cannot be combined with --compression stored".to_string());
    }

    Ok(pack)
}

/// Output path used when `--output` is omitted: `<root name>.zip` in the working directory
#[must_use]
pub fn default_output_path(root: &str) -> String {
    let name = std::path::Path::new(root)
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "archive".to_string());
    format!("{name}.zip")
}
