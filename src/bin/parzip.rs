//! Parallel ZIP archiver (parzip) - Main binary entry point

use parzip::cli::args::{PackArgs, default_output_path, parse_args};
use parzip::cli::output::{format_json, format_text, progress_line};
use parzip::models::ProgressSnapshot;
use parzip::{ArchiveOptions, RunStatus};
use std::process;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            println!("parzip {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        _ => {}
    }

    let pack_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    // Per-file lines are log records; RUST_LOG overrides the default level
    let default_level = if pack_args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    process::exit(handle_pack(&pack_args));
}

fn handle_pack(args: &PackArgs) -> i32 {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.root));

    let mut opts = ArchiveOptions {
        naming: args.naming,
        compression: args.compression,
        level: args.level,
        prefetch_limit: args.prefetch_limit,
        follow_symlinks: args.follow_symlinks,
        comment: args.comment.clone(),
        ..ArchiveOptions::default()
    };

    if let Some(workers) = args.workers {
        opts.workers = workers;
    }
    if let Some(max_pending) = args.max_pending {
        opts.max_pending = max_pending;
    }

    if let Some(interval_secs) = args.progress_interval_secs {
        opts.progress_interval = Duration::from_secs(interval_secs);
        opts.progress_byte_trigger = u64::MAX;
    }

    if !args.quiet {
        opts.progress_notifier = Some(Arc::new(|snapshot: &ProgressSnapshot| {
            eprintln!("{}", progress_line(snapshot));
        }));

        eprintln!("Archiving: {} -> {output}", args.root);
    }

    let summary = match parzip::archive_directory(&args.root, &output, &opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return match e {
                parzip::Error::InvalidInput(_) => 2,
                parzip::Error::Traversal { partial, .. } => {
                    if !args.quiet {
                        eprintln!(
                            "Partial archive left at {} ({} entries)",
                            partial.output,
                            partial.entries.len()
                        );
                    }
                    4
                }
                _ => 4,
            };
        }
    };

    if args.json {
        println!("{}", format_json(&summary));
    } else {
        format_text(&summary);
    }

    match summary.status() {
        RunStatus::Success => 0,
        RunStatus::PartialSuccess | RunStatus::Failure => 3,
    }
}

fn print_help() {
    println!("Parallel ZIP archiver (parzip) - Archive a directory tree into one ZIP file");
    println!();
    println!("USAGE:");
    println!("    parzip <ROOT> [--output <FILE>] [OPTIONS]");
    println!();
    println!("GLOBAL OPTIONS:");
    println!("    -h, --help                 Show this help message");
    println!("    -v, --version              Show version information");
    println!();
    println!("OPTIONS:");
    println!("    -o, --output <FILE>       Archive to create (default: <ROOT name>.zip)");
    println!("    --workers <N>             Reader threads (default: available parallelism)");
    println!("    --max-pending <N>         Files in flight at once (default: 4 x workers)");
    println!("    --naming <MODE>           Entry names: relative (default) or basename");
    println!("    --compression <METHOD>    deflate (default) or stored");
    println!("    --level <1-9>             Deflate compression level");
    println!("    --prefetch-limit <BYTES>  Read files up to this size before locking the writer");
    println!("    --follow-symlinks         Archive symlink targets instead of skipping links");
    println!("    --comment <TEXT>          Store an archive comment");
    println!("    --progress-interval <S>   Emit progress updates every S seconds (default: 2)");
    println!("    --json                    Emit machine-readable output");
    println!("    -q, --quiet               Suppress per-file and progress output");
    println!();
    println!("EXIT CODES:");
    println!("    0  every file archived");
    println!("    2  invalid arguments or root directory");
    println!("    3  archive written, but some files failed");
    println!("    4  fatal error (output not writable, traversal failed)");
    println!();
    println!("EXAMPLES:");
    println!("    parzip generated_images --output images.zip");
    println!("    parzip /data --naming basename --compression stored --workers 8");
    println!("    RUST_LOG=debug parzip ./site -o site.zip --json");
}
