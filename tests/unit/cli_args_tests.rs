//! Unit tests for CLI argument parsing

use parzip::cli::args::parse_args;
use parzip::{Compression, EntryNaming};

fn make_args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn parse_minimal_invocation_uses_defaults() {
    let parsed = parse_args(&make_args(&["parzip", "generated_images"])).expect("parse args");

    assert_eq!(parsed.root, "generated_images");
    assert!(parsed.output.is_none());
    assert_eq!(parsed.naming, EntryNaming::RelativePath);
    assert_eq!(parsed.compression, Compression::Deflate);
    assert!(parsed.workers.is_none());
    assert!(!parsed.quiet);
}

#[test]
fn parse_full_invocation() {
    let argv = make_args(&[
        "parzip",
        "/tmp/work",
        "--output",
        "out.zip",
        "--workers",
        "8",
        "--max-pending",
        "32",
        "--naming",
        "basename",
        "--compression",
        "deflate",
        "--level",
        "9",
        "--prefetch-limit",
        "0",
        "--follow-symlinks",
        "--json",
        "--quiet",
    ]);

    let parsed = parse_args(&argv).expect("parse args");
    assert_eq!(parsed.output.as_deref(), Some("out.zip"));
    assert_eq!(parsed.workers, Some(8));
    assert_eq!(parsed.max_pending, Some(32));
    assert_eq!(parsed.naming, EntryNaming::BaseName);
    assert_eq!(parsed.level, Some(9));
    assert_eq!(parsed.prefetch_limit, 0);
    assert!(parsed.follow_symlinks);
    assert!(parsed.json);
    assert!(parsed.quiet);
}

#[test]
fn output_flag_requires_value() {
    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--output"]))
        .expect_err("output flag without value should fail");
    assert!(err.contains("--output requires a file path"));
}

#[test]
fn workers_must_be_positive() {
    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--workers", "0"]))
        .expect_err("zero workers should be rejected");
    assert!(err.contains("greater than zero"));

    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--workers", "many"]))
        .expect_err("non-numeric workers should be rejected");
    assert!(err.contains("positive integer"));
}

#[test]
fn unknown_naming_is_rejected() {
    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--naming", "hashed"]))
        .expect_err("unknown naming should fail");
    assert!(err.contains("unknown naming 'hashed'"));
}

#[test]
fn level_out_of_range_is_rejected() {
    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--level", "12"]))
        .expect_err("level 12 should fail");
    assert!(err.contains("between 1 and 9"));
}

#[test]
fn level_bounds_are_one_to_nine() {
    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--level", "0"]))
        .expect_err("level 0 should fail");
    assert!(err.contains("between 1 and 9"));

    let lowest = parse_args(&make_args(&["parzip", "/tmp/work", "--level", "1"])).unwrap();
    assert_eq!(lowest.level, Some(1));
    let highest = parse_args(&make_args(&["parzip", "/tmp/work", "--level", "9"])).unwrap();
    assert_eq!(highest.level, Some(9));
}

#[test]
fn level_conflicts_with_stored() {
    let err = parse_args(&make_args(&[
        "parzip",
        "/tmp/work",
        "--level",
        "3",
        "--compression",
        "stored",
    ]))
    .expect_err("level with stored should fail");
    assert!(err.contains("cannot be combined"));
}

#[test]
fn second_positional_is_unexpected() {
    let err = parse_args(&make_args(&["parzip", "a", "b"])).expect_err("two roots should fail");
    assert!(err.contains("Unexpected argument: b"));
}

#[test]
fn progress_interval_requires_positive_value() {
    let err = parse_args(&make_args(&["parzip", "/tmp/work", "--progress-interval", "0"]))
        .expect_err("progress interval of zero should be rejected");
    assert!(err.contains("greater than zero"));

    let parsed = parse_args(&make_args(&["parzip", "/tmp/work", "--progress-interval", "5"]))
        .expect("parse args");
    assert_eq!(parsed.progress_interval_secs, Some(5));
}
