//! Command-line front end: argument parsing and report formatting

pub mod args;
pub mod output;
