//! CLI argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nupkg-verify")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Path to the .nupkg file to verify
    #[arg(long = "filePath", visible_alias = "file-path", value_name = "PATH")]
    pub file_path: PathBuf,

    /// Version the package is expected to carry
    #[arg(long, value_name = "VERSION")]
    pub version: String,

    /// Load the expectation table from a JSON file instead of the built-in one
    #[arg(long, value_name = "FILE")]
    pub expectations: Option<PathBuf>,

    /// Dump package metadata and every file after the report
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print failed checks and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long)]
    pub json: bool,
}
