use std::path::PathBuf;

use clap::Parser;

/// Parse a fixed-record binary log and report any new messages.
#[derive(Debug, Parser)]
#[command(name = "binmon", version, about)]
pub struct Args {
    /// File name to read/parse/report from
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Configuration file
    #[arg(long)]
    pub config: PathBuf,

    /// Run but do NOT send any messages
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Provide debugging output
    #[arg(long)]
    pub debug: bool,

    /// Directory for rolling log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}
