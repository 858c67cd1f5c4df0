//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery merge --docs <path> --scan <pattern>[@<prefix>] ... --sort <pattern>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - sorted-stream merge execution over JSON documents
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge several index scans into one sorted stream
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// JSON lines file, one document per line
    #[arg(long)]
    pub docs: PathBuf,

    /// Index scan, e.g. `a:1,c:1@1` (index pattern, then equality prefix)
    #[arg(long = "scan", required = true)]
    pub scans: Vec<String>,

    /// Sort pattern shared by every scan, e.g. `c:1`
    #[arg(long)]
    pub sort: String,

    /// Emit duplicate records
    #[arg(long)]
    pub no_dedup: bool,

    /// Scan indexes backward and reverse the sort
    #[arg(long)]
    pub reverse: bool,

    /// Path to execution configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print plan statistics after the results
    #[arg(long)]
    pub explain: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
