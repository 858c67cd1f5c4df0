//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - merge: merge index scans over a JSON lines file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, MergeArgs};
pub use commands::{merge, parse_scan, run_command, ScanSpec};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_documents, write_line};

/// Parse process arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args())
}
