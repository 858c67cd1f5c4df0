//! CLI command implementations
//!
//! `merge` loads a JSON lines file into an in-memory collection, builds one
//! index scan per `--scan`, merges them under `--sort` and prints the
//! fetched documents in order.

use std::io::{self, Write};

use serde_json::{json, Value};

use crate::config::ExecConfig;
use crate::executor::{
    FetchStage, IndexScan, IndexScanParams, MergeSortParams, MergeSortStage, PlanRunner,
    SortPattern,
};
use crate::index::{IndexKey, KeyPattern, ScanDirection};
use crate::observability::Logger;
use crate::storage::Collection;

use super::args::{Cli, Command, MergeArgs};
use super::errors::{CliError, CliResult};
use super::io::{read_documents, write_line};

/// Dispatch a parsed command, writing results to stdout
pub fn run_command(cli: Cli) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Merge(args) => {
            merge(&args, &mut out)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// A parsed `--scan` argument
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSpec {
    pub pattern: KeyPattern,
    pub prefix: Vec<IndexKey>,
}

/// Parse `a:1,c:1@1` or `a:1,c:1@"x",2`.
///
/// The prefix is a comma separated list of JSON values matched against the
/// leading index fields. Without `@` the whole index is scanned.
pub fn parse_scan(text: &str) -> CliResult<ScanSpec> {
    let (pattern_text, prefix_text) = match text.split_once('@') {
        Some((pattern, prefix)) => (pattern, Some(prefix)),
        None => (text, None),
    };
    let pattern = KeyPattern::parse(pattern_text)?;

    let prefix = match prefix_text {
        Some(p) if !p.trim().is_empty() => {
            let values: Vec<Value> = serde_json::from_str(&format!("[{}]", p)).map_err(|e| {
                CliError::invalid_argument(format!("bad scan prefix '{}': {}", p, e))
            })?;
            values.iter().map(IndexKey::from_json).collect()
        }
        _ => Vec::new(),
    };
    if prefix.len() > pattern.len() {
        return Err(CliError::invalid_argument(format!(
            "scan prefix has {} values but index '{}' has {} fields",
            prefix.len(),
            pattern,
            pattern.len()
        )));
    }
    Ok(ScanSpec { pattern, prefix })
}

/// Run a merge, writing one JSON line per result. Returns the number of
/// documents written.
pub fn merge(args: &MergeArgs, out: &mut dyn Write) -> CliResult<u64> {
    let config = match &args.config {
        Some(path) => ExecConfig::load(path)?,
        None => ExecConfig::default(),
    };
    Logger::set_min_severity(config.severity()?);

    let mut sort = SortPattern::parse(&args.sort)?;
    let direction = if args.reverse {
        sort = SortPattern::new(sort.key_pattern().reversed());
        ScanDirection::Backward
    } else {
        ScanDirection::Forward
    };
    let scans = args
        .scans
        .iter()
        .map(|s| parse_scan(s))
        .collect::<CliResult<Vec<_>>>()?;

    let mut collection = Collection::new("cli");
    for doc in read_documents(&args.docs)? {
        collection.insert(doc)?;
    }

    let params = MergeSortParams::new(sort)
        .with_dedup(config.dedup && !args.no_dedup)
        .with_max_children(config.max_children);
    let mut merge = MergeSortStage::new(params);
    for scan in scans {
        let index_name = collection.create_index(scan.pattern)?;
        let params = IndexScanParams::new(index_name, scan.prefix).with_direction(direction);
        merge.add_child(Box::new(IndexScan::new(params)))?;
    }

    let mut runner = PlanRunner::new(Box::new(FetchStage::new(Box::new(merge))), &config);
    let mut written = 0;
    while let Some(doc) = runner.get_next(&collection)? {
        write_line(out, &doc.body)?;
        written += 1;
    }

    if args.explain {
        let stats = serde_json::to_value(runner.stats())?;
        write_line(out, &json!({ "explain": stats }))?;
    }
    Ok(written)
}
