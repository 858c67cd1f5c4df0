//! JSON I/O handling for CLI
//!
//! - Input: JSON lines, one document per line; blank lines ignored
//! - Output: one JSON value per line
//! - UTF-8 only

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read every document of a JSON lines file
pub fn read_documents(path: &Path) -> CliResult<Vec<Value>> {
    let file = File::open(path)
        .map_err(|e| CliError::io_error(format!("{}: {}", path.display(), e)))?;
    let mut docs = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Value = serde_json::from_str(&line).map_err(|e| {
            CliError::io_error(format!("{} line {}: {}", path.display(), n + 1, e))
        })?;
        if !doc.is_object() {
            return Err(CliError::invalid_argument(format!(
                "{} line {}: document must be a JSON object",
                path.display(),
                n + 1
            )));
        }
        docs.push(doc);
    }
    Ok(docs)
}

/// Write a value as one JSON line
pub fn write_line(out: &mut dyn Write, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
