//! Per-stage execution statistics
//!
//! Every stage keeps common counters plus stage-specific ones. `stats()`
//! on a stage returns a tree mirroring the plan, serializable for explain
//! output.

use std::fmt;

use serde::Serialize;

/// Kind of plan stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    MergeSort,
    IndexScan,
    Fetch,
    QueuedData,
}

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::MergeSort => "MERGE_SORT",
            StageType::IndexScan => "INDEX_SCAN",
            StageType::Fetch => "FETCH",
            StageType::QueuedData => "QUEUED_DATA",
        }
    }
}

/// Counters shared by every stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommonStats {
    pub works: u64,
    pub advanced: u64,
    pub needs_time: u64,
    pub yields: u64,
    pub unyields: u64,
    pub invalidates: u64,
    pub is_eof: bool,
}

/// Merge sort counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSortStats {
    pub sort_pattern: String,
    pub dedup: bool,
    pub dups_tested: u64,
    pub dups_dropped: u64,
    pub forced_fetches: u64,
    pub dropped_on_invalidate: u64,
}

/// Index scan counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexScanStats {
    pub index_name: String,
    pub direction: String,
    pub keys_examined: u64,
}

/// Fetch counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub already_has_obj: u64,
    pub docs_fetched: u64,
    pub docs_deleted: u64,
}

/// Stage-specific counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecificStats {
    None,
    MergeSort(MergeSortStats),
    IndexScan(IndexScanStats),
    Fetch(FetchStats),
}

/// Statistics tree for a stage and its children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub stage: StageType,
    pub common: CommonStats,
    pub specific: SpecificStats,
    pub children: Vec<StageStats>,
}

impl StageStats {
    /// First stage of the given type, depth first
    pub fn find(&self, stage: StageType) -> Option<&StageStats> {
        if self.stage == stage {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(stage))
    }

    /// Merge sort counters of this node, if it is a merge sort
    pub fn merge_sort(&self) -> Option<&MergeSortStats> {
        match &self.specific {
            SpecificStats::MergeSort(stats) => Some(stats),
            _ => None,
        }
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let c = &self.common;
        writeln!(
            f,
            "{}{} works={} advanced={} needs_time={} yields={} invalidates={} eof={}",
            pad,
            self.stage.as_str(),
            c.works,
            c.advanced,
            c.needs_time,
            c.yields,
            c.invalidates,
            c.is_eof
        )?;
        match &self.specific {
            SpecificStats::MergeSort(m) => writeln!(
                f,
                "{}  sort={} dedup={} dups_tested={} dups_dropped={} forced_fetches={} dropped_on_invalidate={}",
                pad,
                m.sort_pattern,
                m.dedup,
                m.dups_tested,
                m.dups_dropped,
                m.forced_fetches,
                m.dropped_on_invalidate
            )?,
            SpecificStats::IndexScan(s) => writeln!(
                f,
                "{}  index={} direction={} keys_examined={}",
                pad, s.index_name, s.direction, s.keys_examined
            )?,
            SpecificStats::Fetch(s) => writeln!(
                f,
                "{}  already_has_obj={} docs_fetched={} docs_deleted={}",
                pad, s.already_has_obj, s.docs_fetched, s.docs_deleted
            )?,
            SpecificStats::None => {}
        }
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for StageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
