//! Query execution subsystem
//!
//! Plans are trees of stages sharing one working set per query. The root is
//! driven by a `PlanRunner`; stages exchange `WorkingSetId`s, never records.
//!
//! # Stages
//!
//! - `MergeSortStage`: merges N sorted children, with optional dedup
//! - `IndexScan`: prefix scan over a compound index
//! - `FetchStage`: attaches record content to location-only members
//! - `QueuedDataStage`: replays scripted results
//!
//! # Yielding
//!
//! Between `work()` calls the runner may yield. While yielded, a record
//! that is about to be deleted or moved is announced through `invalidate`
//! before the write happens; stages holding that location must stop
//! depending on it.

mod errors;
mod fetch;
mod index_scan;
mod merge_sort;
mod queued;
mod result;
mod runner;
mod sort_pattern;
mod stage;
mod stats;
mod working_set;

pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use fetch::FetchStage;
pub use index_scan::{IndexScan, IndexScanParams};
pub use merge_sort::{MergeSortParams, MergeSortStage, MergeState};
pub use queued::QueuedDataStage;
pub use result::{ExecutionResult, ResultDocument};
pub use runner::PlanRunner;
pub use sort_pattern::{SortKey, SortPattern};
pub use stage::{ExecContext, PlanStage, StageState};
pub use stats::{
    CommonStats, FetchStats, IndexScanStats, MergeSortStats, SpecificStats, StageStats, StageType,
};
pub use working_set::{MemberState, WorkingSet, WorkingSetId, WorkingSetMember};
