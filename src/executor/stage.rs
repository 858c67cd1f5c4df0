//! Plan stage interface
//!
//! Stages form a tree and are driven by repeated `work()` calls from the
//! root. Between calls the executor may yield; the dataset can change
//! while yielded, and stages learn about records that are about to
//! disappear through `invalidate()`.

use crate::storage::{Collection, RecordLocation};

use super::errors::ExecutorError;
use super::stats::{StageStats, StageType};
use super::working_set::{WorkingSet, WorkingSetId};

/// Outcome of one `work()` call
#[derive(Debug, Clone, PartialEq)]
pub enum StageState {
    /// A record is ready
    Advanced(WorkingSetId),
    /// Progress was made but no record is ready; call again
    NeedsTime,
    /// No more records, ever
    Exhausted,
    /// The stage cannot continue
    Failure(ExecutorError),
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Advanced(_) => "ADVANCED",
            StageState::NeedsTime => "NEEDS_TIME",
            StageState::Exhausted => "EXHAUSTED",
            StageState::Failure(_) => "FAILURE",
        }
    }
}

/// What a stage may touch during a call.
///
/// Rebuilt for every call, so nothing borrowed from the collection
/// survives across a yield.
pub struct ExecContext<'a> {
    pub working_set: &'a mut WorkingSet,
    pub collection: &'a Collection,
}

impl<'a> ExecContext<'a> {
    pub fn new(working_set: &'a mut WorkingSet, collection: &'a Collection) -> Self {
        Self {
            working_set,
            collection,
        }
    }
}

/// A node of an execution tree
pub trait PlanStage {
    /// Do a bounded amount of work
    fn work(&mut self, ctx: &mut ExecContext<'_>) -> StageState;

    /// Returns true once the stage will only report `Exhausted`
    fn is_eof(&self) -> bool;

    /// Execution is about to suspend. Must be forwarded to children.
    fn prepare_to_yield(&mut self);

    /// Execution resumes. Must be forwarded to children.
    fn recover_from_yield(&mut self);

    /// `loc` is about to become undereferenceable. Must be forwarded to
    /// children; the record is still fetchable during this call unless it
    /// was already deleted.
    fn invalidate(&mut self, ctx: &mut ExecContext<'_>, loc: RecordLocation);

    fn stage_type(&self) -> StageType;

    fn stats(&self) -> StageStats;
}
