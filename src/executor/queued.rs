//! Queued data stage
//!
//! Replays a scripted sequence of results, then reports `Exhausted`.
//! Members are allocated into the working set when they are returned.

use std::collections::VecDeque;

use serde_json::Value;

use crate::storage::RecordLocation;

use super::errors::ExecutorError;
use super::stage::{ExecContext, PlanStage, StageState};
use super::stats::{CommonStats, SpecificStats, StageStats, StageType};
use super::working_set::WorkingSetMember;

#[derive(Debug, Clone)]
enum Scripted {
    Advanced(WorkingSetMember),
    NeedsTime,
    Failure(ExecutorError),
}

#[derive(Debug, Default)]
pub struct QueuedDataStage {
    queue: VecDeque<Scripted>,
    common: CommonStats,
}

impl QueuedDataStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a member to be returned as `Advanced`
    pub fn push_advanced(&mut self, member: WorkingSetMember) {
        self.queue.push_back(Scripted::Advanced(member));
    }

    /// Queue an owned document
    pub fn push_doc(&mut self, doc: Value) {
        self.push_advanced(WorkingSetMember::with_obj(doc));
    }

    pub fn push_needs_time(&mut self) {
        self.queue.push_back(Scripted::NeedsTime);
    }

    pub fn push_failure(&mut self, err: ExecutorError) {
        self.queue.push_back(Scripted::Failure(err));
    }

    /// Results still queued
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl PlanStage for QueuedDataStage {
    fn work(&mut self, ctx: &mut ExecContext<'_>) -> StageState {
        self.common.works += 1;
        match self.queue.pop_front() {
            Some(Scripted::Advanced(member)) => {
                self.common.advanced += 1;
                StageState::Advanced(ctx.working_set.allocate(member))
            }
            Some(Scripted::NeedsTime) => {
                self.common.needs_time += 1;
                StageState::NeedsTime
            }
            Some(Scripted::Failure(err)) => StageState::Failure(err),
            None => {
                self.common.is_eof = true;
                StageState::Exhausted
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.queue.is_empty()
    }

    fn prepare_to_yield(&mut self) {
        self.common.yields += 1;
    }

    fn recover_from_yield(&mut self) {
        self.common.unyields += 1;
    }

    fn invalidate(&mut self, _ctx: &mut ExecContext<'_>, _loc: RecordLocation) {
        self.common.invalidates += 1;
    }

    fn stage_type(&self) -> StageType {
        StageType::QueuedData
    }

    fn stats(&self) -> StageStats {
        StageStats {
            stage: StageType::QueuedData,
            common: self.common.clone(),
            specific: SpecificStats::None,
            children: Vec::new(),
        }
    }
}
