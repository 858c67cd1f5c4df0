//! Fetch stage
//!
//! Attaches record content to location-only members produced by its child.

use crate::observability::{Event, Logger};
use crate::storage::{RecordFetch, RecordLocation};

use super::errors::{ExecutorError, ExecutorResult};
use super::stage::{ExecContext, PlanStage, StageState};
use super::stats::{CommonStats, FetchStats, SpecificStats, StageStats, StageType};
use super::working_set::WorkingSetId;

pub struct FetchStage {
    child: Box<dyn PlanStage>,
    common: CommonStats,
    specific: FetchStats,
}

impl FetchStage {
    pub fn new(child: Box<dyn PlanStage>) -> Self {
        Self {
            child,
            common: CommonStats::default(),
            specific: FetchStats::default(),
        }
    }

    fn fetch_member(
        &mut self,
        ctx: &mut ExecContext<'_>,
        id: WorkingSetId,
    ) -> ExecutorResult<StageState> {
        let collection = ctx.collection;
        let member = ctx.working_set.try_get_mut(id)?;
        if member.has_obj() {
            self.specific.already_has_obj += 1;
            return Ok(StageState::Advanced(id));
        }

        let loc = member.loc().ok_or_else(|| {
            ExecutorError::execution_failed(format!("member {} has no content or location", id))
        })?;
        match collection.fetch(loc)? {
            Some(doc) => {
                member.materialize(doc);
                self.specific.docs_fetched += 1;
                Ok(StageState::Advanced(id))
            }
            None => {
                // Deleted between the scan and the fetch
                Logger::trace(Event::FetchMissingRecord, &[("loc", &loc.to_string())]);
                ctx.working_set.free(id)?;
                self.specific.docs_deleted += 1;
                Ok(StageState::NeedsTime)
            }
        }
    }
}

impl PlanStage for FetchStage {
    fn work(&mut self, ctx: &mut ExecContext<'_>) -> StageState {
        self.common.works += 1;
        let state = match self.child.work(ctx) {
            StageState::Advanced(id) => match self.fetch_member(ctx, id) {
                Ok(state) => state,
                Err(err) => StageState::Failure(err),
            },
            other => other,
        };
        match &state {
            StageState::Advanced(_) => self.common.advanced += 1,
            StageState::NeedsTime => self.common.needs_time += 1,
            StageState::Exhausted => self.common.is_eof = true,
            StageState::Failure(_) => {}
        }
        state
    }

    fn is_eof(&self) -> bool {
        self.child.is_eof()
    }

    fn prepare_to_yield(&mut self) {
        self.common.yields += 1;
        self.child.prepare_to_yield();
    }

    fn recover_from_yield(&mut self) {
        self.common.unyields += 1;
        self.child.recover_from_yield();
    }

    fn invalidate(&mut self, ctx: &mut ExecContext<'_>, loc: RecordLocation) {
        self.common.invalidates += 1;
        self.child.invalidate(ctx, loc);
    }

    fn stage_type(&self) -> StageType {
        StageType::Fetch
    }

    fn stats(&self) -> StageStats {
        StageStats {
            stage: StageType::Fetch,
            common: self.common.clone(),
            specific: SpecificStats::Fetch(self.specific.clone()),
            children: vec![self.child.stats()],
        }
    }
}
