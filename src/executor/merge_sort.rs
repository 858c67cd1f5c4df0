//! Merge sort stage
//!
//! Merges the outputs of N children, each already ordered by the same sort
//! pattern, into one ordered stream. One result per child is buffered at a
//! time; the minimal buffered result is emitted on each `work()` call.
//! With dedup enabled a record reached through several children is emitted
//! once, at its first appearance.
//!
//! Buffered results may reference a location that is invalidated while the
//! query is yielded. Such results are fetched (if not already) and detached
//! from the location so they can still be emitted in order. A detached
//! result keeps its former location as its identity, so dedup still
//! recognizes it.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::observability::{Event, Logger, Severity};
use crate::storage::{RecordFetch, RecordLocation};

use super::errors::{ExecutorError, ExecutorResult};
use super::sort_pattern::{SortKey, SortPattern};
use super::stage::{ExecContext, PlanStage, StageState};
use super::stats::{CommonStats, MergeSortStats, SpecificStats, StageStats, StageType};
use super::working_set::WorkingSetId;

/// Merge configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct MergeSortParams {
    pub pattern: SortPattern,
    /// Emit each record at most once
    pub dedup: bool,
    /// Upper bound on registered children
    pub max_children: usize,
}

impl MergeSortParams {
    /// Dedup is on by default
    pub fn new(pattern: SortPattern) -> Self {
        Self {
            pattern,
            dedup: true,
            max_children: usize::MAX,
        }
    }

    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }
}

/// Lifecycle of the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Accepting children; not yet worked
    Init,
    Running,
    Exhausted,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
enum BufferSlot {
    Empty,
    Pending { id: WorkingSetId, key: SortKey },
    Eof,
}

struct MergeChild {
    stage: Box<dyn PlanStage>,
    slot: BufferSlot,
    /// Key of the child's last result, for order checking
    last_key: Option<SortKey>,
}

/// Merges N sorted children into one sorted stream
pub struct MergeSortStage {
    params: MergeSortParams,
    children: Vec<MergeChild>,
    seen: HashSet<RecordLocation>,
    state: MergeState,
    failure: Option<ExecutorError>,
    common: CommonStats,
    specific: MergeSortStats,
}

impl MergeSortStage {
    pub fn new(params: MergeSortParams) -> Self {
        let specific = MergeSortStats {
            sort_pattern: params.pattern.to_string(),
            dedup: params.dedup,
            ..MergeSortStats::default()
        };
        Self {
            params,
            children: Vec::new(),
            seen: HashSet::new(),
            state: MergeState::Init,
            failure: None,
            common: CommonStats::default(),
            specific,
        }
    }

    /// Register a child. Only valid before the first `work()` call.
    ///
    /// The child must produce results ordered by this stage's pattern.
    pub fn add_child(&mut self, child: Box<dyn PlanStage>) -> ExecutorResult<()> {
        if self.state != MergeState::Init {
            return Err(ExecutorError::invalid_state(
                "children can only be added before the merge starts",
            ));
        }
        if self.children.len() >= self.params.max_children {
            return Err(ExecutorError::invalid_state(format!(
                "merge accepts at most {} children",
                self.params.max_children
            )));
        }
        self.children.push(MergeChild {
            stage: child,
            slot: BufferSlot::Empty,
            last_key: None,
        });
        Ok(())
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Number of results currently buffered
    pub fn buffered(&self) -> usize {
        self.children
            .iter()
            .filter(|c| matches!(c.slot, BufferSlot::Pending { .. }))
            .count()
    }

    pub fn params(&self) -> &MergeSortParams {
        &self.params
    }

    fn fail(&mut self, err: ExecutorError) -> StageState {
        self.state = MergeState::Failed;
        self.failure = Some(err.clone());
        StageState::Failure(err)
    }

    /// Buffer a child's result, checking it does not sort before the
    /// child's previous result.
    fn buffer(
        &mut self,
        ctx: &mut ExecContext<'_>,
        idx: usize,
        id: WorkingSetId,
    ) -> ExecutorResult<()> {
        let member = ctx.working_set.try_get_mut(id)?;
        let key = self.params.pattern.key_for(member);

        let child = &mut self.children[idx];
        if let Some(last) = &child.last_key {
            if self.params.pattern.compare(&key, last) == Ordering::Less {
                let reason = format!("{} after {}", key, last);
                Logger::error(
                    Event::SortOrderViolation,
                    &[("child", &idx.to_string()), ("reason", &reason)],
                );
                return Err(ExecutorError::inconsistent_sort_key(idx, reason));
            }
        }
        child.last_key = Some(key.clone());
        child.slot = BufferSlot::Pending { id, key };
        Ok(())
    }

    /// Child holding the minimal pending key. Ties go to the lowest index.
    fn select_min(&self) -> Option<(usize, WorkingSetId)> {
        let mut best: Option<(usize, WorkingSetId, &SortKey)> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if let BufferSlot::Pending { id, key } = &child.slot {
                let better = match &best {
                    Some((_, _, best_key)) => {
                        self.params.pattern.compare(key, best_key) == Ordering::Less
                    }
                    None => true,
                };
                if better {
                    best = Some((idx, *id, key));
                }
            }
        }
        best.map(|(idx, id, _)| (idx, id))
    }

    fn emit(&mut self, ctx: &mut ExecContext<'_>, id: WorkingSetId) -> ExecutorResult<StageState> {
        if !self.params.dedup {
            return Ok(StageState::Advanced(id));
        }

        self.specific.dups_tested += 1;
        let identity = ctx.working_set.try_get(id)?.identity();
        if let Some(loc) = identity {
            if !self.seen.insert(loc) {
                self.specific.dups_dropped += 1;
                if Logger::enabled(Severity::Trace) {
                    Logger::trace(Event::DuplicateDropped, &[("loc", &loc.to_string())]);
                }
                ctx.working_set.free(id)?;
                return Ok(StageState::NeedsTime);
            }
        }
        Ok(StageState::Advanced(id))
    }

    /// Resolve a buffered member tied to `loc` ahead of its invalidation.
    ///
    /// Returns false if the member had to be dropped.
    fn protect_buffered(
        &mut self,
        ctx: &mut ExecContext<'_>,
        id: WorkingSetId,
        loc: RecordLocation,
    ) -> bool {
        let collection = ctx.collection;
        let member = match ctx.working_set.try_get_mut(id) {
            Ok(member) => member,
            Err(_) => return false,
        };
        if member.loc() != Some(loc) {
            return true;
        }

        if !member.has_obj() {
            match collection.fetch(loc) {
                Ok(Some(doc)) => {
                    member.materialize(doc);
                    self.specific.forced_fetches += 1;
                    Logger::trace(Event::ForcedFetch, &[("loc", &loc.to_string())]);
                }
                Ok(None) => {
                    Logger::warn(
                        Event::BufferedRecordDropped,
                        &[("loc", &loc.to_string()), ("reason", "record deleted")],
                    );
                    return false;
                }
                Err(err) => {
                    Logger::warn(
                        Event::BufferedRecordDropped,
                        &[("loc", &loc.to_string()), ("reason", &err.to_string())],
                    );
                    return false;
                }
            }
        }

        member.detach_from_loc();
        true
    }
}

impl PlanStage for MergeSortStage {
    fn work(&mut self, ctx: &mut ExecContext<'_>) -> StageState {
        self.common.works += 1;

        match self.state {
            MergeState::Exhausted => return StageState::Exhausted,
            MergeState::Failed => {
                let err = self
                    .failure
                    .clone()
                    .unwrap_or_else(|| ExecutorError::invalid_state("merge already failed"));
                return StageState::Failure(err);
            }
            MergeState::Init => self.state = MergeState::Running,
            MergeState::Running => {}
        }

        // Every empty slot gets one pull per call
        for idx in 0..self.children.len() {
            if self.children[idx].slot != BufferSlot::Empty {
                continue;
            }
            match self.children[idx].stage.work(ctx) {
                StageState::Advanced(id) => {
                    if let Err(err) = self.buffer(ctx, idx, id) {
                        // Rejected members are never buffered
                        let _ = ctx.working_set.free(id);
                        return self.fail(err);
                    }
                }
                StageState::NeedsTime => {
                    self.common.needs_time += 1;
                    return StageState::NeedsTime;
                }
                StageState::Exhausted => self.children[idx].slot = BufferSlot::Eof,
                StageState::Failure(err) => return self.fail(err),
            }
        }

        let (idx, id) = match self.select_min() {
            Some(winner) => winner,
            None => {
                self.state = MergeState::Exhausted;
                self.common.is_eof = true;
                return StageState::Exhausted;
            }
        };
        self.children[idx].slot = BufferSlot::Empty;

        match self.emit(ctx, id) {
            Ok(StageState::Advanced(id)) => {
                self.common.advanced += 1;
                StageState::Advanced(id)
            }
            Ok(other) => {
                self.common.needs_time += 1;
                other
            }
            Err(err) => self.fail(err),
        }
    }

    fn is_eof(&self) -> bool {
        match self.state {
            MergeState::Exhausted => true,
            MergeState::Init => false,
            MergeState::Running | MergeState::Failed => self
                .children
                .iter()
                .all(|c| c.slot == BufferSlot::Eof),
        }
    }

    fn prepare_to_yield(&mut self) {
        self.common.yields += 1;
        for child in &mut self.children {
            child.stage.prepare_to_yield();
        }
    }

    fn recover_from_yield(&mut self) {
        self.common.unyields += 1;
        for child in &mut self.children {
            child.stage.recover_from_yield();
        }
    }

    fn invalidate(&mut self, ctx: &mut ExecContext<'_>, loc: RecordLocation) {
        self.common.invalidates += 1;
        for child in &mut self.children {
            child.stage.invalidate(ctx, loc);
        }

        for idx in 0..self.children.len() {
            let id = match &self.children[idx].slot {
                BufferSlot::Pending { id, .. } => *id,
                _ => continue,
            };
            if !self.protect_buffered(ctx, id, loc) {
                // Stale handles are simply forgotten
                let _ = ctx.working_set.free(id);
                self.children[idx].slot = BufferSlot::Empty;
                self.specific.dropped_on_invalidate += 1;
            }
        }
    }

    fn stage_type(&self) -> StageType {
        StageType::MergeSort
    }

    fn stats(&self) -> StageStats {
        let mut common = self.common.clone();
        common.is_eof = self.is_eof();
        StageStats {
            stage: StageType::MergeSort,
            common,
            specific: SpecificStats::MergeSort(self.specific.clone()),
            children: self.children.iter().map(|c| c.stage.stats()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::queued::QueuedDataStage;
    use crate::executor::working_set::{WorkingSet, WorkingSetMember};
    use crate::storage::Collection;
    use serde_json::{json, Value};

    fn owned_child(values: &[i64]) -> Box<dyn PlanStage> {
        let mut stage = QueuedDataStage::new();
        for v in values {
            stage.push_advanced(WorkingSetMember::with_obj(json!({ "c": v })));
        }
        Box::new(stage)
    }

    fn drain(stage: &mut MergeSortStage, ws: &mut WorkingSet, coll: &Collection) -> Vec<Value> {
        let mut out = Vec::new();
        loop {
            let mut ctx = ExecContext::new(ws, coll);
            match stage.work(&mut ctx) {
                StageState::Advanced(id) => out.push(ws.free(id).unwrap().into_obj().unwrap()),
                StageState::NeedsTime => continue,
                StageState::Exhausted => return out,
                StageState::Failure(err) => panic!("unexpected failure: {}", err),
            }
        }
    }

    fn c_values(docs: &[Value]) -> Vec<i64> {
        docs.iter().map(|d| d["c"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_merges_two_children() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        stage.add_child(owned_child(&[1, 4, 5])).unwrap();
        stage.add_child(owned_child(&[2, 3, 6])).unwrap();

        let out = drain(&mut stage, &mut ws, &coll);
        assert_eq!(c_values(&out), vec![1, 2, 3, 4, 5, 6]);
        assert!(stage.is_eof());
        assert!(ws.is_empty());
    }

    #[test]
    fn test_no_children_is_immediately_exhausted() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        let mut ctx = ExecContext::new(&mut ws, &coll);
        assert_eq!(stage.work(&mut ctx), StageState::Exhausted);
        assert_eq!(stage.state(), MergeState::Exhausted);
    }

    #[test]
    fn test_add_child_after_start_is_rejected() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        stage.add_child(owned_child(&[1])).unwrap();
        let mut ctx = ExecContext::new(&mut ws, &coll);
        stage.work(&mut ctx);

        let err = stage.add_child(owned_child(&[2])).unwrap_err();
        assert_eq!(err.code().code(), "AERO_INVALID_STATE");
    }

    #[test]
    fn test_max_children_enforced() {
        let params = MergeSortParams::new(SortPattern::parse("c:1").unwrap()).with_max_children(1);
        let mut stage = MergeSortStage::new(params);
        stage.add_child(owned_child(&[1])).unwrap();
        assert!(stage.add_child(owned_child(&[2])).is_err());
    }

    #[test]
    fn test_ties_prefer_lower_child_index() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));

        let mut first = QueuedDataStage::new();
        first.push_advanced(WorkingSetMember::with_obj(json!({"c": 1, "from": 0})));
        let mut second = QueuedDataStage::new();
        second.push_advanced(WorkingSetMember::with_obj(json!({"c": 1, "from": 1})));
        stage.add_child(Box::new(second)).unwrap();
        stage.add_child(Box::new(first)).unwrap();

        let out = drain(&mut stage, &mut ws, &coll);
        assert_eq!(out[0]["from"], 1);
        assert_eq!(out[1]["from"], 0);
    }

    #[test]
    fn test_out_of_order_child_fails() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        stage.add_child(owned_child(&[5, 3])).unwrap();
        stage.add_child(owned_child(&[10])).unwrap();

        let mut failure = None;
        for _ in 0..10 {
            let mut ctx = ExecContext::new(&mut ws, &coll);
            match stage.work(&mut ctx) {
                StageState::Advanced(id) => {
                    ws.free(id).unwrap();
                }
                StageState::Failure(err) => {
                    failure = Some(err);
                    break;
                }
                _ => {}
            }
        }
        let err = failure.expect("merge should fail");
        assert_eq!(err.code().code(), "AERO_INCONSISTENT_SORT_KEY");
        assert_eq!(stage.state(), MergeState::Failed);
        // Only the other child's buffered result is still live
        assert_eq!(ws.len(), 1);

        // Failed is terminal
        let mut ctx = ExecContext::new(&mut ws, &coll);
        assert!(matches!(stage.work(&mut ctx), StageState::Failure(_)));
    }

    #[test]
    fn test_child_failure_propagates_verbatim() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        let mut bad = QueuedDataStage::new();
        bad.push_failure(ExecutorError::child_failure("scan aborted"));
        stage.add_child(Box::new(bad)).unwrap();

        let mut ctx = ExecContext::new(&mut ws, &coll);
        match stage.work(&mut ctx) {
            StageState::Failure(err) => {
                assert_eq!(err, ExecutorError::child_failure("scan aborted"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_child_needs_time_is_passed_up() {
        let coll = Collection::new("t");
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        let mut slow = QueuedDataStage::new();
        slow.push_needs_time();
        slow.push_advanced(WorkingSetMember::with_obj(json!({"c": 1})));
        stage.add_child(Box::new(slow)).unwrap();

        let mut ctx = ExecContext::new(&mut ws, &coll);
        assert_eq!(stage.work(&mut ctx), StageState::NeedsTime);
        assert!(matches!(stage.work(&mut ctx), StageState::Advanced(_)));
    }

    #[test]
    fn test_dedup_by_location() {
        let mut coll = Collection::new("t");
        let loc = coll.insert(json!({"c": 1})).unwrap();
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        for _ in 0..2 {
            let mut child = QueuedDataStage::new();
            child.push_advanced(WorkingSetMember::with_loc(loc).with_key_data(vec![(
                "c".to_string(),
                crate::index::IndexKey::from_int(1),
            )]));
            stage.add_child(Box::new(child)).unwrap();
        }

        let mut advanced = 0;
        loop {
            let mut ctx = ExecContext::new(&mut ws, &coll);
            match stage.work(&mut ctx) {
                StageState::Advanced(id) => {
                    advanced += 1;
                    ws.free(id).unwrap();
                }
                StageState::NeedsTime => {}
                StageState::Exhausted => break,
                StageState::Failure(err) => panic!("{}", err),
            }
        }
        assert_eq!(advanced, 1);
        let stats = stage.stats();
        let merge = stats.merge_sort().unwrap();
        assert_eq!(merge.dups_dropped, 1);
        assert_eq!(merge.dups_tested, 2);
        assert!(ws.is_empty());
    }

    #[test]
    fn test_invalidate_materializes_and_detaches_buffered() {
        let mut coll = Collection::new("t");
        let loc = coll.insert(json!({"c": 2})).unwrap();
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        stage.add_child(owned_child(&[1])).unwrap();
        let mut child = QueuedDataStage::new();
        child.push_advanced(
            WorkingSetMember::with_loc(loc)
                .with_key_data(vec![("c".to_string(), crate::index::IndexKey::from_int(2))]),
        );
        stage.add_child(Box::new(child)).unwrap();

        let first = {
            let mut ctx = ExecContext::new(&mut ws, &coll);
            match stage.work(&mut ctx) {
                StageState::Advanced(id) => id,
                other => panic!("expected advance, got {:?}", other),
            }
        };
        assert_eq!(ws.free(first).unwrap().into_obj().unwrap()["c"], 1);

        stage.prepare_to_yield();
        {
            let mut ctx = ExecContext::new(&mut ws, &coll);
            stage.invalidate(&mut ctx, loc);
        }
        stage.recover_from_yield();
        coll.remove(loc).unwrap();

        let mut ctx = ExecContext::new(&mut ws, &coll);
        let id = match stage.work(&mut ctx) {
            StageState::Advanced(id) => id,
            other => panic!("expected advance, got {:?}", other),
        };
        let member = ws.get(id);
        assert!(!member.has_loc());
        assert_eq!(member.obj(), Some(&json!({"c": 2})));
        assert_eq!(stage.stats().merge_sort().unwrap().forced_fetches, 1);
    }

    #[test]
    fn test_invalidate_drops_buffered_when_record_gone() {
        let mut coll = Collection::new("t");
        let loc = coll.insert(json!({"c": 2})).unwrap();
        let mut ws = WorkingSet::new();
        let mut stage = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        let mut child = QueuedDataStage::new();
        child.push_advanced(
            WorkingSetMember::with_loc(loc)
                .with_key_data(vec![("c".to_string(), crate::index::IndexKey::from_int(2))]),
        );
        stage.add_child(Box::new(child)).unwrap();
        stage.add_child(owned_child(&[1])).unwrap();

        // Buffers both, emits c=1
        let mut ctx = ExecContext::new(&mut ws, &coll);
        assert!(matches!(stage.work(&mut ctx), StageState::Advanced(_)));
        assert_eq!(stage.buffered(), 1);

        coll.remove(loc).unwrap();
        let mut ctx = ExecContext::new(&mut ws, &coll);
        stage.invalidate(&mut ctx, loc);
        assert_eq!(stage.buffered(), 0);
        assert_eq!(stage.stats().merge_sort().unwrap().dropped_on_invalidate, 1);
        assert_eq!(stage.work(&mut ctx), StageState::Exhausted);
    }
}
