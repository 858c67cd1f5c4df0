//! Plan runner
//!
//! Owns a query's working set and root stage, and drives the root until it
//! produces a document, reaches EOF or fails. The runner is also the point
//! where writers coordinate with a running query: mutations that move or
//! delete a record go through `invalidate` first.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::config::ExecConfig;
use crate::observability::{Event, Logger, MetricsRegistry, Severity};
use crate::storage::{Collection, RecordFetch, RecordLocation};

use super::errors::{ExecutorError, ExecutorResult};
use super::result::{ExecutionResult, ResultDocument};
use super::stage::{ExecContext, PlanStage, StageState};
use super::stats::{SpecificStats, StageStats};
use super::working_set::{WorkingSet, WorkingSetId};

#[derive(Debug, Clone, PartialEq)]
enum RunnerStatus {
    Active,
    Eof,
    Failed(ExecutorError),
}

pub struct PlanRunner {
    query_id: Uuid,
    working_set: WorkingSet,
    root: Box<dyn PlanStage>,
    yield_every_works: u64,
    works_since_yield: u64,
    metrics: Arc<MetricsRegistry>,
    status: RunnerStatus,
    returned: u64,
}

impl PlanRunner {
    pub fn new(root: Box<dyn PlanStage>, config: &ExecConfig) -> Self {
        Self::with_metrics(root, config, Arc::new(MetricsRegistry::new()))
    }

    /// Runner reporting into a shared metrics registry
    pub fn with_metrics(
        root: Box<dyn PlanStage>,
        config: &ExecConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let query_id = Uuid::new_v4();
        Logger::info(
            Event::QueryBegin,
            &[
                ("query_id", &query_id.to_string()),
                ("root", root.stage_type().as_str()),
            ],
        );
        Self {
            query_id,
            working_set: WorkingSet::new(),
            root,
            yield_every_works: config.yield_every_works,
            works_since_yield: 0,
            metrics,
            status: RunnerStatus::Active,
            returned: 0,
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Next document, or `None` at EOF
    pub fn get_next(&mut self, collection: &Collection) -> ExecutorResult<Option<ResultDocument>> {
        match &self.status {
            RunnerStatus::Active => {}
            RunnerStatus::Eof => return Ok(None),
            RunnerStatus::Failed(err) => return Err(err.clone()),
        }

        loop {
            if self.yield_every_works > 0 && self.works_since_yield >= self.yield_every_works {
                self.save_state();
                self.restore_state();
            }
            self.works_since_yield += 1;

            let state = {
                let mut ctx = ExecContext::new(&mut self.working_set, collection);
                self.root.work(&mut ctx)
            };

            match state {
                StageState::Advanced(id) => match self.extract_result(collection, id) {
                    Ok(Some(doc)) => {
                        self.returned += 1;
                        self.metrics.increment_documents_returned();
                        return Ok(Some(doc));
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        self.finish(Some(err.clone()));
                        return Err(err);
                    }
                },
                StageState::NeedsTime => continue,
                StageState::Exhausted => {
                    self.finish(None);
                    return Ok(None);
                }
                StageState::Failure(err) => {
                    self.finish(Some(err.clone()));
                    return Err(err);
                }
            }
        }
    }

    /// Run to EOF, collecting every document
    pub fn collect_all(&mut self, collection: &Collection) -> ExecutorResult<ExecutionResult> {
        let mut documents = Vec::new();
        while let Some(doc) = self.get_next(collection)? {
            documents.push(doc);
        }
        Ok(ExecutionResult {
            documents,
            stats: self.stats(),
        })
    }

    /// Prepare the plan for a yield. The collection may change until
    /// `restore_state`, provided every move or delete is announced through
    /// `invalidate`.
    pub fn save_state(&mut self) {
        self.root.prepare_to_yield();
        self.metrics.increment_yields();
        self.works_since_yield = 0;
        if Logger::enabled(Severity::Trace) {
            Logger::trace(Event::PlanYield, &[("query_id", &self.query_id.to_string())]);
        }
    }

    pub fn restore_state(&mut self) {
        self.root.recover_from_yield();
        if Logger::enabled(Severity::Trace) {
            Logger::trace(Event::PlanUnyield, &[("query_id", &self.query_id.to_string())]);
        }
    }

    /// Announce that `loc` is about to be deleted or moved.
    ///
    /// Must be called while the record is still present.
    pub fn invalidate(&mut self, collection: &Collection, loc: RecordLocation) {
        let mut ctx = ExecContext::new(&mut self.working_set, collection);
        self.root.invalidate(&mut ctx, loc);
        self.metrics.increment_invalidations();
        Logger::trace(
            Event::LocationInvalidated,
            &[
                ("query_id", &self.query_id.to_string()),
                ("loc", &loc.to_string()),
            ],
        );
    }

    /// Delete a record on behalf of a concurrent writer
    pub fn remove_document(
        &mut self,
        collection: &mut Collection,
        loc: RecordLocation,
    ) -> ExecutorResult<Value> {
        self.invalidate(collection, loc);
        Ok(collection.remove(loc)?)
    }

    /// Update a record on behalf of a concurrent writer.
    ///
    /// Invalidates first only if the update moves the record.
    pub fn update_document(
        &mut self,
        collection: &mut Collection,
        loc: RecordLocation,
        doc: Value,
    ) -> ExecutorResult<RecordLocation> {
        if collection.would_relocate(loc, &doc)? {
            self.invalidate(collection, loc);
        }
        Ok(collection.update(loc, doc)?)
    }

    pub fn stats(&self) -> StageStats {
        self.root.stats()
    }

    pub fn is_eof(&self) -> bool {
        self.status == RunnerStatus::Eof
    }

    /// Location-only results reaching the root are fetched here
    /// Free a root result and turn it into a document. `None` if the
    /// record disappeared before it could be fetched.
    fn extract_result(
        &mut self,
        collection: &Collection,
        id: WorkingSetId,
    ) -> ExecutorResult<Option<ResultDocument>> {
        let member = self.working_set.free(id)?;
        let loc = member.loc();
        let body = match member.into_obj() {
            Some(body) => body,
            None => match self.fetch_root_result(collection, loc)? {
                Some(body) => body,
                None => return Ok(None),
            },
        };
        Ok(Some(ResultDocument::new(loc, body)))
    }

    fn fetch_root_result(
        &self,
        collection: &Collection,
        loc: Option<RecordLocation>,
    ) -> ExecutorResult<Option<Value>> {
        let loc = loc.ok_or_else(|| {
            ExecutorError::execution_failed("result has neither content nor location")
        })?;
        Ok(collection.fetch(loc)?)
    }

    fn finish(&mut self, failure: Option<ExecutorError>) {
        let stats = self.root.stats();
        let (forced, dups) = merge_totals(&stats);
        self.metrics.add_forced_fetches(forced);
        self.metrics.add_duplicates_dropped(dups);

        let query_id = self.query_id.to_string();
        match failure {
            None => {
                self.metrics.increment_queries_executed();
                Logger::info(
                    Event::QueryComplete,
                    &[
                        ("query_id", &query_id),
                        ("returned", &self.returned.to_string()),
                        ("works", &stats.common.works.to_string()),
                    ],
                );
                self.status = RunnerStatus::Eof;
            }
            Some(err) => {
                self.metrics.increment_queries_failed();
                Logger::error(
                    Event::QueryFailed,
                    &[
                        ("query_id", &query_id),
                        ("code", err.code().code()),
                        ("reason", err.message()),
                    ],
                );
                self.status = RunnerStatus::Failed(err);
            }
        }
    }
}

/// Forced fetches and dropped duplicates summed over every merge in the tree
fn merge_totals(stats: &StageStats) -> (u64, u64) {
    let own = match &stats.specific {
        SpecificStats::MergeSort(m) => (m.forced_fetches, m.dups_dropped),
        _ => (0, 0),
    };
    stats.children.iter().fold(own, |(f, d), child| {
        let (cf, cd) = merge_totals(child);
        (f + cf, d + cd)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::merge_sort::{MergeSortParams, MergeSortStage};
    use crate::executor::queued::QueuedDataStage;
    use crate::executor::sort_pattern::SortPattern;
    use crate::executor::working_set::WorkingSetMember;
    use serde_json::json;

    fn queued(values: &[i64]) -> Box<dyn PlanStage> {
        let mut stage = QueuedDataStage::new();
        for v in values {
            stage.push_doc(json!({ "c": v }));
        }
        Box::new(stage)
    }

    #[test]
    fn test_collects_merged_documents() {
        let coll = Collection::new("t");
        let mut merge = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        merge.add_child(queued(&[1, 3])).unwrap();
        merge.add_child(queued(&[2])).unwrap();
        let mut runner = PlanRunner::new(Box::new(merge), &ExecConfig::default());

        let result = runner.collect_all(&coll).unwrap();
        let cs: Vec<i64> = result.iter().map(|d| d.body["c"].as_i64().unwrap()).collect();
        assert_eq!(cs, vec![1, 2, 3]);
        assert!(runner.is_eof());
        assert!(runner.working_set().is_empty());
        assert_eq!(runner.metrics().snapshot().documents_returned, 3);
        assert_eq!(runner.metrics().snapshot().queries_executed, 1);

        // EOF is sticky
        assert_eq!(runner.get_next(&coll).unwrap(), None);
    }

    #[test]
    fn test_auto_yield_reaches_every_stage() {
        let coll = Collection::new("t");
        let mut merge = MergeSortStage::new(MergeSortParams::new(SortPattern::parse("c:1").unwrap()));
        merge.add_child(queued(&[1, 2, 3, 4])).unwrap();
        let config = ExecConfig {
            yield_every_works: 2,
            ..ExecConfig::default()
        };
        let mut runner = PlanRunner::new(Box::new(merge), &config);
        runner.collect_all(&coll).unwrap();

        let stats = runner.stats();
        assert!(stats.common.yields >= 2);
        assert_eq!(stats.common.yields, stats.common.unyields);
        assert_eq!(stats.children[0].common.yields, stats.common.yields);
    }

    #[test]
    fn test_failure_is_sticky() {
        let coll = Collection::new("t");
        let mut bad = QueuedDataStage::new();
        bad.push_failure(ExecutorError::child_failure("gone"));
        let mut runner = PlanRunner::new(Box::new(bad), &ExecConfig::default());

        assert!(runner.get_next(&coll).is_err());
        assert!(runner.get_next(&coll).is_err());
        assert_eq!(runner.metrics().snapshot().queries_failed, 1);
    }

    #[test]
    fn test_location_only_results_are_fetched() {
        let mut coll = Collection::new("t");
        let loc = coll.insert(json!({"c": 9})).unwrap();
        let mut stage = QueuedDataStage::new();
        stage.push_advanced(WorkingSetMember::with_loc(loc));
        let mut runner = PlanRunner::new(Box::new(stage), &ExecConfig::default());

        let doc = runner.get_next(&coll).unwrap().unwrap();
        assert_eq!(doc.loc, Some(loc));
        assert_eq!(doc.body, json!({"c": 9}));
    }

    #[test]
    fn test_corrupt_root_result_fails_query() {
        let mut coll = Collection::new("t");
        let loc = coll.insert(json!({"c": 9})).unwrap();
        assert!(coll.corrupt_record(loc));
        let mut stage = QueuedDataStage::new();
        stage.push_advanced(WorkingSetMember::with_loc(loc));
        let mut runner = PlanRunner::new(Box::new(stage), &ExecConfig::default());

        let err = runner.get_next(&coll).unwrap_err();
        assert_eq!(err.code().code(), "AERO_DATA_CORRUPTION");
        assert_eq!(runner.metrics().snapshot().queries_failed, 1);
        assert!(runner.working_set().is_empty());

        // The failure is sticky, not retried
        assert_eq!(runner.get_next(&coll).unwrap_err(), err);
    }

    #[test]
    fn test_remove_document_invalidates_first() {
        let mut coll = Collection::new("t");
        let loc = coll.insert(json!({"c": 9})).unwrap();
        let mut stage = QueuedDataStage::new();
        stage.push_doc(json!({"c": 1}));
        let mut runner = PlanRunner::new(Box::new(stage), &ExecConfig::default());

        runner.save_state();
        let removed = runner.remove_document(&mut coll, loc).unwrap();
        runner.restore_state();
        assert_eq!(removed, json!({"c": 9}));
        assert_eq!(runner.stats().common.invalidates, 1);
        assert_eq!(runner.metrics().snapshot().invalidations, 1);
    }
}
