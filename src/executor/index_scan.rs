//! Index scan stage
//!
//! Walks the entries of one index whose leading key values equal a fixed
//! prefix, producing location-only members that carry the entry's key
//! values. Position is kept as the last returned entry, not a cursor, so
//! entries inserted or removed while yielded are tolerated.

use crate::index::{IndexEntry, IndexError, IndexKey, ScanDirection};
use crate::storage::RecordLocation;

use super::errors::ExecutorError;
use super::stage::{ExecContext, PlanStage, StageState};
use super::stats::{CommonStats, IndexScanStats, SpecificStats, StageStats, StageType};
use super::working_set::WorkingSetMember;

/// What to scan
#[derive(Debug, Clone)]
pub struct IndexScanParams {
    pub index_name: String,
    /// Equality values for the leading index fields
    pub prefix: Vec<IndexKey>,
    pub direction: ScanDirection,
}

impl IndexScanParams {
    /// Forward scan of `index_name` restricted to `prefix`
    pub fn new(index_name: impl Into<String>, prefix: Vec<IndexKey>) -> Self {
        Self {
            index_name: index_name.into(),
            prefix,
            direction: ScanDirection::Forward,
        }
    }

    pub fn with_direction(mut self, direction: ScanDirection) -> Self {
        self.direction = direction;
        self
    }
}

pub struct IndexScan {
    params: IndexScanParams,
    position: Option<IndexEntry>,
    positioned: bool,
    eof: bool,
    common: CommonStats,
    specific: IndexScanStats,
}

impl IndexScan {
    pub fn new(params: IndexScanParams) -> Self {
        let specific = IndexScanStats {
            index_name: params.index_name.clone(),
            direction: match params.direction {
                ScanDirection::Forward => "forward".to_string(),
                ScanDirection::Backward => "backward".to_string(),
            },
            keys_examined: 0,
        };
        Self {
            params,
            position: None,
            positioned: false,
            eof: false,
            common: CommonStats::default(),
            specific,
        }
    }
}

impl PlanStage for IndexScan {
    fn work(&mut self, ctx: &mut ExecContext<'_>) -> StageState {
        self.common.works += 1;
        if self.eof {
            return StageState::Exhausted;
        }

        let collection = ctx.collection;
        let tree = match collection.index(&self.params.index_name) {
            Some(tree) => tree,
            None => {
                let err = IndexError::not_found(&self.params.index_name);
                return StageState::Failure(ExecutorError::child_failure(err.to_string()));
            }
        };

        if !self.positioned {
            self.positioned = true;
            self.common.needs_time += 1;
            return StageState::NeedsTime;
        }

        let entry = match tree.next_in_prefix(
            &self.params.prefix,
            self.position.as_ref(),
            self.params.direction,
        ) {
            Some(entry) => entry,
            None => {
                self.eof = true;
                self.common.is_eof = true;
                return StageState::Exhausted;
            }
        };
        self.specific.keys_examined += 1;

        let key_data = tree
            .pattern()
            .fields()
            .iter()
            .zip(entry.keys())
            .map(|(field, key)| (field.path.clone(), key.clone()))
            .collect();
        let id = ctx
            .working_set
            .allocate(WorkingSetMember::with_loc(entry.loc()).with_key_data(key_data));
        self.position = Some(entry.clone());
        self.common.advanced += 1;
        StageState::Advanced(id)
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn prepare_to_yield(&mut self) {
        self.common.yields += 1;
    }

    fn recover_from_yield(&mut self) {
        self.common.unyields += 1;
    }

    fn invalidate(&mut self, _ctx: &mut ExecContext<'_>, _loc: RecordLocation) {
        // Resumes by key, nothing refers to the location
        self.common.invalidates += 1;
    }

    fn stage_type(&self) -> StageType {
        StageType::IndexScan
    }

    fn stats(&self) -> StageStats {
        StageStats {
            stage: StageType::IndexScan,
            common: self.common.clone(),
            specific: SpecificStats::IndexScan(self.specific.clone()),
            children: Vec::new(),
        }
    }
}
