//! Result types for query execution

use serde_json::Value;

use crate::storage::RecordLocation;

use super::stats::StageStats;

/// A single document in the result set
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDocument {
    /// Location the result still references. `None` when the document was
    /// detached from its record by an invalidation.
    pub loc: Option<RecordLocation>,
    /// Document body as JSON
    pub body: Value,
}

impl ResultDocument {
    /// Creates a new result document
    pub fn new(loc: Option<RecordLocation>, body: Value) -> Self {
        Self { loc, body }
    }

    /// Returns the document body
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns true if the document no longer references a stored record
    pub fn is_detached(&self) -> bool {
        self.loc.is_none()
    }
}

/// Result of running a plan to completion
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Documents in result order
    pub documents: Vec<ResultDocument>,
    /// Plan statistics at EOF
    pub stats: StageStats,
}

impl ExecutionResult {
    /// Returns true if no documents were produced
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the number of results
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns an iterator over the documents
    pub fn iter(&self) -> impl Iterator<Item = &ResultDocument> {
        self.documents.iter()
    }

    /// Document bodies in result order
    pub fn bodies(&self) -> Vec<Value> {
        self.documents.iter().map(|d| d.body.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::stats::{CommonStats, SpecificStats, StageType};
    use serde_json::json;

    #[test]
    fn test_result_document() {
        let doc = ResultDocument::new(Some(RecordLocation::new(8)), json!({"c": 1}));
        assert_eq!(doc.body()["c"], 1);
        assert!(!doc.is_detached());
        assert!(ResultDocument::new(None, json!({})).is_detached());
    }

    #[test]
    fn test_execution_result_bodies() {
        let result = ExecutionResult {
            documents: vec![
                ResultDocument::new(None, json!({"c": 1})),
                ResultDocument::new(None, json!({"c": 2})),
            ],
            stats: StageStats {
                stage: StageType::QueuedData,
                common: CommonStats::default(),
                specific: SpecificStats::None,
                children: Vec::new(),
            },
        };
        assert_eq!(result.len(), 2);
        assert!(!result.is_empty());
        assert_eq!(result.bodies(), vec![json!({"c": 1}), json!({"c": 2})]);
    }
}
