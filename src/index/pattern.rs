//! Key patterns
//!
//! An ordered list of (field path, direction) pairs. Used both to describe
//! compound indexes and as the sort pattern of a merge.
//!
//! Text form: `"a:1,c:-1"`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{IndexError, IndexResult};
use super::key::IndexKey;

/// Direction of a single pattern field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Parse the numeric form (`1` / `-1`)
    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Direction::Ascending),
            -1 => Some(Direction::Descending),
            _ => None,
        }
    }

    /// Returns the numeric form
    pub fn as_number(&self) -> i64 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }

    /// Applies the direction to an ascending comparison
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// One field of a key pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyField {
    /// Dotted field path
    pub path: String,
    /// Field direction
    pub direction: Direction,
}

impl KeyField {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Descending,
        }
    }
}

/// Ordered list of key fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPattern {
    fields: Vec<KeyField>,
}

impl KeyPattern {
    /// Build a pattern from fields. At least one field is required.
    pub fn new(fields: Vec<KeyField>) -> IndexResult<Self> {
        if fields.is_empty() {
            return Err(IndexError::invalid_pattern("pattern has no fields"));
        }
        for field in &fields {
            if field.path.is_empty() || field.path.split('.').any(str::is_empty) {
                return Err(IndexError::invalid_pattern(format!(
                    "invalid field path '{}'",
                    field.path
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Parse `"a:1,c:-1"`. A field without direction is ascending.
    pub fn parse(text: &str) -> IndexResult<Self> {
        let mut fields = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (path, direction) = match part.rsplit_once(':') {
                Some((path, dir)) => {
                    let n: i64 = dir.trim().parse().map_err(|_| {
                        IndexError::invalid_pattern(format!("bad direction in '{}'", part))
                    })?;
                    let direction = Direction::from_number(n).ok_or_else(|| {
                        IndexError::invalid_pattern(format!("direction must be 1 or -1 in '{}'", part))
                    })?;
                    (path.trim(), direction)
                }
                None => (part, Direction::Ascending),
            };
            fields.push(KeyField {
                path: path.to_string(),
                direction,
            });
        }
        Self::new(fields)
    }

    /// Returns the fields in order
    pub fn fields(&self) -> &[KeyField] {
        &self.fields
    }

    /// Returns the number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Patterns always hold at least one field
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index name derived from the pattern (`a_1_c_-1`)
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_{}", f.path, f.direction.as_number()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Extract one key per field from a document
    pub fn extract_keys(&self, doc: &Value) -> Vec<IndexKey> {
        self.fields
            .iter()
            .map(|f| IndexKey::for_path(doc, &f.path))
            .collect()
    }

    /// Returns the same pattern with every direction flipped
    pub fn reversed(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|f| KeyField {
                path: f.path.clone(),
                direction: match f.direction {
                    Direction::Ascending => Direction::Descending,
                    Direction::Descending => Direction::Ascending,
                },
            })
            .collect();
        Self { fields }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|k| format!("{}:{}", k.path, k.direction.as_number()))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}
