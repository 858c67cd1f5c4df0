//! Sort pattern and comparator for merging
//!
//! Sorts members by the fields of a `KeyPattern`, lexicographically, each
//! field comparison negated when the field is descending.

use std::cmp::Ordering;
use std::fmt;

use crate::index::{IndexKey, IndexResult, KeyField, KeyPattern};

use super::working_set::WorkingSetMember;

/// Extracted sort values, one per pattern field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey(Vec<IndexKey>);

impl SortKey {
    pub fn new(values: Vec<IndexKey>) -> Self {
        SortKey(values)
    }

    pub fn values(&self) -> &[IndexKey] {
        &self.0
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|k| k.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Total order over working set members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPattern {
    pattern: KeyPattern,
}

impl SortPattern {
    pub fn new(pattern: KeyPattern) -> Self {
        Self { pattern }
    }

    /// Parse `"c:1"` / `"a:1,c:-1"`
    pub fn parse(text: &str) -> IndexResult<Self> {
        Ok(Self::new(KeyPattern::parse(text)?))
    }

    pub fn fields(&self) -> &[KeyField] {
        self.pattern.fields()
    }

    pub fn key_pattern(&self) -> &KeyPattern {
        &self.pattern
    }

    /// Extract the sort key of a member.
    ///
    /// Fields neither in the content nor in the index key data sort as null.
    pub fn extract(&self, member: &WorkingSetMember) -> SortKey {
        SortKey(
            self.fields()
                .iter()
                .map(|f| member.get_field_dotted(&f.path).unwrap_or(IndexKey::Null))
                .collect(),
        )
    }

    /// Returns the member's sort key, extracting and caching it on first use
    pub fn key_for(&self, member: &mut WorkingSetMember) -> SortKey {
        if let Some(key) = member.cached_sort_key(self) {
            return key.clone();
        }
        let key = self.extract(member);
        member.set_sort_key(self, key.clone());
        key
    }

    /// Compare two sort keys under this pattern
    pub fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        for ((x, y), field) in a.0.iter().zip(b.0.iter()).zip(self.fields()) {
            let ord = field.direction.apply(x.cmp(y));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for SortPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}
