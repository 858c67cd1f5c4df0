//! Ordered compound index structure
//!
//! Entries are `(key parts, location)` kept in a `BTreeSet`. Each key part
//! carries its field's direction, so iteration order of the set is the
//! index order. Within equal keys, entries are ordered by location.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;

use serde_json::Value;

use crate::storage::RecordLocation;

use super::key::IndexKey;
use super::pattern::{Direction, KeyPattern};

/// Direction of travel along an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// One component of an index entry key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// Field value, ordered according to its direction
    Value { key: IndexKey, direction: Direction },
    /// Upper sentinel, greater than every value in either direction
    End,
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::End, KeyPart::End) => Ordering::Equal,
            (KeyPart::End, _) => Ordering::Greater,
            (_, KeyPart::End) => Ordering::Less,
            (
                KeyPart::Value { key: a, direction: da },
                KeyPart::Value { key: b, direction: db },
            ) => {
                if da != db {
                    // Never happens within one index
                    return da.cmp(db);
                }
                da.apply(a.cmp(b))
            }
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single index entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    parts: Vec<KeyPart>,
    loc: RecordLocation,
}

impl IndexEntry {
    /// Returns the record location this entry points at
    pub fn loc(&self) -> RecordLocation {
        self.loc
    }

    /// Returns the key values in pattern order
    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.parts.iter().filter_map(|p| match p {
            KeyPart::Value { key, .. } => Some(key),
            KeyPart::End => None,
        })
    }
}

/// Compound index over one collection.
#[derive(Debug, Clone)]
pub struct IndexTree {
    pattern: KeyPattern,
    entries: BTreeSet<IndexEntry>,
}

impl IndexTree {
    /// Creates a new empty index tree
    pub fn new(pattern: KeyPattern) -> Self {
        Self {
            pattern,
            entries: BTreeSet::new(),
        }
    }

    /// Returns the key pattern of this index
    pub fn pattern(&self) -> &KeyPattern {
        &self.pattern
    }

    /// Returns the index name
    pub fn name(&self) -> String {
        self.pattern.name()
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index a document stored at `loc`
    pub fn insert(&mut self, doc: &Value, loc: RecordLocation) {
        let entry = self.entry_for(self.pattern.extract_keys(doc), loc);
        self.entries.insert(entry);
    }

    /// Remove the entry for a document stored at `loc`
    pub fn remove(&mut self, doc: &Value, loc: RecordLocation) {
        let entry = self.entry_for(self.pattern.extract_keys(doc), loc);
        self.entries.remove(&entry);
    }

    /// Returns the entry following `after` among entries whose leading keys
    /// equal `prefix`, in the given scan direction.
    ///
    /// `after == None` starts at the first entry of the prefix range. The
    /// entry `after` need not still be present in the tree.
    pub fn next_in_prefix(
        &self,
        prefix: &[IndexKey],
        after: Option<&IndexEntry>,
        direction: ScanDirection,
    ) -> Option<&IndexEntry> {
        let lower = self.bound_entry(prefix, false);
        let upper = self.bound_entry(prefix, true);

        if let Some(after) = after {
            if *after < lower || *after >= upper {
                return None;
            }
        }

        match direction {
            ScanDirection::Forward => {
                let start = match after {
                    Some(a) => Bound::Excluded(a.clone()),
                    None => Bound::Included(lower),
                };
                self.entries.range((start, Bound::Excluded(upper))).next()
            }
            ScanDirection::Backward => {
                let end = match after {
                    Some(a) => Bound::Excluded(a.clone()),
                    None => Bound::Excluded(upper),
                };
                self.entries.range((Bound::Included(lower), end)).next_back()
            }
        }
    }

    /// Iterate all entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    fn entry_for(&self, keys: Vec<IndexKey>, loc: RecordLocation) -> IndexEntry {
        let parts = keys
            .into_iter()
            .zip(self.pattern.fields())
            .map(|(key, field)| KeyPart::Value {
                key,
                direction: field.direction,
            })
            .collect();
        IndexEntry { parts, loc }
    }

    /// Lower bound: the bare prefix sorts before all of its extensions.
    /// Upper bound: prefix followed by `End` sorts after all of them.
    fn bound_entry(&self, prefix: &[IndexKey], upper: bool) -> IndexEntry {
        let mut parts: Vec<KeyPart> = prefix
            .iter()
            .cloned()
            .zip(self.pattern.fields())
            .map(|(key, field)| KeyPart::Value {
                key,
                direction: field.direction,
            })
            .collect();
        if upper {
            parts.push(KeyPart::End);
        }
        IndexEntry {
            parts,
            loc: RecordLocation::MIN,
        }
    }
}
