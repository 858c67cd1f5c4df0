//! In-memory document collection
//!
//! Records are stored as serialized JSON plus a CRC32 checksum and are
//! addressed by `RecordLocation`. Locations are assigned from a
//! monotonically growing offset and are never reused. Every write keeps
//! the collection's indexes in sync.
//!
//! An update that grows a record relocates it: the old location stops
//! being valid and the record moves to a fresh one. Callers running
//! queries must deliver an invalidation for the old location *before*
//! the write happens.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::index::{IndexTree, KeyPattern};

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StorageError, StorageResult};
use super::location::RecordLocation;

/// Fixed per-record overhead added to the offset counter
const RECORD_HEADER_BYTES: u64 = 8;

/// Read access to records by location
pub trait RecordFetch {
    /// Fetch the document at `loc`.
    ///
    /// Returns `Ok(None)` if no record lives there any more.
    /// Returns `Err` if the stored bytes fail checksum validation.
    fn fetch(&self, loc: RecordLocation) -> StorageResult<Option<Value>>;
}

#[derive(Debug, Clone)]
struct StoredRecord {
    body: Vec<u8>,
    checksum: u32,
}

impl StoredRecord {
    fn encode(doc: &Value) -> StorageResult<Self> {
        let body = serde_json::to_vec(doc)?;
        let checksum = compute_checksum(&body);
        Ok(Self { body, checksum })
    }

    fn decode(&self, loc: RecordLocation) -> StorageResult<Value> {
        if !verify_checksum(&self.body, self.checksum) {
            return Err(StorageError::Corruption {
                location: loc,
                expected: self.checksum,
                actual: compute_checksum(&self.body),
            });
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A named collection of documents with its indexes
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    records: BTreeMap<RecordLocation, StoredRecord>,
    next_offset: u64,
    indexes: Vec<IndexTree>,
}

impl Collection {
    /// Creates an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: BTreeMap::new(),
            next_offset: 0,
            indexes: Vec::new(),
        }
    }

    /// Returns the collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the collection holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Live record locations in ascending order
    pub fn locations(&self) -> impl Iterator<Item = RecordLocation> + '_ {
        self.records.keys().copied()
    }

    /// Create an index on `pattern`, building it from existing records.
    ///
    /// Idempotent: an existing index with the same pattern is kept.
    /// Returns the index name.
    pub fn create_index(&mut self, pattern: KeyPattern) -> StorageResult<String> {
        let name = pattern.name();
        if self.index(&name).is_some() {
            return Ok(name);
        }

        let mut tree = IndexTree::new(pattern);
        for (loc, record) in &self.records {
            tree.insert(&record.decode(*loc)?, *loc);
        }
        self.indexes.push(tree);
        Ok(name)
    }

    /// Look up an index by name
    pub fn index(&self, name: &str) -> Option<&IndexTree> {
        self.indexes.iter().find(|tree| tree.name() == name)
    }

    /// Names of all indexes, in creation order
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.iter().map(IndexTree::name).collect()
    }

    /// Insert a document, returning its location
    pub fn insert(&mut self, doc: Value) -> StorageResult<RecordLocation> {
        let record = StoredRecord::encode(&doc)?;
        let loc = self.allocate_location(record.body.len());
        for tree in &mut self.indexes {
            tree.insert(&doc, loc);
        }
        self.records.insert(loc, record);
        Ok(loc)
    }

    /// Remove the record at `loc`, returning its last content
    pub fn remove(&mut self, loc: RecordLocation) -> StorageResult<Value> {
        let doc = self
            .fetch(loc)?
            .ok_or(StorageError::RecordNotFound(loc))?;
        for tree in &mut self.indexes {
            tree.remove(&doc, loc);
        }
        self.records.remove(&loc);
        Ok(doc)
    }

    /// Returns true if replacing the record at `loc` with `doc` would
    /// move it to a new location
    pub fn would_relocate(&self, loc: RecordLocation, doc: &Value) -> StorageResult<bool> {
        let current = self
            .records
            .get(&loc)
            .ok_or(StorageError::RecordNotFound(loc))?;
        let new_len = serde_json::to_vec(doc)?.len();
        Ok(new_len > current.body.len())
    }

    /// Replace the record at `loc`, returning its (possibly new) location
    pub fn update(&mut self, loc: RecordLocation, doc: Value) -> StorageResult<RecordLocation> {
        let relocate = self.would_relocate(loc, &doc)?;
        self.remove(loc)?;

        let record = StoredRecord::encode(&doc)?;
        let new_loc = if relocate {
            self.allocate_location(record.body.len())
        } else {
            loc
        };
        for tree in &mut self.indexes {
            tree.insert(&doc, new_loc);
        }
        self.records.insert(new_loc, record);
        Ok(new_loc)
    }

    /// Flip a byte of the stored record so the next fetch fails its checksum.
    #[doc(hidden)]
    pub fn corrupt_record(&mut self, loc: RecordLocation) -> bool {
        match self.records.get_mut(&loc) {
            Some(record) if !record.body.is_empty() => {
                let mid = record.body.len() / 2;
                record.body[mid] ^= 0x20;
                true
            }
            _ => false,
        }
    }

    fn allocate_location(&mut self, body_len: usize) -> RecordLocation {
        let loc = RecordLocation::new(self.next_offset);
        self.next_offset += RECORD_HEADER_BYTES + body_len as u64;
        loc
    }
}

impl RecordFetch for Collection {
    fn fetch(&self, loc: RecordLocation) -> StorageResult<Option<Value>> {
        match self.records.get(&loc) {
            Some(record) => record.decode(loc).map(Some),
            None => Ok(None),
        }
    }
}
