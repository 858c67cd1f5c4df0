//! Compound indexes for aerodb collections
//!
//! Indexes are derived, in-memory state maintained by the collection on
//! every write. They exist here so index scans can feed the merge stage.
//!
//! # Design Principles
//!
//! - Deterministic: `BTreeSet` iteration order
//! - Per-field direction baked into entry ordering
//! - Documents missing an indexed field are indexed as null

mod btree;
mod errors;
mod key;
mod pattern;

pub use btree::{IndexEntry, IndexTree, KeyPart, ScanDirection};
pub use errors::{IndexError, IndexErrorCode, IndexResult};
pub use key::{lookup_path, IndexKey};
pub use pattern::{Direction, KeyField, KeyPattern};
