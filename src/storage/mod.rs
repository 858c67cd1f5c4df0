//! Record storage for aerodb query execution
//!
//! A minimal in-memory collection that hands out record locations and
//! keeps compound indexes current. Query stages reference records by
//! location and fetch content through `RecordFetch`.
//!
//! # Design Principles
//!
//! - Checksum-verified on every fetch
//! - Locations grow monotonically and are never reused
//! - Growing updates relocate the record

mod checksum;
mod collection;
mod errors;
mod location;

pub use checksum::{compute_checksum, verify_checksum};
pub use collection::{Collection, RecordFetch};
pub use errors::{Severity, StorageError, StorageResult};
pub use location::RecordLocation;
