//! Record locations
//!
//! A location identifies where a record currently lives in a collection.
//! Locations are stable until the record is deleted or relocated; after
//! that they may still be compared for equality but must not be fetched.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, comparable identifier of a record's storage position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordLocation(u64);

impl RecordLocation {
    /// Smallest possible location. Used as a lower bound in index ranges.
    pub const MIN: RecordLocation = RecordLocation(0);

    /// Largest possible location.
    pub const MAX: RecordLocation = RecordLocation(u64::MAX);

    /// Create a location from a raw storage offset
    pub fn new(offset: u64) -> Self {
        RecordLocation(offset)
    }

    /// Returns the raw storage offset
    pub fn offset(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loc:{}", self.0)
    }
}
