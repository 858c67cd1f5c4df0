//! Storage error types
//!
//! Error codes:
//! - AERO_STORAGE_RECORD_NOT_FOUND (ERROR)
//! - AERO_STORAGE_ENCODE_FAILED (ERROR)
//! - AERO_DATA_CORRUPTION (FATAL)

use std::fmt;

use thiserror::Error;

use super::location::RecordLocation;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, server continues
    Error,
    /// Query must be abandoned
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Errors raised by the in-memory collection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No live record at the location
    #[error("no record at {0}")]
    RecordNotFound(RecordLocation),

    /// Document could not be encoded or decoded
    #[error("document encoding failed: {0}")]
    Encoding(String),

    /// Stored bytes no longer match their checksum
    #[error("checksum mismatch at {location}: expected {expected:#010x}, found {actual:#010x}")]
    Corruption {
        location: RecordLocation,
        expected: u32,
        actual: u32,
    },
}

impl StorageError {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::RecordNotFound(_) => "AERO_STORAGE_RECORD_NOT_FOUND",
            StorageError::Encoding(_) => "AERO_STORAGE_ENCODE_FAILED",
            StorageError::Corruption { .. } => "AERO_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageError::Corruption { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
