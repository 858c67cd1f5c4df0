//! Index error types
//!
//! Error codes:
//! - AERO_INDEX_INVALID_PATTERN (ERROR)
//! - AERO_INDEX_NOT_FOUND (ERROR)

use std::fmt;

use thiserror::Error;

/// Index-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// Key pattern could not be parsed or is empty
    AeroIndexInvalidPattern,
    /// Referenced index does not exist
    AeroIndexNotFound,
}

impl IndexErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::AeroIndexInvalidPattern => "AERO_INDEX_INVALID_PATTERN",
            IndexErrorCode::AeroIndexNotFound => "AERO_INDEX_NOT_FOUND",
        }
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Index error type with full context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct IndexError {
    code: IndexErrorCode,
    message: String,
}

impl IndexError {
    /// Create an invalid pattern error
    pub fn invalid_pattern(reason: impl Into<String>) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexInvalidPattern,
            message: reason.into(),
        }
    }

    /// Create an index not found error
    pub fn not_found(name: &str) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexNotFound,
            message: format!("index '{}' does not exist", name),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> IndexErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
