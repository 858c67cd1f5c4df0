//! Executor error types
//!
//! Error codes:
//! - AERO_CHILD_FAILURE (ERROR)
//! - AERO_INVALID_HANDLE (FATAL)
//! - AERO_INCONSISTENT_SORT_KEY (FATAL)
//! - AERO_DATA_CORRUPTION (FATAL)
//! - AERO_INVALID_STATE (ERROR)
//! - AERO_EXECUTION_FAILED (ERROR)

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

use super::working_set::WorkingSetId;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Query failed but system is healthy
    Error,
    /// Programming or consistency error
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

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// A child stage reported failure
    AeroChildFailure,
    /// Freed or unknown working set handle
    AeroInvalidHandle,
    /// A child produced a record out of order
    AeroInconsistentSortKey,
    /// Record checksum mismatch on fetch
    AeroDataCorruption,
    /// Operation not valid in the stage's current state
    AeroInvalidState,
    /// General execution failure
    AeroExecutionFailed,
}

impl ExecutorErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::AeroChildFailure => "AERO_CHILD_FAILURE",
            ExecutorErrorCode::AeroInvalidHandle => "AERO_INVALID_HANDLE",
            ExecutorErrorCode::AeroInconsistentSortKey => "AERO_INCONSISTENT_SORT_KEY",
            ExecutorErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
            ExecutorErrorCode::AeroInvalidState => "AERO_INVALID_STATE",
            ExecutorErrorCode::AeroExecutionFailed => "AERO_EXECUTION_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::AeroInvalidHandle
            | ExecutorErrorCode::AeroInconsistentSortKey
            | ExecutorErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}] {}: {}", .code.severity(), .code.code(), .message)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
}

impl ExecutorError {
    /// Create a child failure error
    pub fn child_failure(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::AeroChildFailure,
            message: reason.into(),
        }
    }

    /// Create an invalid handle error (FATAL)
    pub fn invalid_handle(id: WorkingSetId) -> Self {
        Self {
            code: ExecutorErrorCode::AeroInvalidHandle,
            message: format!("working set handle {} is freed or unknown", id),
        }
    }

    /// Create an inconsistent sort key error (FATAL)
    pub fn inconsistent_sort_key(child: usize, reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::AeroInconsistentSortKey,
            message: format!("child {} emitted out of order: {}", child, reason.into()),
        }
    }

    /// Create a data corruption error (FATAL)
    pub fn data_corruption(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::AeroDataCorruption,
            message: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::AeroInvalidState,
            message: reason.into(),
        }
    }

    /// Create an execution failed error
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::AeroExecutionFailed,
            message: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        if err.is_fatal() {
            ExecutorError::data_corruption(err.to_string())
        } else {
            ExecutorError::execution_failed(err.to_string())
        }
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordLocation;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExecutorErrorCode::AeroChildFailure.code(), "AERO_CHILD_FAILURE");
        assert_eq!(ExecutorErrorCode::AeroInvalidHandle.code(), "AERO_INVALID_HANDLE");
        assert_eq!(
            ExecutorErrorCode::AeroInconsistentSortKey.code(),
            "AERO_INCONSISTENT_SORT_KEY"
        );
    }

    #[test]
    fn test_severity() {
        assert!(ExecutorError::inconsistent_sort_key(1, "3 after 4").is_fatal());
        assert!(!ExecutorError::child_failure("index dropped").is_fatal());
        assert!(!ExecutorError::invalid_state("already running").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ExecutorError::child_failure("scan aborted");
        let display = err.to_string();
        assert!(display.contains("[ERROR]"));
        assert!(display.contains("AERO_CHILD_FAILURE"));
        assert!(display.contains("scan aborted"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let corruption = StorageError::Corruption {
            location: RecordLocation::new(4),
            expected: 1,
            actual: 2,
        };
        let err: ExecutorError = corruption.into();
        assert_eq!(err.code(), ExecutorErrorCode::AeroDataCorruption);

        let missing: ExecutorError = StorageError::RecordNotFound(RecordLocation::new(4)).into();
        assert_eq!(missing.code(), ExecutorErrorCode::AeroExecutionFailed);
    }
}
