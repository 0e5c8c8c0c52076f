//! Error types for strata operations.
//!
//! This module provides the engine's error hierarchy with structured error codes
//! and suggestions for resolution. Routing ambiguity is deliberately absent:
//! it is resolved by rule order and recorded on the routing decision instead.

use thiserror::Error;

/// Result type alias for strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// Main error type for all strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    /// A bounded stage is full even after its eviction attempt.
    #[error("Capacity exceeded: {message}")]
    CapacityExceeded {
        message: String,
        code: ErrorCode,
        /// The stage that rejected the item ("fresh" or "focus").
        stage: String,
        capacity: usize,
    },

    /// An external collaborator (embedding or compression service) failed.
    #[error("Transient external error ({service}): {message}")]
    TransientExternal {
        message: String,
        code: ErrorCode,
        service: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An external call did not finish within its time bound.
    #[error("Timed out after {timeout_ms}ms calling {service}")]
    Timeout {
        code: ErrorCode,
        service: String,
        timeout_ms: u64,
    },

    /// Memory item not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        item_id: Option<String>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Another decay pass currently holds the batch claim.
    #[error("A decay pass is already in progress")]
    DecayInProgress { code: ErrorCode },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Capacity (CAP_xxx)
    CapFreshFull,
    CapFocusFull,

    // External collaborators (EXT_xxx)
    ExtEmbeddingFailed,
    ExtCompressionFailed,
    ExtTimeout,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValSignalOutOfRange,
    ValTooManyExtensions,

    // Memory (MEM_xxx)
    MemNotFound,
    MemCorrupted,

    // Decay (DEC_xxx)
    DecInProgress,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CapFreshFull => "CAP_001",
            ErrorCode::CapFocusFull => "CAP_002",
            ErrorCode::ExtEmbeddingFailed => "EXT_001",
            ErrorCode::ExtCompressionFailed => "EXT_002",
            ErrorCode::ExtTimeout => "EXT_003",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValSignalOutOfRange => "VAL_002",
            ErrorCode::ValTooManyExtensions => "VAL_003",
            ErrorCode::MemNotFound => "MEM_001",
            ErrorCode::MemCorrupted => "MEM_002",
            ErrorCode::DecInProgress => "DEC_001",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl StrataError {
    /// Create a capacity error for a bounded stage.
    pub fn capacity_exceeded(stage: impl Into<String>, capacity: usize) -> Self {
        let stage = stage.into();
        let code = if stage == "focus" {
            ErrorCode::CapFocusFull
        } else {
            ErrorCode::CapFreshFull
        };
        Self::CapacityExceeded {
            message: format!("{} stage is full ({} items)", stage, capacity),
            code,
            stage,
            capacity,
        }
    }

    /// Create an embedding service error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::TransientExternal {
            message: message.into(),
            code: ErrorCode::ExtEmbeddingFailed,
            service: "embedding".to_string(),
            source: None,
        }
    }

    /// Create a compression service error.
    pub fn compression(message: impl Into<String>) -> Self {
        Self::TransientExternal {
            message: message.into(),
            code: ErrorCode::ExtCompressionFailed,
            service: "compression".to_string(),
            source: None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(service: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            code: ErrorCode::ExtTimeout,
            service: service.into(),
            timeout_ms,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: None,
        }
    }

    /// Create a validation error for a signal outside its range.
    pub fn signal_out_of_range(name: &str, value: f64) -> Self {
        Self::Validation {
            message: format!("signal '{}' = {} is outside [0, 1]", name, value),
            code: ErrorCode::ValSignalOutOfRange,
            suggestion: Some("Normalize signal values into the 0.0-1.0 range".to_string()),
        }
    }

    /// Create a not found error.
    pub fn not_found(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::NotFound {
            message: format!("Memory item '{}' not found", id),
            code: ErrorCode::MemNotFound,
            item_id: Some(id),
        }
    }

    /// Create a decay-in-progress error.
    pub fn decay_in_progress() -> Self {
        Self::DecayInProgress {
            code: ErrorCode::DecInProgress,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a corrupted-record error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::MemCorrupted,
            source: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CapacityExceeded { code, .. } => *code,
            Self::TransientExternal { code, .. } => *code,
            Self::Timeout { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::DecayInProgress { code } => *code,
            Self::Database { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether a retry of the failed external call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientExternal { .. } | Self::Timeout { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::CapacityExceeded { .. } => Some("Retry later or drop the item"),
            Self::TransientExternal { .. } | Self::Timeout { .. } => {
                Some("Check the embedding/compression service; the engine degrades until it recovers")
            }
            Self::NotFound { .. } => Some("Please check the item ID; forgotten items are deleted"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::DecayInProgress { .. } => Some("Wait for the running decay pass to finish"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StrataError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_codes() {
        let fresh = StrataError::capacity_exceeded("fresh", 1000);
        assert_eq!(fresh.code(), ErrorCode::CapFreshFull);
        assert!(fresh.to_string().contains("1000"));

        let focus = StrataError::capacity_exceeded("focus", 7);
        assert_eq!(focus.code(), ErrorCode::CapFocusFull);
    }

    #[test]
    fn test_transient_classification() {
        assert!(StrataError::embedding("down").is_transient());
        assert!(StrataError::timeout("compression", 500).is_transient());
        assert!(!StrataError::validation("bad").is_transient());
        assert!(!StrataError::not_found("x").is_transient());
    }

    #[test]
    fn test_not_found_error() {
        let err = StrataError::not_found("test-id");
        assert_eq!(err.code(), ErrorCode::MemNotFound);
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::CapFreshFull.as_str(), "CAP_001");
        assert_eq!(ErrorCode::DecInProgress.as_str(), "DEC_001");
        assert_eq!(ErrorCode::MemNotFound.as_str(), "MEM_001");
    }
}
