//! Error types for loreweave operations.
//!
//! The taxonomy distinguishes transient upstream failures (retryable),
//! malformed model output (never retried), missing records (skipped per
//! batch item), and fatal configuration problems (raised immediately).

use thiserror::Error;

/// Result type alias for loreweave operations.
pub type LoreResult<T> = Result<T, LoreError>;

/// Main error type for all loreweave operations.
#[derive(Error, Debug)]
pub enum LoreError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// A referenced entity or message is missing.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        entity_id: Option<String>,
    },

    /// Upstream rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        retry_after: Option<u64>,
    },

    /// LLM generation failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding generation failed.
    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Graph store operation failed.
    #[error("Graph store error: {message}")]
    GraphStore {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or invalid configuration. Raised at startup or first use,
    /// never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error reaching an upstream service.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Structured-output parse failure.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// The request was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,

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
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,

    // Entities (ENT_xxx)
    EntNotFound,
    EntMergedTarget,

    // Rate limit (RATE_xxx)
    RateLimitExceeded,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,

    // Embedding (EMB_xxx)
    EmbConnectionFailed,
    EmbGenerationFailed,

    // Graph (GRP_xxx)
    GrpOperationFailed,

    // Database (DB_xxx)
    DbOperationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::EntNotFound => "ENT_001",
            ErrorCode::EntMergedTarget => "ENT_002",
            ErrorCode::RateLimitExceeded => "RATE_001",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::EmbConnectionFailed => "EMB_001",
            ErrorCode::EmbGenerationFailed => "EMB_002",
            ErrorCode::GrpOperationFailed => "GRP_001",
            ErrorCode::DbOperationFailed => "DB_001",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl LoreError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Create a not-found error for an entity.
    pub fn entity_not_found(entity_id: impl Into<String>) -> Self {
        let id = entity_id.into();
        Self::NotFound {
            message: format!("Entity with id '{}' not found", id),
            code: ErrorCode::EntNotFound,
            entity_id: Some(id),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
            code: ErrorCode::EmbGenerationFailed,
            source: None,
        }
    }

    /// Create a graph store error.
    pub fn graph_store(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpOperationFailed,
            source: None,
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

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateLimitExceeded,
            retry_after: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::Embedding { code, .. } => *code,
            Self::GraphStore { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether retrying the failed call could succeed.
    ///
    /// Rate limits, timeouts, and upstream 5xx responses are transient;
    /// parse failures are not — the same prompt tends to fail the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. }
                | Self::Network { .. }
                | Self::Llm {
                    code: ErrorCode::LlmConnectionFailed,
                    ..
                }
                | Self::Embedding {
                    code: ErrorCode::EmbConnectionFailed,
                    ..
                }
        )
    }

    /// Convert from an upstream HTTP status code.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 => Self::Validation {
                message: body.to_string(),
                code: ErrorCode::ValInvalidInput,
            },
            404 => Self::NotFound {
                message: body.to_string(),
                code: ErrorCode::EntNotFound,
                entity_id: None,
            },
            429 => Self::RateLimit {
                message: body.to_string(),
                code: ErrorCode::RateLimitExceeded,
                retry_after: None,
            },
            500..=599 => Self::Network {
                message: format!("HTTP {}: {}", status, body),
                code: ErrorCode::NetConnectionFailed,
                source: None,
            },
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = LoreError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_not_found_error() {
        let err = LoreError::entity_not_found("ent-1");
        assert_eq!(err.code(), ErrorCode::EntNotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LoreError::rate_limit("slow down").is_retryable());
        assert!(LoreError::from_http_status(503, "unavailable").is_retryable());
        assert!(!LoreError::parse("bad json").is_retryable());
        assert!(!LoreError::Configuration("missing key".into()).is_retryable());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::EntNotFound.as_str(), "ENT_001");
        assert_eq!(ErrorCode::ParseInvalidJson.as_str(), "PARSE_001");
    }
}
