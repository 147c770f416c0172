use std::time::Duration;
use thiserror::Error;

/// Unified error type for Gantry.
#[derive(Error, Debug)]
pub enum GantryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    #[error("transaction aborted: {0}")]
    Aborted(#[source] Box<GantryError>),

    #[error("cleanup already in progress")]
    InProgress,

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GantryError>;

impl GantryError {
    /// Wrap a database-layer failure.
    pub fn store(e: impl std::fmt::Display) -> Self {
        GantryError::Store(e.to_string())
    }

    /// Wrap a transient upstream failure. Callers retry on the next tick.
    pub fn upstream(e: impl std::fmt::Display) -> Self {
        GantryError::Unavailable(e.to_string())
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        GantryError::NotFound(what.to_string())
    }

    pub fn validation(msg: impl std::fmt::Display) -> Self {
        GantryError::Validation(msg.to_string())
    }

    /// Map to HTTP status code. The HTTP layer's single translation point.
    /// An aborted transaction keeps the inner error's status.
    pub fn status_code(&self) -> u16 {
        match self {
            GantryError::Validation(_) => 400,
            GantryError::NotFound(_) => 404,
            GantryError::Conflict(_) => 409,
            GantryError::InProgress => 409,
            GantryError::Unavailable(_) => 503,
            GantryError::Aborted(inner) => inner.status_code(),
            _ => 500,
        }
    }

    /// JSON error body: `{code, message, details}` with `code` equal to the
    /// HTTP status.
    pub fn to_body(&self) -> serde_json::Value {
        if let GantryError::Aborted(inner) = self {
            return inner.to_body();
        }
        let code = self.status_code();
        serde_json::json!({
            "code": code,
            "message": self.kind_label(),
            "details": self.to_string(),
        })
    }

    fn kind_label(&self) -> &'static str {
        match self {
            GantryError::Validation(_) => "validation",
            GantryError::NotFound(_) => "not_found",
            GantryError::Conflict(_) => "conflict",
            GantryError::InProgress => "conflict",
            GantryError::Unavailable(_) => "unavailable",
            GantryError::Timeout(_) => "timeout",
            _ => "internal",
        }
    }
}
