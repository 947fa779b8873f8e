//! Error types for cachegrid operations.

use thiserror::Error;

/// The main error type for cachegrid operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Configuration errors (invalid settings, unsupported object categories).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Listener registration errors (bad ids, unknown registrations).
    #[error("listener error: {0}")]
    Listener(String),

    /// Transaction lifecycle errors (begin/commit/rollback out of order).
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Instance lifecycle errors (operations on a stopped member).
    #[error("instance error: {0}")]
    Instance(String),

    /// Topic errors (publishing to a destroyed topic).
    #[error("topic error: {0}")]
    Topic(String),

    /// Value serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A listener attach that failed mid-flight and was rolled back.
    ///
    /// Carries the error that triggered the rollback as its source.
    #[error("attach rolled back: {source}")]
    RolledBack {
        #[source]
        source: Box<CacheError>,
    },
}

impl CacheError {
    /// Wraps an error as the cause of a rolled-back attach.
    pub fn rolled_back(source: CacheError) -> Self {
        Self::RolledBack {
            source: Box::new(source),
        }
    }
}

/// A specialized `Result` type for cachegrid operations.
pub type Result<T> = std::result::Result<T, CacheError>;
