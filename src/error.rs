//! Error types for the semantic memory store.

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the memory store and its sub-components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failed against the SPARQL endpoint")]
    Auth,

    #[error("SPARQL endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("a transaction is already in progress")]
    TransactionAlreadyActive,

    #[error("no transaction is in progress")]
    NoTransactionInProgress,

    #[error("embedding length {actual} does not match configured dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding contains a non-finite component")]
    NonFiniteEmbedding,

    #[error("invalid concepts: {0}")]
    InvalidConcepts(String),

    #[error("interaction not found: {0}")]
    InteractionNotFound(uuid::Uuid),

    #[error("duplicate interaction id: {0}")]
    DuplicateInteractionId(uuid::Uuid),

    #[error("the store has been disposed")]
    Disposed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal signal that a cached value is stale; never surfaced to callers.
    #[error("cache entry is stale")]
    CacheStale,
}

impl Error {
    /// Whether retrying the operation (with caller-side backoff) might succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout | Error::Endpoint { .. }
        )
    }

    /// Whether this error originated from the SPARQL transport/transaction layer.
    #[must_use]
    pub fn is_sparql_error(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Timeout
                | Error::Auth
                | Error::Endpoint { .. }
                | Error::TransactionAlreadyActive
                | Error::NoTransactionInProgress
        )
    }
}
