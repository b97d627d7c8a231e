use thiserror::Error;

/// Error kinds surfaced by the adapter. Mirrors the KV store's own error
/// taxonomy (retryable vs. not) so a transaction-retry loop above this layer
/// can decide whether to re-run a statement.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("duplicate key in index {index}: {row}")]
    DuplicateKey { index: String, row: String },

    #[error("corrupt key: {0}")]
    CorruptKey(String),

    #[error("corrupt value: {0}")]
    CorruptValue(String),

    #[error("store conflict, retry the transaction: {0}")]
    RetryableStoreConflict(String),

    #[error("non-retryable store error: {0}")]
    NonRetryableStoreError(String),

    #[error("query canceled")]
    QueryCanceled,

    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    #[error("directory error: {0}")]
    Directory(String),
}

impl AdapterError {
    /// Mirrors `isRetryable`: true only for the two store codes that mean
    /// "the transaction may simply be re-run" (`not_committed`,
    /// `commit_unknown_result`). Everything else is a hard failure the
    /// caller must not blindly retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::RetryableStoreConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
