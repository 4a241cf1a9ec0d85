use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// The write's `If-Match`/`If-None-Match` precondition did not hold.
    /// Surfaced as a value by the resource runtime's conditional update, not
    /// raised as a hard failure.
    #[error("precondition failed for {key}")]
    PreconditionFailed { key: String },

    #[error("lease conflict: {key} already held by {holder}")]
    LeaseConflict { key: String, holder: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl From<StoreError> for objdb_types::DomainError {
    fn from(e: StoreError) -> Self {
        use objdb_types::DomainError;
        match e {
            StoreError::NotFound(id) => DomainError::not_found("object", id),
            StoreError::PreconditionFailed { key } => {
                DomainError::PreconditionFailed(format!("stale version at {key}"))
            }
            StoreError::LeaseConflict { key, holder } => {
                DomainError::ResourceExhaustion(format!("{key} held by {holder}"))
            }
            StoreError::Serialization(e) => DomainError::Serialization(e),
            StoreError::Backend(e) => DomainError::Transient(e.to_string()),
            StoreError::Internal(s) => DomainError::Transient(s),
        }
    }
}
