use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("malformed queue entry: {0}")]
    MalformedEntry(String),

    #[error(transparent)]
    Resource(#[from] objdb_resource::ResourceError),

    #[error(transparent)]
    Coordinator(#[from] objdb_coordinator::CoordinatorError),

    #[error(transparent)]
    Store(#[from] objdb_store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueueError> for objdb_types::DomainError {
    fn from(e: QueueError) -> Self {
        use objdb_types::DomainError;
        match e {
            QueueError::Configuration(s) => DomainError::Configuration(s),
            QueueError::MalformedEntry(s) => DomainError::Validation(s),
            QueueError::Resource(e) => e.into(),
            QueueError::Coordinator(e) => e.into(),
            QueueError::Store(e) => e.into(),
            QueueError::Serialization(e) => DomainError::Serialization(e),
        }
    }
}
