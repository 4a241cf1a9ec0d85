use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] objdb_store::StoreError),
}

impl From<ResourceError> for objdb_types::DomainError {
    fn from(e: ResourceError) -> Self {
        use objdb_types::DomainError;
        match e {
            ResourceError::Validation(s) => DomainError::Validation(s),
            ResourceError::NotFound(id) => DomainError::not_found("record", id),
            ResourceError::Configuration(s) => DomainError::Configuration(s),
            ResourceError::AlreadyExists(id) => {
                DomainError::Validation(format!("record already exists: {id}"))
            }
            ResourceError::Serialization(e) => DomainError::Serialization(e),
            ResourceError::Store(e) => e.into(),
        }
    }
}
