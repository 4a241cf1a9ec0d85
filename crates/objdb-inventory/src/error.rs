use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("cluster source '{0}' is not registered")]
    UnknownCluster(String),

    #[error("timed out waiting {0:?} to acquire the sync lease for cluster '{1}'")]
    LockTimeout(std::time::Duration, String),

    #[error("cluster source discovery failed: {0}")]
    Discovery(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern { pattern: String, source: globset::Error },

    #[error(transparent)]
    Resource(#[from] objdb_resource::ResourceError),

    #[error(transparent)]
    Store(#[from] objdb_store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<InventoryError> for objdb_types::DomainError {
    fn from(e: InventoryError) -> Self {
        use objdb_types::DomainError;
        match e {
            InventoryError::UnknownCluster(id) => DomainError::not_found("cluster", id),
            InventoryError::LockTimeout(_, id) => {
                DomainError::Transient(format!("sync lease for cluster '{id}' is held by another worker"))
            }
            InventoryError::Discovery(msg) => DomainError::Transient(msg),
            InventoryError::InvalidPattern { pattern, .. } => {
                DomainError::Validation(format!("invalid glob pattern '{pattern}'"))
            }
            InventoryError::Resource(e) => e.into(),
            InventoryError::Store(e) => e.into(),
            InventoryError::Serialization(e) => DomainError::Serialization(e),
        }
    }
}
