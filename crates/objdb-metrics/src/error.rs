use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Resource(#[from] objdb_resource::ResourceError),

    #[error(transparent)]
    Store(#[from] objdb_store::StoreError),

    #[error("prometheus registration failed: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
