use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook replicator got status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Resource(#[from] objdb_resource::ResourceError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("replicator '{replicator}' exhausted {attempts} attempts replicating {resource}/{id}")]
    MaxRetriesExceeded { replicator: String, resource: String, id: String, attempts: u32 },
}

impl From<ReplicationError> for objdb_types::DomainError {
    fn from(e: ReplicationError) -> Self {
        use objdb_types::DomainError;
        match e {
            ReplicationError::Http(e) => DomainError::Transient(e.to_string()),
            ReplicationError::HttpStatus { url, status } => {
                DomainError::Transient(format!("{url} returned {status}"))
            }
            ReplicationError::Resource(e) => e.into(),
            ReplicationError::Serialization(e) => DomainError::Serialization(e),
            ReplicationError::MaxRetriesExceeded { replicator, resource, id, .. } => {
                DomainError::ResourceExhaustion(format!("{replicator} gave up on {resource}/{id}"))
            }
        }
    }
}
