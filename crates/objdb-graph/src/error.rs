use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("vertex not found: {0}")]
    VertexNotFound(String),

    #[error("no path from '{from}' to '{to}'")]
    PathNotFound { from: String, to: String },

    #[error("A* search exceeded maxDepth * 1000 iterations")]
    MaxIterationsExceeded,

    #[error("malformed edge record: {0}")]
    MalformedEdge(String),

    #[error(transparent)]
    Resource(#[from] objdb_resource::ResourceError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<GraphError> for objdb_types::DomainError {
    fn from(e: GraphError) -> Self {
        use objdb_types::DomainError;
        match e {
            GraphError::VertexNotFound(id) => DomainError::VertexNotFound(id),
            GraphError::PathNotFound { from, to } => DomainError::PathNotFound { from, to },
            GraphError::MaxIterationsExceeded => {
                DomainError::ResourceExhaustion("A* search exceeded its iteration budget".to_string())
            }
            GraphError::MalformedEdge(s) => DomainError::Validation(s),
            GraphError::Resource(e) => e.into(),
            GraphError::Serialization(e) => DomainError::Serialization(e),
        }
    }
}
