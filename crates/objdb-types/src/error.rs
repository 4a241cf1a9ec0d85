use thiserror::Error;

/// Cross-cutting error taxonomy shared by every crate in the workspace.
///
/// Leaf crates define their own `thiserror` enums and convert into this one
/// via `#[from]` wherever an operation propagates a core failure unmodified.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Surfaced as a value (`success: false`) at the conditional-update
    /// boundary; only promoted to an error where an invariant requires the
    /// caller to treat a lost race as fatal.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    #[error("path not found between {from} and {to}")]
    PathNotFound { from: String, to: String },

    #[error("vertex not found: {0}")]
    VertexNotFound(String),

    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound { kind, id: id.into() }
    }

    /// `true` for failures the caller may retry unmodified (transient I/O,
    /// resource exhaustion, lost conditional-write races).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::Transient(_)
                | DomainError::ResourceExhaustion(_)
                | DomainError::PreconditionFailed(_)
        )
    }
}
