use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] objdb_store::StoreError),
}

impl From<CoordinatorError> for objdb_types::DomainError {
    fn from(e: CoordinatorError) -> Self {
        use objdb_types::DomainError;
        match e {
            CoordinatorError::Configuration(s) => DomainError::Configuration(s),
            CoordinatorError::Store(e) => e.into(),
        }
    }
}
