use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The store still has dependent layers and no cascade was requested.
    #[error("{0}")]
    NotEmpty(String),
    #[error("catalog storage error: {0}")]
    Db(String),
    #[error(transparent)]
    Model(#[from] models::ModelError),
}

impl ServiceError {
    pub fn no_such_workspace(workspace: &str) -> Self {
        Self::NotFound(format!("No such workspace: {workspace}"))
    }

    pub fn no_such_store(key: &models::StoreKey) -> Self {
        Self::NotFound(format!("No such wms store: {key}"))
    }
}
