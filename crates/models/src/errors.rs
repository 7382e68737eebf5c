use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
    /// An attempt to change `name` or `workspace` of an existing store.
    #[error("{0}")]
    Immutable(String),
}
