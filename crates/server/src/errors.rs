use service::errors::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] ServiceError),
    #[error("cannot bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
