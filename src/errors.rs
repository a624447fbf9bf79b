use crate::matcher::{EmbeddingError, MatchError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(EmbeddingError),

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl From<EmbeddingError> for AppError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Unavailable(reason) => AppError::ModelUnavailable(reason),
            other => AppError::Embedding(other),
        }
    }
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::InvalidRequest(msg) => AppError::BadRequest(msg),
            MatchError::Embedding(e) => e.into(),
        }
    }
}
