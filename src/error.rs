use std::io;

/// Coarse classification of [`AppError`] for callers that translate
/// failures into their own transport (status codes, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Path,
    Filesystem,
    Decode,
    Persistence,
    Internal,
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Oversized payload or disallowed content type. Raised before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A computed path resolved outside the storage root.
    #[error("Path error: {0}")]
    Path(String),

    #[error("Filesystem error: {context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an I/O failure with the operation and path it happened on.
    pub fn fs(context: impl Into<String>, source: io::Error) -> Self {
        AppError::Filesystem {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Path(_) => ErrorKind::Path,
            AppError::Filesystem { .. } => ErrorKind::Filesystem,
            AppError::Decode(_) => ErrorKind::Decode,
            AppError::Persistence(_) => ErrorKind::Persistence,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
