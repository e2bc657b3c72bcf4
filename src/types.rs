// Error taxonomy and its HTTP translation

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Errors raised by an object-storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("S3 error: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Credentials error: {0}")]
    Credentials(#[from] s3::creds::error::CredentialsError),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// The file operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Upload,
    Download,
    List,
    Delete,
    Url,
}

impl FileOperation {
    fn failure_prefix(self) -> &'static str {
        match self {
            FileOperation::Upload => "File upload failed",
            FileOperation::Download => "File download failed",
            FileOperation::List => "File listing failed",
            FileOperation::Delete => "File deletion failed",
            FileOperation::Url => "File URL generation failed",
        }
    }
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Upload => write!(f, "upload"),
            FileOperation::Download => write!(f, "download"),
            FileOperation::List => write!(f, "list"),
            FileOperation::Delete => write!(f, "delete"),
            FileOperation::Url => write!(f, "url"),
        }
    }
}

/// A failed file operation. Every failure is answered with 500; the body
/// names the operation and the cause, except for downloads which get an
/// empty body.
#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", .operation.failure_prefix())]
pub struct FileApiError {
    pub operation: FileOperation,
    #[source]
    pub source: AppError,
}

impl FileApiError {
    pub fn new(operation: FileOperation, source: impl Into<AppError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

impl IntoResponse for FileApiError {
    fn into_response(self) -> Response {
        error!(operation = %self.operation, error = %self.source, "File operation failed");

        match self.operation {
            FileOperation::Download => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response(),
        }
    }
}
