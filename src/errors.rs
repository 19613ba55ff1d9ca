//! Error types shared by connections, the transfer unit and the orchestrator.

use std::io;
use thiserror::Error;

/// Failure reported by a [`Connection`](crate::services::connection::Connection).
///
/// The migration engine treats every variant as transient; the distinction
/// only matters for log output.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store request failed: {0}")]
    Sdk(String),
    #[error("object store returned {code}: {message}")]
    Service { code: String, message: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("payload stream failed: {0}")]
    Payload(String),
    #[error("injected failure: {0}")]
    Injected(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl<E, R> From<aws_sdk_s3::error::SdkError<E, R>> for StoreError
where
    E: aws_sdk_s3::error::ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(err: aws_sdk_s3::error::SdkError<E, R>) -> Self {
        use aws_sdk_s3::error::SdkError;
        match err {
            SdkError::ServiceError(service) => {
                let inner = service.err();
                StoreError::Service {
                    code: inner.code().unwrap_or("Unknown").to_string(),
                    message: inner.message().unwrap_or_default().to_string(),
                }
            }
            other => StoreError::Sdk(format!("{}", aws_sdk_s3::error::DisplayErrorContext(&other))),
        }
    }
}

/// Stage of a single object copy that failed.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("reading access level of `{key}`: {source}")]
    AccessLevel { key: String, source: StoreError },
    #[error("fetching `{key}` from source: {source}")]
    Fetch { key: String, source: StoreError },
    #[error("writing `{key}` to destination: {source}")]
    Write { key: String, source: StoreError },
}

impl TransferError {
    pub fn key(&self) -> &str {
        match self {
            TransferError::AccessLevel { key, .. }
            | TransferError::Fetch { key, .. }
            | TransferError::Write { key, .. } => key,
        }
    }
}

/// Job-level failure. Only these ever leave the orchestrator.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("listing bucket `{bucket}` after marker {marker:?} failed: {source}")]
    Listing {
        bucket: String,
        marker: Option<String>,
        source: StoreError,
    },
    #[error("{} object(s) were abandoned after exhausting retries", keys.len())]
    Abandoned { keys: Vec<String> },
}
