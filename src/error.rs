use image::ImageFormat;
use thiserror::Error;

/// Failure classes surfaced by the signed-URL endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }
}

/// Reason a pipeline record was abandoned.
///
/// These never escape the batch invocation: the record is logged and
/// skipped, and the remaining records keep processing.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("download failed: {0}")]
    Fetch(anyhow::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(ImageFormat),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("upload failed: {0}")]
    Store(anyhow::Error),
}
