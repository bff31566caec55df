//! Signed-URL issuer endpoints.
//!
//! These are handler functions for a platform-invoked HTTP surface: each
//! takes a parsed request body and produces a status, fixed CORS headers and
//! a JSON body, leaving the HTTP envelope to the invoking platform.

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

use crate::error::ApiError;
use crate::pipeline::derived_key;
use crate::storage::ObjectStore;

/// Sent on every response, including errors.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DownloadUrlRequest {
    pub filename: Option<String>,
}

#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: &'static [(&'static str, &'static str)],
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, headers: &CORS_HEADERS, body }
    }

    fn from_error(error: &ApiError) -> Self {
        Self {
            status: error.status_code(),
            headers: &CORS_HEADERS,
            body: json!({"error": error.to_string()}),
        }
    }
}

pub struct UrlIssuer<S> {
    store: Arc<S>,
    source_bucket: String,
    dest_bucket: String,
    expiry_secs: u32,
}

impl<S: ObjectStore> UrlIssuer<S> {
    pub fn new(store: Arc<S>, source_bucket: String, dest_bucket: String, expiry_secs: u32) -> Self {
        Self { store, source_bucket, dest_bucket, expiry_secs }
    }

    /// Time-limited authorization to write `filename` with the declared
    /// content type to the source bucket.
    pub async fn upload_url(&self, request: UploadUrlRequest) -> ApiResponse {
        match self.try_upload_url(request).await {
            Ok(url) => ApiResponse::ok(json!({"uploadUrl": url})),
            Err(e) => {
                error!("Upload URL request failed: {}", e);
                ApiResponse::from_error(&e)
            }
        }
    }

    async fn try_upload_url(&self, request: UploadUrlRequest) -> Result<String, ApiError> {
        let (Some(filename), Some(content_type)) = (
            request.filename.filter(|s| !s.is_empty()),
            request.content_type.filter(|s| !s.is_empty()),
        ) else {
            return Err(ApiError::Validation(
                "Missing filename or contentType".to_string(),
            ));
        };

        self.store
            .presign_put(&self.source_bucket, &filename, &content_type, self.expiry_secs)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    /// Time-limited authorization to read the thumbnail derived from
    /// `filename`, with a save-as hint for the client's browser.
    pub async fn download_url(&self, request: DownloadUrlRequest) -> ApiResponse {
        match self.try_download_url(request).await {
            Ok(url) => ApiResponse::ok(json!({"downloadUrl": url})),
            Err(e) => {
                error!("Download URL request failed: {}", e);
                ApiResponse::from_error(&e)
            }
        }
    }

    async fn try_download_url(&self, request: DownloadUrlRequest) -> Result<String, ApiError> {
        let Some(filename) = request.filename.filter(|s| !s.is_empty()) else {
            return Err(ApiError::Validation("Missing filename".to_string()));
        };

        let thumbnail_key = derived_key(&filename);
        let present = self
            .store
            .exists(&self.dest_bucket, &thumbnail_key)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if !present {
            return Err(ApiError::NotFound("Thumbnail not found".to_string()));
        }

        // The save-as name keeps the original filename verbatim, extension
        // included, with "_thumbnail.jpg" appended.
        let disposition = format!("attachment; filename=\"{}_thumbnail.jpg\"", filename);
        self.store
            .presign_get(
                &self.dest_bucket,
                &thumbnail_key,
                Some(&disposition),
                self.expiry_secs,
            )
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}
