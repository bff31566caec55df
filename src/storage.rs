//! Object storage access behind a trait seam.
//!
//! `S3Store` talks to any S3-compatible endpoint through rust-s3; tests
//! substitute an in-memory implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, header};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use std::collections::HashMap;

use crate::config::S3Config;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full content of an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Write an object with a content type and `x-amz-meta-*` style
    /// key/value metadata. Overwrites any existing object at `key`.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &[(String, String)],
    ) -> Result<()>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Presigned URL authorizing one PUT of exactly this key and content type.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String>;

    /// Presigned URL authorizing one GET, optionally overriding the
    /// content-disposition the response carries.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        content_disposition: Option<&str>,
        expiry_secs: u32,
    ) -> Result<String>;
}

pub struct S3Store {
    region: Region,
    credentials: Credentials,
}

impl S3Store {
    pub fn new(config: &S3Config) -> Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .context("Failed to create S3 credentials")?;

        Ok(Self { region, credentials })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .with_context(|| format!("Failed to create S3 bucket handle for {}", name))?
            .with_path_style();
        Ok(bucket)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .bucket(bucket)?
            .get_object(key)
            .await
            .with_context(|| format!("Failed to download {} from {}", key, bucket))?;
        Ok(response.bytes().to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &[(String, String)],
    ) -> Result<()> {
        let mut headers = HeaderMap::new();
        for (name, value) in metadata {
            let header_name = HeaderName::from_bytes(format!("x-amz-meta-{}", name).as_bytes())
                .with_context(|| format!("Invalid metadata key {:?}", name))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid metadata value for {:?}", name))?;
            headers.insert(header_name, header_value);
        }

        let handle = (*self.bucket(bucket)?)
            .clone()
            .with_extra_headers(headers)
            .context("Failed to attach metadata headers")?;
        handle
            .put_object_with_content_type(key, body, content_type)
            .await
            .with_context(|| format!("Failed to upload {} to {}", key, bucket))?;
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.bucket(bucket)?.head_object(key).await {
            Ok((_, code)) => Ok(code == 200),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to stat {} in {}", key, bucket))
            }
        }
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).context("Invalid content type")?,
        );
        self.bucket(bucket)?
            .presign_put(key, expiry_secs, Some(headers), None)
            .await
            .with_context(|| format!("Failed to presign upload of {}", key))
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        content_disposition: Option<&str>,
        expiry_secs: u32,
    ) -> Result<String> {
        let queries = content_disposition.map(|disposition| {
            HashMap::from([(
                "response-content-disposition".to_string(),
                disposition.to_string(),
            )])
        });
        self.bucket(bucket)?
            .presign_get(key, expiry_secs, queries)
            .await
            .with_context(|| format!("Failed to presign download of {}", key))
    }
}
