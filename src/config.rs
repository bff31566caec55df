use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub s3: S3Config,
    pub pipeline: PipelineConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Bucket clients upload originals into.
    pub source_bucket: String,
    /// Bucket thumbnails are written to.
    pub dest_bucket: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "".to_string(),
            region: "".to_string(),
            access_key: "".to_string(),
            secret_key: "".to_string(),
            source_bucket: "".to_string(),
            dest_bucket: "".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target bounding box as "<width>x<height>".
    pub thumbnail_size: String,
    /// JPEG quality (1-100) for encoded thumbnails.
    pub jpeg_quality: u8,
    /// How many records of a batch are in flight at once.
    pub max_concurrency: usize,
    /// Lifetime of issued presigned URLs.
    pub url_expiry_secs: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: "256x256".to_string(),
            jpeg_quality: 85,
            max_concurrency: 4,
            url_expiry_secs: 3600,
        }
    }
}

/// Parsed form of the `"<width>x<height>"` thumbnail bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailBox {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailBox {
    pub fn parse(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| anyhow!("thumbnail size {:?} is not of the form <width>x<height>", s))?;
        let width: u32 = w
            .trim()
            .parse()
            .with_context(|| format!("invalid thumbnail width in {:?}", s))?;
        let height: u32 = h
            .trim()
            .parse()
            .with_context(|| format!("invalid thumbnail height in {:?}", s))?;
        if width == 0 || height == 0 {
            return Err(anyhow!("thumbnail size {:?} has a zero dimension", s));
        }
        Ok(Self { width, height })
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Environment overrides, read once at startup. These match the names the
    /// deployment platform sets: SOURCE_BUCKET, DEST_BUCKET, THUMBNAIL_SIZE.
    pub fn apply_env_overrides(&mut self) {
        self.override_buckets(
            env::var("SOURCE_BUCKET").ok(),
            env::var("DEST_BUCKET").ok(),
            env::var("THUMBNAIL_SIZE").ok(),
        );
    }

    fn override_buckets(
        &mut self,
        source_bucket: Option<String>,
        dest_bucket: Option<String>,
        thumbnail_size: Option<String>,
    ) {
        if let Some(bucket) = source_bucket {
            self.s3.source_bucket = bucket;
        }
        if let Some(bucket) = dest_bucket {
            self.s3.dest_bucket = bucket;
        }
        if let Some(size) = thumbnail_size {
            self.pipeline.thumbnail_size = size;
        }
    }

    /// Parse and validate the thumbnail bound. Called once at startup so a
    /// malformed size fails the process instead of every record.
    pub fn thumbnail_box(&self) -> Result<ThumbnailBox> {
        ThumbnailBox::parse(&self.pipeline.thumbnail_size)
    }
}
