//! The thumbnail pipeline: per-record fetch → decode → validate → resize →
//! normalize → encode → store, driven over a notification batch with bounded
//! concurrency.
//!
//! Record failures are contained: a record that cannot be thumbnailed is
//! logged and skipped, and the batch still succeeds.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{Config, ThumbnailBox};
use crate::error::SkipReason;
use crate::event::{BatchOutcome, NotificationBatch, NotificationRecord};
use crate::storage::ObjectStore;
use crate::thumbnail;

/// Destination key for a source key: `thumbnails/<stem>_thumb.jpg`, where
/// `<stem>` is the final path segment with its extension stripped. Pure, so
/// reprocessing a source always overwrites the same destination.
pub fn derived_key(source_key: &str) -> String {
    let basename = source_key.rsplit('/').next().unwrap_or(source_key);
    let stem = match basename.rfind('.') {
        // A leading dot is a hidden-file name, not an extension.
        Some(0) | None => basename,
        Some(index) => &basename[..index],
    };
    format!("thumbnails/{}_thumb.jpg", stem)
}

/// Outcome of one record: the derived key written, or why it was skipped.
#[derive(Debug)]
pub struct RecordReport {
    pub source_key: String,
    pub outcome: Result<String, SkipReason>,
}

#[derive(Debug)]
pub struct BatchReport {
    /// Records present in the batch, including skipped ones.
    pub total: usize,
    pub reports: Vec<RecordReport>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    /// The invocation result document. Reports the total record count, not
    /// the written count, matching the established contract.
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome {
            message: "Images processed successfully".to_string(),
            processed_count: self.total,
        }
    }
}

pub struct Pipeline<S> {
    store: Arc<S>,
    dest_bucket: String,
    bounds: ThumbnailBox,
    jpeg_quality: u8,
    max_concurrency: usize,
}

impl<S: ObjectStore + 'static> Pipeline<S> {
    pub fn new(store: Arc<S>, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            dest_bucket: config.s3.dest_bucket.clone(),
            bounds: config.thumbnail_box()?,
            jpeg_quality: config.pipeline.jpeg_quality,
            max_concurrency: config.pipeline.max_concurrency.max(1),
        })
    }

    /// Process every record of a batch. Records are independent (distinct
    /// source and destination keys, no shared state), so they fan out across
    /// a bounded number of in-flight tasks.
    pub async fn process_batch(&self, batch: NotificationBatch) -> BatchReport {
        let total = batch.records.len();
        info!("Processing batch of {} records", total);

        let reports: Vec<RecordReport> = stream::iter(batch.records)
            .map(|record| self.process_record(record))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        info!(
            "Batch done: {} of {} records produced thumbnails",
            reports.iter().filter(|r| r.outcome.is_ok()).count(),
            total
        );
        BatchReport { total, reports }
    }

    async fn process_record(&self, record: NotificationRecord) -> RecordReport {
        let bucket = record.bucket_name().to_string();
        let key = record.decoded_key();
        info!("Processing image: {} from bucket: {}", key, bucket);

        let outcome = self.thumbnail_one(&bucket, &key).await;
        match &outcome {
            Ok(dest_key) => info!("Thumbnail created: {}", dest_key),
            Err(SkipReason::UnsupportedFormat(format)) => {
                warn!("Unsupported format {:?} for {}", format, key)
            }
            Err(reason) => error!("Error processing image {}: {}", key, reason),
        }

        RecordReport { source_key: key, outcome }
    }

    async fn thumbnail_one(&self, bucket: &str, key: &str) -> Result<String, SkipReason> {
        let source = self
            .store
            .get(bucket, key)
            .await
            .map_err(SkipReason::Fetch)?;
        let source_size = source.len();

        // Decode, resize and encode are CPU-bound; keep them off the
        // async workers.
        let bounds = self.bounds;
        let quality = self.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, SkipReason> {
            let format = image::guess_format(&source)
                .map_err(|e| SkipReason::Decode(e.to_string()))?;
            if !thumbnail::is_allowed(format) {
                return Err(SkipReason::UnsupportedFormat(format));
            }
            let image = image::load_from_memory_with_format(&source, format)
                .map_err(|e| SkipReason::Decode(e.to_string()))?;

            let resized = thumbnail::fit_within(image, bounds);
            let rgb = thumbnail::flatten_to_rgb(resized);
            thumbnail::encode_jpeg(&rgb, quality)
                .map_err(|e| SkipReason::Encode(e.to_string()))
        })
        .await
        .map_err(|e| SkipReason::Encode(format!("image worker failed: {}", e)))??;

        let dest_key = derived_key(key);
        let metadata = [
            ("original-key".to_string(), key.to_string()),
            ("original-size".to_string(), source_size.to_string()),
            ("thumbnail-size".to_string(), jpeg.len().to_string()),
        ];
        self.store
            .put(&self.dest_bucket, &dest_key, &jpeg, "image/jpeg", &metadata)
            .await
            .map_err(SkipReason::Store)?;

        Ok(dest_key)
    }
}
