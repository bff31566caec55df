//! Storage change-notification model.
//!
//! Batches arrive as the JSON documents the object store emits on object
//! creation: `{"Records":[{"s3":{"bucket":{"name":..},"object":{"key":..}}}]}`.
//! Object keys are percent-encoded with space as `+`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct NotificationBatch {
    #[serde(rename = "Records")]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

impl NotificationRecord {
    pub fn bucket_name(&self) -> &str {
        &self.s3.bucket.name
    }

    /// The object key with notification encoding undone (`+` is a space,
    /// then percent-decode). Falls back to the raw key if it is not valid
    /// percent-encoding.
    pub fn decoded_key(&self) -> String {
        let plus_decoded = self.s3.object.key.replace('+', " ");
        match urlencoding::decode(&plus_decoded) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => plus_decoded,
        }
    }
}

/// Result document of one batch invocation.
///
/// `processed_count` is the number of records present in the batch, whether
/// or not each produced a thumbnail (skipped records are counted too).
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub message: String,
    pub processed_count: usize,
}
