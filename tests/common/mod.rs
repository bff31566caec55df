#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use s3_thumbnailer::storage::ObjectStore;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: Vec<(String, String)>,
}

/// In-memory object store for pipeline and issuer tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn seed(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: "application/octet-stream".to_string(),
                metadata: Vec::new(),
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys_in(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key)
            .map(|o| o.data)
            .ok_or_else(|| anyhow!("no such object: {}/{}", bucket, key))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &[(String, String)],
    ) -> Result<()> {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: body.to_vec(),
                content_type: content_type.to_string(),
                metadata: metadata.to_vec(),
            },
        );
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.object(bucket, key).is_some())
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String> {
        Ok(format!(
            "https://{}.storage.test/{}?X-Amz-Expires={}&Content-Type={}",
            bucket, key, expiry_secs, content_type
        ))
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        content_disposition: Option<&str>,
        expiry_secs: u32,
    ) -> Result<String> {
        let disposition = content_disposition
            .map(|d| format!("&response-content-disposition={}", d))
            .unwrap_or_default();
        Ok(format!(
            "https://{}.storage.test/{}?X-Amz-Expires={}{}",
            bucket, key, expiry_secs, disposition
        ))
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 90, 160])));
    encode(&image, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 60, 20])));
    encode(&image, ImageFormat::Jpeg)
}

pub fn webp_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 140, 70])));
    encode(&image, ImageFormat::WebP)
}

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])));
    encode(&image, ImageFormat::Bmp)
}

/// PNG that is fully transparent everywhere.
pub fn transparent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image =
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0])));
    encode(&image, ImageFormat::Png)
}
