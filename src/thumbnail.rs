//! Pure image transform: format validation, bounding-box resize, color
//! normalization and JPEG encoding. No I/O happens here.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::config::ThumbnailBox;

/// Formats the pipeline accepts as thumbnail sources.
pub const ALLOWED_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

pub fn is_allowed(format: ImageFormat) -> bool {
    ALLOWED_FORMATS.contains(&format)
}

/// Scale the image down so both dimensions fit within `bounds`, keeping the
/// aspect ratio. Images already inside the box are returned untouched, so a
/// small source is never upscaled.
pub fn fit_within(image: DynamicImage, bounds: ThumbnailBox) -> DynamicImage {
    if image.width() <= bounds.width && image.height() <= bounds.height {
        return image;
    }
    image.resize(bounds.width, bounds.height, FilterType::Lanczos3)
}

/// Normalize to plain three-channel RGB for JPEG.
///
/// Transparent pixels are composited over opaque white; indexed/grayscale
/// sources come out of the decoder as channel images already, so a plain
/// conversion covers them.
pub fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let blend = |channel: u8| -> u8 {
            ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        rgb.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    rgb
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode_image(image)
        .context("Failed to encode JPEG")?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn bounds(width: u32, height: u32) -> ThumbnailBox {
        ThumbnailBox { width, height }
    }

    #[test]
    fn test_fit_within_scales_to_box() {
        let image = DynamicImage::new_rgb8(2000, 1000);
        let resized = fit_within(image, bounds(256, 256));
        assert_eq!((resized.width(), resized.height()), (256, 128));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        let image = DynamicImage::new_rgb8(100, 50);
        let resized = fit_within(image, bounds(256, 256));
        assert_eq!((resized.width(), resized.height()), (100, 50));
    }

    #[test]
    fn test_fit_within_portrait() {
        let image = DynamicImage::new_rgb8(500, 1000);
        let resized = fit_within(image, bounds(256, 256));
        assert_eq!((resized.width(), resized.height()), (128, 256));
    }

    #[test]
    fn test_flatten_composites_over_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([255, 0, 0, 0])); // fully transparent red
        rgba.put_pixel(1, 0, Rgba([255, 0, 0, 255])); // opaque red
        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_flatten_half_transparent_blends_toward_white() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        let pixel = rgb.get_pixel(0, 0);
        // Half-transparent black over white lands near mid-gray.
        for channel in pixel.0 {
            assert!((120..=135).contains(&channel), "channel = {}", channel);
        }
    }

    #[test]
    fn test_encode_jpeg_roundtrip() {
        let rgb = RgbImage::from_pixel(32, 16, Rgb([10, 200, 30]));
        let jpeg = encode_jpeg(&rgb, 85).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_allowed_formats() {
        assert!(is_allowed(ImageFormat::Jpeg));
        assert!(is_allowed(ImageFormat::Png));
        assert!(is_allowed(ImageFormat::WebP));
        assert!(!is_allowed(ImageFormat::Bmp));
        assert!(!is_allowed(ImageFormat::Gif));
    }
}
