use crate::core::types::FaceRegion;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::DynamicImage;

/// Asynchronously decode an image from bytes using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for large uploads.
pub async fn load_image_from_memory_async(bytes: &[u8]) -> Result<DynamicImage> {
    let bytes = bytes.to_vec(); // Clone to move into blocking task
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).context("Failed to load image from memory")
    })
    .await
    .context("Failed to spawn blocking task for image loading")?
}

/// Crop a face region out of an image. The region is clamped to the image
/// bounds before cropping.
pub fn crop_region(img: &DynamicImage, region: &FaceRegion) -> DynamicImage {
    let x = region.x.min(img.width().saturating_sub(1));
    let y = region.y.min(img.height().saturating_sub(1));
    let w = region.w.min(img.width() - x).max(1);
    let h = region.h.min(img.height() - y).max(1);
    img.crop_imm(x, y, w, h)
}

/// Decode a base64 image payload, stripping an optional data-URL prefix
/// (`data:image/png;base64,...`) first.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };
    BASE64.decode(encoded.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_load_image_async() {
        let result = load_image_from_memory_async(&png_bytes()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_load_garbage_fails() {
        let result = load_image_from_memory_async(b"not an image").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_base64_with_and_without_prefix() {
        let bytes = png_bytes();
        let raw = BASE64.encode(&bytes);
        let prefixed = format!("data:image/png;base64,{raw}");
        assert_eq!(decode_base64_image(&raw).unwrap(), bytes);
        assert_eq!(decode_base64_image(&prefixed).unwrap(), bytes);
    }

    #[test]
    fn test_decode_base64_rejects_garbage() {
        assert!(decode_base64_image("not base64 at all!!!").is_err());
    }

    #[test]
    fn test_crop_region_clamps_to_bounds() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let region = FaceRegion {
            x: 8,
            y: 8,
            w: 20,
            h: 20,
        };
        let cropped = crop_region(&img, &region);
        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
    }
}
