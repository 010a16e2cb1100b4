//! Thumbnail derivation for generated images.

use crate::{PlaceholderError, PlaceholderResult};
use image::ImageFormat;
use std::io::Cursor;
use std::time::Duration;
use tracing::instrument;

/// Decodes `bytes`, fits the image inside `max_dim` x `max_dim` keeping its
/// aspect ratio, and re-encodes it as PNG. Images already small enough are
/// re-encoded at their own size.
pub fn make_thumbnail(bytes: &[u8], max_dim: u32) -> PlaceholderResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let thumb = if img.width() > max_dim || img.height() > max_dim {
        img.thumbnail(max_dim, max_dim)
    } else {
        img
    };
    let mut out = Cursor::new(Vec::new());
    thumb.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// [`make_thumbnail`] on the blocking pool, bounded by `limit`.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub async fn derive(bytes: Vec<u8>, max_dim: u32, limit: Duration) -> PlaceholderResult<Vec<u8>> {
    let task = tokio::task::spawn_blocking(move || make_thumbnail(&bytes, max_dim));
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(PlaceholderError::Task(join.to_string())),
        Err(_) => Err(PlaceholderError::Timeout {
            stage: "thumbnail",
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([200u8, 30, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_thumbnail_keeps_aspect() {
        let thumb = make_thumbnail(&png(600, 300), 120).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 60));
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let thumb = make_thumbnail(&png(40, 20), 120).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 20));
    }

    #[tokio::test]
    async fn test_derive_rejects_garbage() {
        let err = derive(b"not an image".to_vec(), 64, Duration::from_secs(5)).await;
        assert!(matches!(err, Err(PlaceholderError::Image(_))));
    }
}
