/// Image re-encoding
///
/// Every uploaded file is normalized to PNG before it reaches the blob
/// store, whatever the source format was. Decoding and encoding are
/// CPU-bound, so the async entry point runs them on the blocking pool.

use std::io::Cursor;

use image::ImageFormat;
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not decode image: {0}")]
    Decode(image::ImageError),
    #[error("could not encode PNG: {0}")]
    Encode(image::ImageError),
    #[error("image task failed: {0}")]
    Join(String),
}

/// Re-encode arbitrary image bytes as PNG.
pub async fn image_to_png(bytes: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
    // Spawn blocking because decode/encode are CPU-intensive
    task::spawn_blocking(move || image_to_png_blocking(&bytes))
        .await
        .map_err(|e| ConvertError::Join(e.to_string()))?
}

/// Blocking implementation of the PNG re-encode.
pub fn image_to_png_blocking(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let img = image::load_from_memory(bytes).map_err(ConvertError::Decode)?;

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(ConvertError::Encode)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

    fn sample_bmp() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            4,
            4,
            image::Rgb([200, 40, 40]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Bmp).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_reencodes_non_png_to_png() {
        let png = image_to_png(sample_bmp()).await.unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);

        // The pixels survive the round trip
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0), &image::Rgb([200, 40, 40]));
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail_decode() {
        let err = image_to_png(vec![0, 1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }
}
