//! Synthetic JPEG used as the report-form upload

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, GenericImageView, ImageFormat, RgbImage};
use tracing::debug;

use crate::error::{VerifyError, VerifyResult};

pub const FIXTURE_SIZE: u32 = 10;
const FIXTURE_QUALITY: u8 = 90;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Encode the upload image.
///
/// The pixel data is a fixed gradient, so the bytes are identical from run to
/// run.
pub fn synthetic_jpeg() -> VerifyResult<Vec<u8>> {
    let img = RgbImage::from_fn(FIXTURE_SIZE, FIXTURE_SIZE, |x, y| {
        let shade = ((x + y) * 12) as u8;
        image::Rgb([shade, 128, 255 - shade])
    });

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, FIXTURE_QUALITY).encode(
        img.as_raw(),
        FIXTURE_SIZE,
        FIXTURE_SIZE,
        ColorType::Rgb8,
    )?;

    Ok(bytes)
}

/// Decode `bytes` as a JPEG and return its dimensions
pub fn inspect_jpeg(bytes: &[u8]) -> VerifyResult<(u32, u32)> {
    if bytes.len() < 4 || bytes[..2] != SOI || bytes[bytes.len() - 2..] != EOI {
        return Err(VerifyError::Fixture(
            "missing JPEG start/end of image markers".to_string(),
        ));
    }

    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| VerifyError::Fixture(format!("JPEG does not decode: {}", e)))?;

    Ok(img.dimensions())
}

/// Write the upload image to `path`, creating parent directories
pub fn write_upload_fixture(path: &Path) -> VerifyResult<usize> {
    let bytes = synthetic_jpeg()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;

    debug!("Wrote {} byte upload fixture to {}", bytes.len(), path.display());
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_jpeg_decodes() {
        let bytes = synthetic_jpeg().unwrap();
        assert_eq!(inspect_jpeg(&bytes).unwrap(), (FIXTURE_SIZE, FIXTURE_SIZE));
    }

    #[test]
    fn test_synthetic_jpeg_is_deterministic() {
        assert_eq!(synthetic_jpeg().unwrap(), synthetic_jpeg().unwrap());
    }

    #[test]
    fn test_truncated_jpeg_rejected() {
        let bytes = synthetic_jpeg().unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(inspect_jpeg(truncated), Err(VerifyError::Fixture(_))));
    }

    #[test]
    fn test_png_rejected() {
        assert!(inspect_jpeg(b"\x89PNG\r\n\x1a\n").is_err());
    }
}
