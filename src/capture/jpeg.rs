//! JPEG encoder backed by the `image` crate

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use super::{FrameEncoder, ImageError, PixelFormat, RawImage};

/// Quality used when none is configured
pub const DEFAULT_QUALITY: u8 = 80;

/// Encodes raw images as baseline JPEG
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Create an encoder with the given quality (clamped to 1..=100)
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, image: &RawImage) -> Result<Bytes, ImageError> {
        let color = match image.format() {
            PixelFormat::Gray8 => ExtendedColorType::L8,
            PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        };

        let mut out = Vec::with_capacity(image.data().len() / 8);
        ImageJpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(image.data(), image.width(), image.height(), color)
            .map_err(|e| ImageError::Encode(e.to_string()))?;

        Ok(Bytes::from(out))
    }
}
