//! Turning response payloads into images.

use bytes::Bytes;
use image::RgbImage;

/// Errors produced while decoding a response payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not an image in any supported format.
    #[error("{0}")]
    Codec(#[from] image::ImageError),

    /// The server sent an empty payload.
    #[error("empty image payload")]
    Empty,
}

/// Converts one response payload into an image value.
pub trait ImageDecoder: Send + Sync + 'static {
    type Image: Send + 'static;

    fn decode(&self, payload: Bytes) -> Result<Self::Image, DecodeError>;
}

/// Decodes encoded image files (PNG, JPEG, BMP) into 8-bit RGB pixels.
///
/// The format is detected from the payload. Alpha and grayscale sources
/// are converted to RGB.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecDecoder;

impl ImageDecoder for CodecDecoder {
    type Image = RgbImage;

    fn decode(&self, payload: Bytes) -> Result<RgbImage, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(image::load_from_memory(&payload)?.into_rgb8())
    }
}

/// Passes payloads through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl ImageDecoder for RawDecoder {
    type Image = Bytes;

    fn decode(&self, payload: Bytes) -> Result<Bytes, DecodeError> {
        Ok(payload)
    }
}
