//! Compositing backend trait and shared pixel types.
//!
//! The [`CompositeBackend`] trait defines the three operations the pipeline
//! needs: decode, composite, and encode. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` below.
//!
//! Decoded pixels are always owned RGBA buffers. Remote images are fetched as
//! bytes and decoded here, so nothing ever ends up in a state where its pixels
//! cannot be read back for export.

use super::params::CompositeParams;
use image::RgbaImage;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A fully decoded image, cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// The composited `size × size` output.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds, like `RgbaImage`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Trait for compositing backends.
///
/// `Send + Sync` so a backend can sit behind an `Arc` and be used from
/// `spawn_blocking` while the async side keeps the session responsive.
pub trait CompositeBackend: Send + Sync {
    /// Decode encoded image bytes (PNG, JPEG, GIF, WebP) into RGBA pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, BackendError>;

    /// Draw the planned photo region stretched to the output, then the frame on top.
    fn composite(&self, params: &CompositeParams<'_>) -> Result<Raster, BackendError>;

    /// Lossless PNG encoding of a raster.
    fn encode_png(&self, raster: &Raster) -> Result<Vec<u8>, BackendError>;
}
