//! Shared test utilities: synthetic photos and frames built in memory.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let photo = quadrant_photo(200, 100, RED, GREEN, BLUE, GOLD);
//! let frame = window_frame(1080, 40, GOLD);
//! let bytes = encode_png(&photo);
//! ```

use image::{ImageEncoder, Rgba, RgbaImage};
use std::path::Path;

// =========================================================================
// Synthetic images
// =========================================================================

/// Uniformly filled image.
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Image split into four colored quadrants (top-left, top-right,
/// bottom-left, bottom-right), so tests can tell which region got sampled.
pub fn quadrant_photo(
    width: u32,
    height: u32,
    top_left: [u8; 4],
    top_right: [u8; 4],
    bottom_left: [u8; 4],
    bottom_right: [u8; 4],
) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let right = x >= width / 2;
        let bottom = y >= height / 2;
        Rgba(match (right, bottom) {
            (false, false) => top_left,
            (true, false) => top_right,
            (false, true) => bottom_left,
            (true, true) => bottom_right,
        })
    })
}

/// Square frame: opaque border of `border` pixels around a transparent window.
pub fn window_frame(size: u32, border: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let edge = x < border || y < border || x >= size - border || y >= size - border;
        if edge { Rgba(color) } else { Rgba([0, 0, 0, 0]) }
    })
}

// =========================================================================
// Encoding helpers
// =========================================================================

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
    buf
}

/// Write an image to `path` as PNG.
pub fn write_png(path: &Path, image: &RgbaImage) {
    std::fs::write(path, encode_png(image)).unwrap();
}
