//! Pure Rust compositing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::load_from_memory` |
//! | Crop | `image::imageops::crop_imm` |
//! | Stretch to output | `image::imageops::resize` (filter from the plan) |
//! | Frame overlay | `image::imageops::overlay` (alpha "over") |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |

use super::backend::{BackendError, CompositeBackend, DecodedImage, Raster};
use super::params::CompositeParams;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

/// Extensions whose decoders are compiled in.
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Returns the image file extensions this backend can decode.
pub fn supported_input_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

/// Backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Stretch `image` to `size × size` unless it already has that shape.
fn fit_square(image: &RgbaImage, size: u32, filter: FilterType) -> RgbaImage {
    if image.width() == size && image.height() == size {
        return image.clone();
    }
    imageops::resize(image, size, size, filter)
}

impl CompositeBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, BackendError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| BackendError::Decode(format!("Failed to decode image: {}", e)))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(BackendError::Decode("Image has zero area".into()));
        }
        Ok(DecodedImage::new(img.to_rgba8()))
    }

    fn composite(&self, params: &CompositeParams<'_>) -> Result<Raster, BackendError> {
        let plan = params.plan;
        let region = plan.region;
        let photo = params.photo.pixels();

        if plan.size == 0 {
            return Err(BackendError::ProcessingFailed(
                "Output size must be non-zero".into(),
            ));
        }
        if region.width == 0
            || region.height == 0
            || region.x + region.width > photo.width()
            || region.y + region.height > photo.height()
        {
            return Err(BackendError::ProcessingFailed(format!(
                "Region {}x{}+{}+{} outside photo {}x{}",
                region.width,
                region.height,
                region.x,
                region.y,
                photo.width(),
                photo.height()
            )));
        }

        let filter = FilterType::from(plan.filter);

        // Photo layer: the natural-pixel region stretched over the whole canvas.
        let cropped = imageops::crop_imm(photo, region.x, region.y, region.width, region.height)
            .to_image();
        let mut canvas = fit_square(&cropped, plan.size, filter);

        // Frame layer, always last.
        let frame = fit_square(params.frame.pixels(), plan.size, filter);
        imageops::overlay(&mut canvas, &frame, 0, 0);

        Ok(Raster::new(canvas))
    }

    fn encode_png(&self, raster: &Raster) -> Result<Vec<u8>, BackendError> {
        let image = raster.as_image();
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BackendError::Encode(format!("PNG encode failed: {}", e)))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{CompositePlan, OUTPUT_SIZE, PixelRegion, ResampleFilter};
    use crate::test_helpers::{encode_png, quadrant_photo, solid, window_frame};
    use image::Rgba;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const GOLD: [u8; 4] = [212, 175, 55, 255];

    fn plan(region: PixelRegion, size: u32) -> CompositePlan {
        CompositePlan {
            region,
            size,
            filter: ResampleFilter::Nearest,
        }
    }

    fn full(width: u32, height: u32) -> PixelRegion {
        PixelRegion {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[test]
    fn supported_extensions_cover_upload_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "gif", "webp"] {
            assert!(exts.contains(expected), "expected {expected}");
        }
    }

    #[test]
    fn decode_png_bytes() {
        let bytes = encode_png(&solid(20, 10, RED));
        let decoded = RustBackend::new().decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions().width, 20);
        assert_eq!(decoded.dimensions().height, 10);
        assert_eq!(decoded.pixels().get_pixel(3, 3).0, RED);
    }

    #[test]
    fn decode_garbage_errors() {
        let result = RustBackend::new().decode(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn output_is_requested_size_for_small_and_large_crops() {
        let backend = RustBackend::new();
        let frame = DecodedImage::new(solid(50, 50, [0, 0, 0, 0]));

        let small = DecodedImage::new(solid(200, 200, RED));
        let raster = backend
            .composite(&CompositeParams {
                photo: &small,
                frame: &frame,
                plan: &plan(full(200, 200), OUTPUT_SIZE),
            })
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (1080, 1080));

        let large = DecodedImage::new(solid(4000, 4000, RED));
        let raster = backend
            .composite(&CompositeParams {
                photo: &large,
                frame: &frame,
                plan: &plan(full(4000, 4000), OUTPUT_SIZE),
            })
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (1080, 1080));
    }

    #[test]
    fn region_selects_the_matching_quadrant() {
        let backend = RustBackend::new();
        let photo = DecodedImage::new(quadrant_photo(200, 200, RED, GREEN, BLUE, GOLD));
        let frame = DecodedImage::new(solid(10, 10, [0, 0, 0, 0]));

        let top_left = backend
            .composite(&CompositeParams {
                photo: &photo,
                frame: &frame,
                plan: &plan(full(100, 100), 64),
            })
            .unwrap();
        assert_eq!(top_left.pixel(0, 0), RED);
        assert_eq!(top_left.pixel(63, 63), RED);

        let bottom_right = backend
            .composite(&CompositeParams {
                photo: &photo,
                frame: &frame,
                plan: &plan(
                    PixelRegion {
                        x: 100,
                        y: 100,
                        width: 100,
                        height: 100,
                    },
                    64,
                ),
            })
            .unwrap();
        assert_eq!(bottom_right.pixel(32, 32), GOLD);
    }

    #[test]
    fn frame_is_drawn_over_photo() {
        let backend = RustBackend::new();
        let photo = DecodedImage::new(solid(100, 100, BLUE));
        let frame = DecodedImage::new(window_frame(100, 10, GOLD));

        let raster = backend
            .composite(&CompositeParams {
                photo: &photo,
                frame: &frame,
                plan: &plan(full(100, 100), 100),
            })
            .unwrap();

        // Opaque border replaces the photo; transparent window shows it.
        assert_eq!(raster.pixel(0, 0), GOLD);
        assert_eq!(raster.pixel(99, 50), GOLD);
        assert_eq!(raster.pixel(50, 50), BLUE);
    }

    #[test]
    fn semi_transparent_frame_blends() {
        let backend = RustBackend::new();
        let photo = DecodedImage::new(solid(4, 4, [0, 0, 0, 255]));
        let frame = DecodedImage::new(solid(4, 4, [255, 255, 255, 128]));

        let raster = backend
            .composite(&CompositeParams {
                photo: &photo,
                frame: &frame,
                plan: &plan(full(4, 4), 4),
            })
            .unwrap();

        let px = raster.pixel(1, 1);
        assert!(px[0] > 100 && px[0] < 160, "expected mid grey, got {px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn composite_is_deterministic() {
        let backend = RustBackend::new();
        let photo = DecodedImage::new(quadrant_photo(300, 200, RED, GREEN, BLUE, GOLD));
        let frame = DecodedImage::new(window_frame(120, 12, GOLD));
        let p = CompositePlan {
            region: PixelRegion {
                x: 37,
                y: 11,
                width: 150,
                height: 150,
            },
            size: 128,
            filter: ResampleFilter::Lanczos3,
        };
        let params = CompositeParams {
            photo: &photo,
            frame: &frame,
            plan: &p,
        };

        let a = backend.composite(&params).unwrap();
        let b = backend.composite(&params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn region_outside_photo_errors() {
        let backend = RustBackend::new();
        let photo = DecodedImage::new(solid(10, 10, RED));
        let frame = DecodedImage::new(solid(10, 10, RED));
        let result = backend.composite(&CompositeParams {
            photo: &photo,
            frame: &frame,
            plan: &plan(
                PixelRegion {
                    x: 5,
                    y: 5,
                    width: 10,
                    height: 10,
                },
                16,
            ),
        });
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn encode_png_roundtrips_dimensions() {
        let backend = RustBackend::new();
        let raster = Raster::new(RgbaImage::from_pixel(32, 32, Rgba(GREEN)));
        let bytes = backend.encode_png(&raster).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert_eq!(decoded.get_pixel(31, 0).0, GREEN);
    }
}
