//! Image compositing: pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Crop geometry** | pure functions in `calculations` |
//! | **Composite** | `crop_imm` + `resize` + `overlay` |
//! | **Encode** | `PngEncoder` (lossless) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry and coordinate mapping (unit testable)
//! - **Parameters**: Data structures describing a composite
//! - **Backend**: [`CompositeBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, CompositeBackend, DecodedImage, Dimensions, Raster};
pub use calculations::{
    CropHandle, CropInteraction, CropRect, DEFAULT_COVERAGE, DisplaySize, MIN_CROP_SIDE,
    PixelRegion, ScaleFactors, apply_interaction, clamp_crop, displayed_size, fitted_size,
    initial_crop, map_to_natural, scale_factors,
};
pub use operations::{composite, plan_composite};
pub use params::{CompositeParams, CompositePlan, OUTPUT_SIZE, ResampleFilter, Zoom};
pub use rust_backend::RustBackend;
