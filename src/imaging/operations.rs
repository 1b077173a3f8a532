//! High-level compositing operations.
//!
//! These functions combine calculations with backend execution. They take the
//! session's geometry, compute the plan, and call the backend.

use super::backend::{BackendError, CompositeBackend, DecodedImage, Dimensions, Raster};
use super::calculations::{CropRect, DisplaySize, map_to_natural};
use super::params::{CompositeParams, CompositePlan, ResampleFilter};
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Plan a composite without executing it.
///
/// Maps the committed crop from displayed space into natural pixels; the
/// output is always `size × size` whatever the crop's absolute size.
pub fn plan_composite(
    natural: Dimensions,
    displayed: DisplaySize,
    crop: &CropRect,
    size: u32,
    filter: ResampleFilter,
) -> CompositePlan {
    let region = map_to_natural(crop, displayed, natural);
    debug!(
        crop_x = crop.x(),
        crop_y = crop.y(),
        crop_side = crop.side(),
        region_x = region.x,
        region_y = region.y,
        region_w = region.width,
        region_h = region.height,
        "mapped crop to natural pixels"
    );
    CompositePlan {
        region,
        size,
        filter,
    }
}

/// Composite the photo and frame according to `plan`.
///
/// The photo layer is drawn first and the frame last; there is no other
/// ordering.
pub fn composite(
    backend: &impl CompositeBackend,
    photo: &DecodedImage,
    frame: &DecodedImage,
    plan: &CompositePlan,
) -> Result<Raster> {
    let raster = backend.composite(&CompositeParams { photo, frame, plan })?;
    if raster.width() != plan.size || raster.height() != plan.size {
        return Err(BackendError::ProcessingFailed(format!(
            "Backend produced {}x{}, expected {}x{}",
            raster.width(),
            raster.height(),
            plan.size,
            plan.size
        )));
    }
    Ok(raster)
}
