//! Parameter types for the compositing pipeline.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the geometry in [`calculations`](super::calculations),
//! the high-level [`operations`](super::operations) module, and the
//! [`backend`](super::backend) that does the pixel work. Keeping them apart
//! lets tests swap the backend for a recording mock.
//!
//! ## Types
//!
//! - [`Zoom`]: display zoom factor, clamped to `[0.5, 3.0]` on construction.
//! - [`ResampleFilter`]: resampling filter used when stretching to the output size.
//! - [`CompositePlan`]: owned description of one composite: natural-pixel
//!   source region, output size, filter.
//! - [`CompositeParams`]: a plan plus borrowed photo and frame pixels.

use super::backend::DecodedImage;
use super::calculations::PixelRegion;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Side length of the exported square, in pixels.
pub const OUTPUT_SIZE: u32 = 1080;

/// Display zoom factor applied to the on-screen photo.
///
/// Zoom scales the displayed size only. The natural resolution of the photo
/// never changes, so zoom reaches the compositor solely through the
/// natural-to-displayed ratio.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Zoom(f64);

impl Zoom {
    pub const MIN: f64 = 0.5;
    pub const MAX: f64 = 3.0;
    /// Increment used by zoom in / zoom out when no step is configured.
    pub const STEP: f64 = 0.1;

    /// Build a zoom factor, clamping into `[MIN, MAX]`. NaN maps to 1.0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        // Round away float drift from repeated steps (1.0 + 0.1 * 20 != 3.0).
        let rounded = (value * 1_000_000.0).round() / 1_000_000.0;
        Self(rounded.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn zoomed_in(self, step: f64) -> Self {
        Self::new(self.0 + step.abs())
    }

    pub fn zoomed_out(self, step: f64) -> Self {
        Self::new(self.0 - step.abs())
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Resampling filter for stretching the crop and the frame to the output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Everything needed to composite one output, except the pixels themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositePlan {
    /// Source region in natural (full-resolution) pixel space.
    pub region: PixelRegion,
    /// Output side length; the output is always `size × size`.
    pub size: u32,
    pub filter: ResampleFilter,
}

/// A plan bound to the photo and frame it should be applied to.
#[derive(Debug, Clone, Copy)]
pub struct CompositeParams<'a> {
    pub photo: &'a DecodedImage,
    pub frame: &'a DecodedImage,
    pub plan: &'a CompositePlan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_clamps_to_valid_range() {
        assert_eq!(Zoom::new(0.1).value(), 0.5);
        assert_eq!(Zoom::new(1.7).value(), 1.7);
        assert_eq!(Zoom::new(9.0).value(), 3.0);
    }

    #[test]
    fn zoom_default_is_one() {
        assert_eq!(Zoom::default().value(), 1.0);
    }

    #[test]
    fn zoom_nan_falls_back_to_default() {
        assert_eq!(Zoom::new(f64::NAN), Zoom::default());
    }

    #[test]
    fn zoom_in_stops_at_upper_bound() {
        let mut zoom = Zoom::default();
        for _ in 0..40 {
            zoom = zoom.zoomed_in(Zoom::STEP);
        }
        assert_eq!(zoom.value(), 3.0);
    }

    #[test]
    fn zoom_out_stops_at_lower_bound() {
        let mut zoom = Zoom::default();
        for _ in 0..40 {
            zoom = zoom.zoomed_out(Zoom::STEP);
        }
        assert_eq!(zoom.value(), 0.5);
    }

    #[test]
    fn zoom_steps_do_not_drift() {
        let zoom = Zoom::default().zoomed_in(0.1).zoomed_in(0.1).zoomed_in(0.1);
        assert_eq!(zoom.value(), 1.3);
    }

    #[test]
    fn resample_filter_default_is_lanczos3() {
        assert_eq!(ResampleFilter::default(), ResampleFilter::Lanczos3);
        assert_eq!(FilterType::from(ResampleFilter::default()), FilterType::Lanczos3);
    }

    #[test]
    fn resample_filter_parses_lowercase() {
        let f: ResampleFilter = serde_json::from_str("\"catmullrom\"").unwrap();
        assert_eq!(f, ResampleFilter::CatmullRom);
    }
}
