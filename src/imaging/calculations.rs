//! Pure geometry for cropping and compositing.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Three coordinate spaces are involved:
//!
//! ```text
//! natural    full-resolution photo pixels (what the compositor samples)
//! displayed  the photo as rendered: fitted to the viewport, then zoomed
//! output     the fixed size × size canvas
//! ```
//!
//! The crop rectangle lives in displayed space because that is where the
//! user drags it. [`map_to_natural`] converts it for sampling.

use super::backend::Dimensions;
use super::params::Zoom;

/// Smallest crop side, in displayed pixels.
pub const MIN_CROP_SIDE: f64 = 1.0;

/// Share of the shorter displayed edge covered by a fresh crop.
pub const DEFAULT_COVERAGE: f64 = 0.9;

const EPSILON: f64 = 1e-9;

/// Size of the photo as rendered, in (fractional) displayed pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn shorter_edge(self) -> f64 {
        self.width.min(self.height)
    }
}

/// Square crop region in displayed space.
///
/// Stored as `(x, y, side)` so the 1:1 aspect cannot be broken; `width()` and
/// `height()` both report the side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    x: f64,
    y: f64,
    side: f64,
}

impl CropRect {
    pub fn square(x: f64, y: f64, side: f64) -> Self {
        Self { x, y, side }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.side
    }

    pub fn height(&self) -> f64 {
        self.side
    }

    pub fn side(&self) -> f64 {
        self.side
    }

    pub fn right(&self) -> f64 {
        self.x + self.side
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.side
    }

    /// True when the rectangle lies inside `bounds` (with float tolerance).
    pub fn is_within(&self, bounds: DisplaySize) -> bool {
        self.x >= -EPSILON
            && self.y >= -EPSILON
            && self.right() <= bounds.width + EPSILON
            && self.bottom() <= bounds.height + EPSILON
    }

    /// Multiply every component by `factor` (used when the zoom changes).
    pub fn scaled(&self, factor: f64) -> Self {
        Self::square(self.x * factor, self.y * factor, self.side * factor)
    }
}

/// Crop handle being dragged during a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl CropHandle {
    /// Horizontal direction the dragged edge moves the rectangle:
    /// `1` right edge, `-1` left edge, `0` no horizontal edge.
    fn horizontal(self) -> i8 {
        match self {
            CropHandle::TopRight | CropHandle::Right | CropHandle::BottomRight => 1,
            CropHandle::TopLeft | CropHandle::Left | CropHandle::BottomLeft => -1,
            CropHandle::Top | CropHandle::Bottom => 0,
        }
    }

    fn vertical(self) -> i8 {
        match self {
            CropHandle::BottomLeft | CropHandle::Bottom | CropHandle::BottomRight => 1,
            CropHandle::TopLeft | CropHandle::Top | CropHandle::TopRight => -1,
            CropHandle::Left | CropHandle::Right => 0,
        }
    }
}

/// One update from the crop interaction layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropInteraction {
    /// Drag the whole rectangle by a displayed-pixel delta.
    Move { dx: f64, dy: f64 },
    /// Drag one handle by a displayed-pixel delta.
    Resize { handle: CropHandle, dx: f64, dy: f64 },
    /// A raw rectangle reported by an external crop widget.
    Replace {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

/// Size of the photo once fitted to the viewport width, before zoom.
///
/// Photos narrower than `max_width` render at natural size; wider photos are
/// scaled down to `max_width` keeping their aspect. `max_width == 0` disables
/// fitting.
pub fn fitted_size(natural: Dimensions, max_width: u32) -> DisplaySize {
    let w = natural.width as f64;
    let h = natural.height as f64;
    if max_width == 0 || natural.width <= max_width {
        return DisplaySize::new(w, h);
    }
    let ratio = max_width as f64 / w;
    DisplaySize::new(max_width as f64, h * ratio)
}

/// Displayed size: fitted size multiplied by zoom.
pub fn displayed_size(natural: Dimensions, max_width: u32, zoom: Zoom) -> DisplaySize {
    let fitted = fitted_size(natural, max_width);
    DisplaySize::new(fitted.width * zoom.value(), fitted.height * zoom.value())
}

/// Centered square crop covering `coverage` of the shorter displayed edge.
///
/// # Examples
/// ```
/// # use profile_frame::imaging::{DisplaySize, initial_crop};
/// // 2000×1000 landscape at 90% → 900×900, centered horizontally
/// let crop = initial_crop(DisplaySize::new(2000.0, 1000.0), 0.9);
/// assert_eq!(crop.side(), 900.0);
/// assert_eq!((crop.x(), crop.y()), (550.0, 50.0));
/// ```
pub fn initial_crop(displayed: DisplaySize, coverage: f64) -> CropRect {
    let coverage = if coverage.is_finite() {
        coverage.clamp(0.0, 1.0)
    } else {
        DEFAULT_COVERAGE
    };
    let shorter = displayed.shorter_edge().max(0.0);
    let side = (shorter * coverage).max(MIN_CROP_SIDE.min(shorter));
    CropRect::square(
        (displayed.width - side) / 2.0,
        (displayed.height - side) / 2.0,
        side,
    )
}

/// Force a crop back inside `bounds`.
///
/// The side is capped at the shorter edge (and floored at [`MIN_CROP_SIDE`]),
/// then the position is clamped so the rectangle does not overhang.
pub fn clamp_crop(rect: CropRect, bounds: DisplaySize) -> CropRect {
    let shorter = bounds.shorter_edge().max(0.0);
    let side = if rect.side.is_finite() {
        rect.side.clamp(MIN_CROP_SIDE.min(shorter), shorter)
    } else {
        shorter
    };
    let x = finite_or_zero(rect.x).clamp(0.0, (bounds.width - side).max(0.0));
    let y = finite_or_zero(rect.y).clamp(0.0, (bounds.height - side).max(0.0));
    CropRect::square(x, y, side)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Apply one interaction to `current`, keeping 1:1 aspect and staying inside `bounds`.
pub fn apply_interaction(
    current: CropRect,
    interaction: CropInteraction,
    bounds: DisplaySize,
) -> CropRect {
    let next = match interaction {
        CropInteraction::Move { dx, dy } => {
            CropRect::square(current.x + dx, current.y + dy, current.side)
        }
        CropInteraction::Resize { handle, dx, dy } => resize(current, handle, dx, dy, bounds),
        CropInteraction::Replace {
            x,
            y,
            width,
            height,
        } => CropRect::square(x, y, width.abs().min(height.abs())),
    };
    clamp_crop(next, bounds)
}

/// Resize around the anchor opposite to `handle`.
///
/// Corner handles follow whichever axis was dragged further. Edge handles
/// resize along their axis and grow the other axis symmetrically around the
/// rectangle's center, so the adjacent edges move with it.
fn resize(current: CropRect, handle: CropHandle, dx: f64, dy: f64, bounds: DisplaySize) -> CropRect {
    let hx = handle.horizontal();
    let hy = handle.vertical();

    // Anchors: the edge that stays put on each axis.
    let anchor_x = if hx > 0 { current.x } else { current.right() };
    let anchor_y = if hy > 0 { current.y } else { current.bottom() };

    let proposed_w = current.side + f64::from(hx) * dx;
    let proposed_h = current.side + f64::from(hy) * dy;

    let proposed = match (hx, hy) {
        (0, _) => proposed_h,
        (_, 0) => proposed_w,
        _ => proposed_w.max(proposed_h),
    };

    // Room available on each axis in the direction of growth.
    let room_x = match hx {
        1 => bounds.width - anchor_x,
        -1 => anchor_x,
        _ => bounds.width,
    };
    let room_y = match hy {
        1 => bounds.height - anchor_y,
        -1 => anchor_y,
        _ => bounds.height,
    };
    let max_side = room_x.min(room_y).max(0.0);
    let side = proposed.clamp(MIN_CROP_SIDE.min(max_side), max_side);

    let x = match hx {
        1 => anchor_x,
        -1 => anchor_x - side,
        _ => current.x + (current.side - side) / 2.0,
    };
    let y = match hy {
        1 => anchor_y,
        -1 => anchor_y - side,
        _ => current.y + (current.side - side) / 2.0,
    };
    CropRect::square(x, y, side)
}

/// Natural-to-displayed ratios per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

pub fn scale_factors(natural: Dimensions, displayed: DisplaySize) -> ScaleFactors {
    let ratio = |n: u32, d: f64| if d > 0.0 { n as f64 / d } else { 1.0 };
    ScaleFactors {
        x: ratio(natural.width, displayed.width),
        y: ratio(natural.height, displayed.height),
    }
}

/// Whole-pixel rectangle in natural space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Map a displayed-space crop onto natural pixels.
///
/// Each edge is scaled by its axis factor, rounded to the nearest pixel and
/// clamped to the natural bounds. The result is never empty and never
/// extends past the photo.
pub fn map_to_natural(crop: &CropRect, displayed: DisplaySize, natural: Dimensions) -> PixelRegion {
    let scale = scale_factors(natural, displayed);
    let (x, width) = map_axis(crop.x, crop.right(), scale.x, natural.width);
    let (y, height) = map_axis(crop.y, crop.bottom(), scale.y, natural.height);
    PixelRegion {
        x,
        y,
        width,
        height,
    }
}

fn map_axis(start: f64, end: f64, scale: f64, limit: u32) -> (u32, u32) {
    let limit = limit.max(1);
    let to_px = |v: f64| (v * scale).round().clamp(0.0, limit as f64) as u32;
    let mut lo = to_px(start);
    let hi = to_px(end);
    if lo >= limit {
        lo = limit - 1;
    }
    let len = hi.saturating_sub(lo).max(1);
    (lo, len.min(limit - lo))
}
