//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity (frame, photo, event) leads with its identity: a positional
//! index and name. Sources, ids and geometry follow as indented context
//! lines. `data:` payloads are summarized, never printed in full.
//!
//! # Output Format
//!
//! ## Frames
//!
//! ```text
//! Frames
//! 001 frame1 (selected)
//!     Source: https://res.cloudinary.com/…/frame.png
//! 002 gold
//!     Source: image/png data (48213 bytes)
//! ```
//!
//! ## Compose
//!
//! ```text
//! Photo: portrait.jpg (2000x1000)
//!     Displayed: 640x320 at zoom 1.0
//!     Crop: 288 at (176, 16)
//! Frame: frame1
//!     Region: 900x900 at (550, 50)
//! Exported → ./st-patricks-175th.png (1080x1080)
//! ```
//!
//! ## Events
//!
//! ```text
//! Events
//! 001 175th Anniversary [175th]
//!     Id: 0b6f…
//!     Created: 2025-03-17 09:00 UTC
//! ```
//!
//! # Architecture
//!
//! Each entity has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::admin::EventRecord;
use crate::imaging::{CropRect, Dimensions, DisplaySize, Zoom};
use crate::registry::FrameRegistry;
use crate::session::ExportOutcome;
use crate::source::ImageSource;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Whole-pixel rendering of a displayed-space length.
fn px(v: f64) -> String {
    format!("{}", v.round() as i64)
}

// ============================================================================
// Frames
// ============================================================================

pub fn format_frames(registry: &FrameRegistry) -> Vec<String> {
    let mut lines = vec!["Frames".to_string()];
    if registry.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    let selected = registry.selected_name();
    for (i, frame) in registry.iter().enumerate() {
        let marker = if selected == Some(frame.name.as_str()) {
            " (selected)"
        } else {
            ""
        };
        lines.push(format!("{} {}{}", format_index(i + 1), frame.name, marker));
        lines.push(format!("{}Source: {}", indent(1), frame.source.describe()));
    }
    lines
}

pub fn print_frames(registry: &FrameRegistry) {
    for line in format_frames(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// Compose
// ============================================================================

/// Photo header plus the current displayed geometry and crop.
pub fn format_crop(
    source: &ImageSource,
    natural: Dimensions,
    displayed: DisplaySize,
    zoom: Zoom,
    crop: &CropRect,
) -> Vec<String> {
    vec![
        format!(
            "Photo: {} ({}x{})",
            source.describe(),
            natural.width,
            natural.height
        ),
        format!(
            "{}Displayed: {}x{} at zoom {:.1}",
            indent(1),
            px(displayed.width),
            px(displayed.height),
            zoom.value()
        ),
        format!(
            "{}Crop: {} at ({}, {})",
            indent(1),
            px(crop.side()),
            px(crop.x()),
            px(crop.y())
        ),
    ]
}

pub fn format_export(outcome: &ExportOutcome) -> Vec<String> {
    let r = outcome.region;
    vec![
        format!("Frame: {}", outcome.frame),
        format!(
            "{}Region: {}x{} at ({}, {})",
            indent(1),
            r.width,
            r.height,
            r.x,
            r.y
        ),
        format!(
            "Exported → {} ({}x{})",
            outcome.path.display(),
            outcome.size,
            outcome.size
        ),
    ]
}

pub fn print_compose(crop_lines: &[String], outcome: &ExportOutcome) {
    for line in crop_lines.iter().cloned().chain(format_export(outcome)) {
        println!("{}", line);
    }
}

// ============================================================================
// Events
// ============================================================================

pub fn format_events(events: &[EventRecord]) -> Vec<String> {
    let mut lines = vec!["Events".to_string()];
    if events.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    for (i, event) in events.iter().enumerate() {
        lines.push(format!(
            "{} {} [{}]",
            format_index(i + 1),
            event.name,
            event.slug
        ));
        lines.push(format!("{}Id: {}", indent(1), event.id));
        lines.push(format!(
            "{}Created: {}",
            indent(1),
            event.created_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    lines
}

pub fn print_events(events: &[EventRecord]) {
    for line in format_events(events) {
        println!("{}", line);
    }
}
