//! # Profile Frame
//!
//! Crop a personal photo to a square, lay a decorative frame over it, and
//! export a 1080×1080 PNG ready for a social-media profile.
//!
//! # Pipeline
//!
//! ```text
//! 1. Load      photo source   →  decoded pixels + centered 90% square crop
//! 2. Adjust    move / resize / zoom the crop in displayed space, then commit
//! 3. Export    committed crop →  natural-pixel region → stretched to 1080²
//!              + selected frame drawn on top → PNG written to disk
//! ```
//!
//! All state for one compose lives in a [`session::Session`]. Nothing is
//! global: the CLI builds a session, drives it, and drops it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Crop geometry, coordinate mapping, and the pixel backend (`image` crate) |
//! | [`session`] | Photo, live/committed crop, zoom, and the single-export gate |
//! | [`export`] | PNG encode and atomic write under the fixed download filename |
//! | [`registry`] | Named frame images with a guaranteed selection |
//! | [`source`] | Remote URL, `data:` payload and local path loading |
//! | [`cache`] | On-disk cache for fetched remote frames |
//! | [`admin`] | Event records store and upload restrictions |
//! | [`auth`] | Identity service, roles and login lockout |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Coordinate Spaces
//!
//! The crop is edited where the user sees it: on the photo as displayed,
//! fitted to the viewport width and then scaled by zoom. Export maps it back
//! to natural pixels with per-axis ratios, so zoom never changes which
//! content is exported, only how finely the crop can be placed.
//!
//! # Image Loading
//!
//! Photos and frames are fetched as bytes and decoded locally, never drawn
//! from a foreign origin. Pixel read-back for export is therefore always
//! allowed. Frames are fully decoded before anything is drawn.

pub mod admin;
pub mod auth;
pub mod cache;
pub mod config;
pub mod export;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod registry;
pub mod session;
pub mod source;

#[cfg(test)]
pub(crate) mod test_helpers;
