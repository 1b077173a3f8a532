//! Application configuration.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the working directory (or the directory passed with `--config`) and is
//! merged on top of the stock defaults, so it only needs the keys it wants to
//! change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! state_dir = ".profile-frame"   # Frame registry, events, login attempts, frame cache
//!
//! [output]
//! filename = "st-patricks-175th.png"
//! directory = "."                # Where exports are written
//! filter = "lanczos3"            # nearest | triangle | catmullrom | gaussian | lanczos3
//!
//! [crop]
//! coverage_percent = 90          # Initial crop side as % of the shorter edge
//!
//! [display]
//! max_width = 640                # Viewport width photos are fitted to (0 = no fitting)
//!
//! [zoom]
//! step = 0.1                     # Zoom in / out increment
//!
//! [fetch]
//! timeout_secs = 30
//! cache = true                   # Keep fetched remote frames on disk
//!
//! [logging]
//! level = "info"                 # RUST_LOG overrides this
//!
//! [admin]
//! require_auth = false
//! email = ""
//! password_sha256 = ""
//! role = "admin"                 # viewer | editor | admin | super_admin
//!
//! [frames.seed]                  # Registry contents before frames.json exists
//! frame1 = "https://…"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::auth::Role;
use crate::imaging::ResampleFilter;
use crate::source::ImageSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Frame shipped with the stock configuration.
pub const STOCK_FRAME_URL: &str = "https://res.cloudinary.com/dre0vyh15/image/upload/v1737353892/vecteezy_social-media-beautiful-frame-design-with-red-love-and-blue_13473778_g8qerj.png";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding the registry, event store, login attempts and frame cache.
    pub state_dir: PathBuf,
    pub output: OutputConfig,
    pub crop: CropConfig,
    pub display: DisplayConfig,
    pub zoom: ZoomConfig,
    pub fetch: FetchConfig,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub frames: FramesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".profile-frame"),
            output: OutputConfig::default(),
            crop: CropConfig::default(),
            display: DisplayConfig::default(),
            zoom: ZoomConfig::default(),
            fetch: FetchConfig::default(),
            logging: LoggingConfig::default(),
            admin: AdminConfig::default(),
            frames: FramesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.output.filename.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "output.filename must be a plain file name".into(),
            ));
        }
        if !(1..=100).contains(&self.crop.coverage_percent) {
            return Err(ConfigError::Validation(
                "crop.coverage_percent must be 1-100".into(),
            ));
        }
        if !self.zoom.step.is_finite() || self.zoom.step <= 0.0 {
            return Err(ConfigError::Validation(
                "zoom.step must be a positive number".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be non-zero".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if self.admin.require_auth {
            if self.admin.email.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "admin.email is required when admin.require_auth is set".into(),
                ));
            }
            let hash = &self.admin.password_sha256;
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Validation(
                    "admin.password_sha256 must be a 64-character hex SHA-256 digest".into(),
                ));
            }
        }
        for (name, source) in &self.frames.seed {
            ImageSource::parse(source).map_err(|e| {
                ConfigError::Validation(format!("frames.seed.{name}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Parsed `[frames.seed]` entries in name order.
    pub fn seed_frames(&self) -> Vec<(String, ImageSource)> {
        self.frames
            .seed
            .iter()
            .filter_map(|(name, raw)| {
                ImageSource::parse(raw)
                    .ok()
                    .map(|source| (name.clone(), source))
            })
            .collect()
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub filename: String,
    pub directory: PathBuf,
    pub filter: ResampleFilter,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename: crate::export::DEFAULT_FILENAME.to_string(),
            directory: PathBuf::from("."),
            filter: ResampleFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    pub coverage_percent: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            coverage_percent: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub max_width: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { max_width: 640 }
    }
}

/// Zoom step. The range itself is fixed at `[0.5, 3.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoomConfig {
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            step: crate::imaging::Zoom::STEP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub cache: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub require_auth: bool,
    pub email: String,
    /// Hex SHA-256 of the admin password.
    pub password_sha256: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FramesConfig {
    pub seed: BTreeMap<String, String>,
}

impl Default for FramesConfig {
    fn default() -> Self {
        let seed = ["frame1", "frame2", "frame3"]
            .into_iter()
            .map(|name| (name.to_string(), STOCK_FRAME_URL.to_string()))
            .collect();
        Self { seed }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Profile Frame Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory for the frame registry, event records, login attempts and the
# remote frame cache.
state_dir = ".profile-frame"

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[output]
# Exports are always 1080×1080. Every export is written under this name
# (an earlier export is replaced).
filename = "st-patricks-175th.png"

# Directory exports are written to.
directory = "."

# Resampling filter used to stretch the crop and frame to the output size.
# One of: nearest, triangle, catmullrom, gaussian, lanczos3.
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Cropping and display
# ---------------------------------------------------------------------------
[crop]
# Side of the initial centered crop, as a percentage of the shorter edge.
coverage_percent = 90

[display]
# Photos wider than this are scaled down to fit before zoom is applied.
# 0 shows photos at their natural size.
max_width = 640

[zoom]
# Zoom in / out increment. Zoom always stays within 0.5 - 3.0.
step = 0.1

# ---------------------------------------------------------------------------
# Remote images
# ---------------------------------------------------------------------------
[fetch]
# HTTP timeout for fetching remote photos and frames.
timeout_secs = 30

# Keep fetched remote frames on disk under <state_dir>/frame-cache.
cache = true

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# trace, debug, info, warn or error. The RUST_LOG environment variable
# takes precedence when set.
level = "info"

# ---------------------------------------------------------------------------
# Admin
# ---------------------------------------------------------------------------
[admin]
# Require sign-in for `frames add/remove/select` and `events create/delete`.
# Credentials are read from PROFILE_FRAME_ADMIN_EMAIL and
# PROFILE_FRAME_ADMIN_PASSWORD.
require_auth = false
email = ""
# Hex SHA-256 digest of the admin password.
password_sha256 = ""
# Role granted to the admin account: viewer, editor, admin or super_admin.
# Changing frames and events needs admin or higher.
role = "admin"

# ---------------------------------------------------------------------------
# Frames
# ---------------------------------------------------------------------------
# Initial registry contents, used until <state_dir>/frames.json exists.
# Values are https:// URLs, data:image/...;base64 payloads or local paths.
[frames.seed]
frame1 = "https://res.cloudinary.com/dre0vyh15/image/upload/v1737353892/vecteezy_social-media-beautiful-frame-design-with-red-love-and-blue_13473778_g8qerj.png"
frame2 = "https://res.cloudinary.com/dre0vyh15/image/upload/v1737353892/vecteezy_social-media-beautiful-frame-design-with-red-love-and-blue_13473778_g8qerj.png"
frame3 = "https://res.cloudinary.com/dre0vyh15/image/upload/v1737353892/vecteezy_social-media-beautiful-frame-design-with-red-love-and-blue_13473778_g8qerj.png"
"##
}
