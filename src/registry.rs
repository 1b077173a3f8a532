//! Frame registry: the named frame images a visitor can composite with.
//!
//! Names are unique keys kept in sorted order. Exactly one frame is selected
//! whenever the registry is non-empty:
//!
//! - the first frame added to an empty registry becomes the selection
//! - removing the selected frame re-points the selection to the first
//!   remaining name, or clears it when nothing is left
//!
//! The registry persists as `frames.json` in the state directory and is
//! seeded from the `[frames.seed]` config table when that file is absent.

use crate::source::ImageSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// File name of the persisted registry inside the state directory.
pub const REGISTRY_FILENAME: &str = "frames.json";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown frame: {0}")]
    UnknownFrame(String),
    #[error("No frames registered")]
    Empty,
    #[error("Frame name must not be empty")]
    EmptyName,
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid registry file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A named frame image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAsset {
    pub name: String,
    pub source: ImageSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRegistry {
    frames: BTreeMap<String, FrameAsset>,
    selected: Option<String>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(name, source)` pairs, selecting the first by name.
    pub fn from_seed<I>(seed: I) -> Self
    where
        I: IntoIterator<Item = (String, ImageSource)>,
    {
        let mut registry = Self::new();
        for (name, source) in seed {
            if name.trim().is_empty() {
                continue;
            }
            registry.frames.insert(
                name.clone(),
                FrameAsset {
                    name,
                    source,
                },
            );
        }
        registry.selected = registry.frames.keys().next().cloned();
        registry
    }

    /// Insert or overwrite a frame. Returns `true` when the name was new.
    pub fn add(&mut self, name: &str, source: ImageSource) -> Result<bool, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let asset = FrameAsset {
            name: name.to_string(),
            source,
        };
        let is_new = self.frames.insert(name.to_string(), asset).is_none();
        if self.selected.is_none() {
            self.selected = Some(name.to_string());
        }
        info!(frame = name, replaced = !is_new, "registered frame");
        Ok(is_new)
    }

    /// Remove a frame, re-pointing the selection if it pointed here.
    pub fn remove(&mut self, name: &str) -> Result<FrameAsset, RegistryError> {
        let removed = self
            .frames
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownFrame(name.to_string()))?;
        if self.selected.as_deref() == Some(name) {
            self.selected = self.frames.keys().next().cloned();
            info!(
                frame = name,
                selected = self.selected.as_deref().unwrap_or("<none>"),
                "removed selected frame"
            );
        } else {
            info!(frame = name, "removed frame");
        }
        Ok(removed)
    }

    pub fn select(&mut self, name: &str) -> Result<&FrameAsset, RegistryError> {
        let asset = self
            .frames
            .get(name)
            .ok_or_else(|| RegistryError::UnknownFrame(name.to_string()))?;
        self.selected = Some(name.to_string());
        Ok(asset)
    }

    pub fn selected(&self) -> Result<&FrameAsset, RegistryError> {
        self.selected
            .as_ref()
            .and_then(|name| self.frames.get(name))
            .ok_or(RegistryError::Empty)
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&FrameAsset> {
        self.frames.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameAsset> {
        self.frames.values()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Load a registry file. A selection that names a missing frame is
    /// repaired to the first frame.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut registry: Self =
            serde_json::from_str(&content).map_err(|source| RegistryError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        registry.repair_selection();
        Ok(registry)
    }

    /// Load from `path` when it exists, otherwise fall back to `seed`.
    pub fn load_or_seed<I>(path: &Path, seed: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (String, ImageSource)>,
    {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::from_seed(seed))
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| RegistryError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    fn repair_selection(&mut self) {
        let valid = self
            .selected
            .as_ref()
            .is_some_and(|name| self.frames.contains_key(name));
        if !valid {
            self.selected = self.frames.keys().next().cloned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn src(s: &str) -> ImageSource {
        ImageSource::parse(s).unwrap()
    }

    fn abc() -> FrameRegistry {
        let mut reg = FrameRegistry::new();
        reg.add("A", src("https://example.com/a.png")).unwrap();
        reg.add("B", src("https://example.com/b.png")).unwrap();
        reg.add("C", src("https://example.com/c.png")).unwrap();
        reg
    }

    #[test]
    fn empty_registry_has_no_selection() {
        let reg = FrameRegistry::new();
        assert!(matches!(reg.selected(), Err(RegistryError::Empty)));
        assert!(reg.is_empty());
    }

    #[test]
    fn first_add_becomes_selection() {
        let mut reg = FrameRegistry::new();
        assert!(reg.add("gold", src("gold.png")).unwrap());
        assert_eq!(reg.selected().unwrap().name, "gold");

        reg.add("green", src("green.png")).unwrap();
        assert_eq!(reg.selected_name(), Some("gold"));
    }

    #[test]
    fn add_overwrites_existing_name() {
        let mut reg = FrameRegistry::new();
        reg.add("gold", src("v1.png")).unwrap();
        assert!(!reg.add("gold", src("v2.png")).unwrap());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("gold").unwrap().source, src("v2.png"));
    }

    #[test]
    fn add_rejects_blank_name() {
        let mut reg = FrameRegistry::new();
        assert!(matches!(reg.add("  ", src("x.png")), Err(RegistryError::EmptyName)));
    }

    #[test]
    fn select_known_frame() {
        let mut reg = abc();
        assert_eq!(reg.select("C").unwrap().name, "C");
        assert_eq!(reg.selected().unwrap().name, "C");
    }

    #[test]
    fn select_unknown_frame_errors_and_keeps_selection() {
        let mut reg = abc();
        reg.select("B").unwrap();
        assert!(matches!(reg.select("Z"), Err(RegistryError::UnknownFrame(_))));
        assert_eq!(reg.selected_name(), Some("B"));
    }

    #[test]
    fn removing_selected_repoints_to_remaining_frame() {
        let mut reg = abc();
        reg.select("B").unwrap();
        reg.remove("B").unwrap();

        let selected = reg.selected().unwrap().name.clone();
        assert!(selected == "A" || selected == "C");
        assert!(reg.get(&selected).is_some());
    }

    #[test]
    fn removing_unselected_keeps_selection() {
        let mut reg = abc();
        reg.select("C").unwrap();
        reg.remove("A").unwrap();
        assert_eq!(reg.selected_name(), Some("C"));
    }

    #[test]
    fn removing_last_frame_clears_selection() {
        let mut reg = FrameRegistry::new();
        reg.add("only", src("only.png")).unwrap();
        reg.remove("only").unwrap();
        assert!(matches!(reg.selected(), Err(RegistryError::Empty)));
    }

    #[test]
    fn remove_unknown_errors() {
        let mut reg = abc();
        assert!(matches!(reg.remove("nope"), Err(RegistryError::UnknownFrame(_))));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn names_are_sorted() {
        let mut reg = FrameRegistry::new();
        reg.add("zeta", src("z.png")).unwrap();
        reg.add("alpha", src("a.png")).unwrap();
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn seed_selects_first_name() {
        let reg = FrameRegistry::from_seed(vec![
            ("frame2".to_string(), src("two.png")),
            ("frame1".to_string(), src("one.png")),
        ]);
        assert_eq!(reg.selected_name(), Some("frame1"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join(REGISTRY_FILENAME);
        let mut reg = abc();
        reg.select("C").unwrap();
        reg.save(&path).unwrap();

        let loaded = FrameRegistry::load(&path).unwrap();
        assert_eq!(loaded, reg);
    }

    #[test]
    fn load_repairs_dangling_selection() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(REGISTRY_FILENAME);
        std::fs::write(
            &path,
            r#"{"frames": {"b": {"name": "b", "source": "b.png"}}, "selected": "gone"}"#,
        )
        .unwrap();

        let reg = FrameRegistry::load(&path).unwrap();
        assert_eq!(reg.selected_name(), Some("b"));
    }

    #[test]
    fn load_or_seed_uses_seed_without_file() {
        let tmp = TempDir::new().unwrap();
        let reg = FrameRegistry::load_or_seed(
            &tmp.path().join(REGISTRY_FILENAME),
            vec![("frame1".to_string(), src("one.png"))],
        )
        .unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn load_invalid_json_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(REGISTRY_FILENAME);
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FrameRegistry::load(&path),
            Err(RegistryError::Json { .. })
        ));
    }
}
