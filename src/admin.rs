//! Admin surface: event records and frame upload restrictions.
//!
//! Event records are small `{id, name, slug, created_at}` entries managed by
//! admins. [`EventStore`] is the persistence seam; [`JsonEventStore`] keeps
//! them in `events.json` under the state directory.
//!
//! Frame uploads are checked against [`AssetRestrictions`] before they are
//! turned into `data:` payloads and added to the registry.

use crate::imaging::{CompositeBackend, Dimensions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// File name of the persisted event store inside the state directory.
pub const EVENTS_FILENAME: &str = "events.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid event: {0}")]
    Invalid(String),
    #[error("An event with slug '{0}' already exists")]
    DuplicateSlug(String),
    #[error("No event with id {0}")]
    NotFound(Uuid),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid store file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub name: String,
    pub slug: String,
}

/// Persistent store of event records.
pub trait EventStore {
    /// All events, newest first.
    fn list(&self) -> Result<Vec<EventRecord>, StoreError>;
    fn create(&mut self, event: NewEvent) -> Result<EventRecord, StoreError>;
    fn delete(&mut self, id: Uuid) -> Result<EventRecord, StoreError>;
}

/// Slugs are non-empty and use only lowercase ASCII letters, digits and `-`.
pub fn validate_slug(slug: &str) -> Result<(), StoreError> {
    if slug.is_empty() {
        return Err(StoreError::Invalid("slug must not be empty".into()));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(StoreError::Invalid(format!(
            "slug may only contain a-z, 0-9 and '-' (found '{bad}')"
        )));
    }
    Ok(())
}

pub fn validate_event_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Invalid("event name must not be empty".into()));
    }
    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventsFile {
    events: Vec<EventRecord>,
}

/// JSON-file backed [`EventStore`].
///
/// The file is read on open and rewritten after every change.
#[derive(Debug)]
pub struct JsonEventStore {
    path: PathBuf,
    events: Vec<EventRecord>,
}

impl JsonEventStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let events = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let file: EventsFile =
                serde_json::from_str(&content).map_err(|source| StoreError::Json {
                    path: path.clone(),
                    source,
                })?;
            file.events
        } else {
            Vec::new()
        };
        Ok(Self { path, events })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = EventsFile {
            events: self.events.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

impl EventStore for JsonEventStore {
    fn list(&self) -> Result<Vec<EventRecord>, StoreError> {
        let mut events = self.events.clone();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    fn create(&mut self, event: NewEvent) -> Result<EventRecord, StoreError> {
        let name = event.name.trim().to_string();
        validate_event_name(&name)?;
        validate_slug(&event.slug)?;
        if self.events.iter().any(|e| e.slug == event.slug) {
            return Err(StoreError::DuplicateSlug(event.slug));
        }
        let record = EventRecord {
            id: Uuid::new_v4(),
            name,
            slug: event.slug,
            created_at: Utc::now(),
        };
        self.events.push(record.clone());
        self.save()?;
        info!(id = %record.id, slug = %record.slug, "created event");
        Ok(record)
    }

    fn delete(&mut self, id: Uuid) -> Result<EventRecord, StoreError> {
        let index = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let removed = self.events.remove(index);
        self.save()?;
        info!(id = %removed.id, slug = %removed.slug, "deleted event");
        Ok(removed)
    }
}

// =============================================================================
// Upload restrictions
// =============================================================================

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssetRejected {
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("extension '{0}' is not allowed")]
    Extension(String),
    #[error("image is {width}x{height}, each side must be within {min}-{max} px")]
    Dimensions {
        width: u32,
        height: u32,
        min: u32,
        max: u32,
    },
    #[error("could not read upload: {0}")]
    Unreadable(String),
}

/// Limits applied to uploaded frame images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRestrictions {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub min_dimension: u32,
    pub max_dimension: u32,
}

impl Default for AssetRestrictions {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: crate::imaging::rust_backend::supported_input_extensions()
                .iter()
                .map(|e| e.to_string())
                .collect(),
            min_dimension: 100,
            max_dimension: 5000,
        }
    }
}

impl AssetRestrictions {
    pub fn check(&self, file_size: u64, extension: &str, dims: Dimensions) -> Result<(), AssetRejected> {
        self.check_file_kind(file_size, extension)?;
        self.check_dimensions(dims)
    }

    fn check_file_kind(&self, file_size: u64, extension: &str) -> Result<(), AssetRejected> {
        if file_size > self.max_file_size {
            return Err(AssetRejected::TooLarge {
                size: file_size,
                limit: self.max_file_size,
            });
        }
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if !self.allowed_extensions.iter().any(|a| *a == ext) {
            return Err(AssetRejected::Extension(ext));
        }
        Ok(())
    }

    fn check_dimensions(&self, dims: Dimensions) -> Result<(), AssetRejected> {
        let in_range = |v: u32| (self.min_dimension..=self.max_dimension).contains(&v);
        if !in_range(dims.width) || !in_range(dims.height) {
            return Err(AssetRejected::Dimensions {
                width: dims.width,
                height: dims.height,
                min: self.min_dimension,
                max: self.max_dimension,
            });
        }
        Ok(())
    }

    /// Check a file on disk, decoding it to learn its dimensions.
    pub fn check_file(&self, path: &Path, backend: &impl CompositeBackend) -> Result<(), AssetRejected> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let bytes = std::fs::read(path).map_err(|e| AssetRejected::Unreadable(e.to_string()))?;
        self.check_file_kind(bytes.len() as u64, ext)?;
        let dims = backend
            .decode(&bytes)
            .map_err(|e| AssetRejected::Unreadable(e.to_string()))?
            .dimensions();
        self.check_dimensions(dims)
    }
}
