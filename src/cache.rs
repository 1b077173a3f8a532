//! On-disk cache for remote frame images.
//!
//! Frames are usually hosted remotely and the same handful are used for every
//! export. This module lets the loader skip the network when a frame URL has
//! been fetched before.
//!
//! # Design
//!
//! The cache is **content-addressed** in two ways:
//!
//! - **`key`**: SHA-256 of the source string (the URL). Blobs are stored
//!   under this name, so arbitrary URLs never leak into filenames.
//! - **`content_hash`**: SHA-256 of the bytes at the time they were cached.
//!   A lookup re-hashes the blob and treats a mismatch as a miss, so a
//!   truncated or edited blob is refetched rather than decoded.
//!
//! A hit requires:
//! 1. A manifest entry for the key
//! 2. The blob file still exists on disk
//! 3. Its bytes hash to the recorded `content_hash`
//!
//! ## Storage
//!
//! ```text
//! <state_dir>/frame-cache/
//! ├── manifest.json
//! └── <key>.bin
//! ```
//!
//! An unreadable manifest (missing, corrupt, older version) loads as empty.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the cache directory.
const MANIFEST_FILENAME: &str = "manifest.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached blob.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source: String,
    pub content_hash: String,
    pub len: u64,
}

/// On-disk manifest mapping source keys to their entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the cache directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    pub fn save(&self, dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILENAME), json)
    }
}

/// Frame cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct FrameCache {
    dir: PathBuf,
    manifest: CacheManifest,
}

impl FrameCache {
    /// Open (or lazily create) the cache at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let manifest = CacheManifest::load(&dir);
        Self { dir, manifest }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.manifest.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.entries.is_empty()
    }

    /// Cached bytes for `source`, if present and intact.
    pub fn get(&self, source: &str) -> Option<Vec<u8>> {
        let key = hash_source(source);
        let entry = self.manifest.entries.get(&key)?;
        let bytes = std::fs::read(self.blob_path(&key)).ok()?;
        if hash_bytes(&bytes) != entry.content_hash {
            return None;
        }
        Some(bytes)
    }

    /// Store `bytes` for `source`, replacing any previous entry.
    pub fn insert(&mut self, source: &str, bytes: &[u8]) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let key = hash_source(source);
        std::fs::write(self.blob_path(&key), bytes)?;
        self.manifest.entries.insert(
            key,
            CacheEntry {
                source: source.to_string(),
                content_hash: hash_bytes(bytes),
                len: bytes.len() as u64,
            },
        );
        self.manifest.save(&self.dir)
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }
}

/// SHA-256 of a source string, returned as a hex string.
pub fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"frame-source\0");
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of raw bytes, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/frames/anniversary.png";

    #[test]
    fn empty_cache_misses() {
        let tmp = TempDir::new().unwrap();
        let cache = FrameCache::open(tmp.path());
        assert!(cache.is_empty());
        assert_eq!(cache.get(URL), None);
    }

    #[test]
    fn insert_then_get() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FrameCache::open(tmp.path().join("frame-cache"));
        cache.insert(URL, b"frame bytes").unwrap();
        assert_eq!(cache.get(URL).as_deref(), Some(&b"frame bytes"[..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FrameCache::open(tmp.path());
        cache.insert(URL, b"persisted").unwrap();

        let reopened = FrameCache::open(tmp.path());
        assert_eq!(reopened.get(URL).as_deref(), Some(&b"persisted"[..]));
    }

    #[test]
    fn insert_overwrites_previous_bytes() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FrameCache::open(tmp.path());
        cache.insert(URL, b"v1").unwrap();
        cache.insert(URL, b"v2").unwrap();
        assert_eq!(cache.get(URL).as_deref(), Some(&b"v2"[..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tampered_blob_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FrameCache::open(tmp.path());
        cache.insert(URL, b"original").unwrap();

        let blob = tmp.path().join(format!("{}.bin", hash_source(URL)));
        std::fs::write(&blob, b"truncat").unwrap();
        assert_eq!(cache.get(URL), None);
    }

    #[test]
    fn deleted_blob_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FrameCache::open(tmp.path());
        cache.insert(URL, b"gone soon").unwrap();

        std::fs::remove_file(tmp.path().join(format!("{}.bin", hash_source(URL)))).unwrap();
        assert_eq!(cache.get(URL), None);
    }

    #[test]
    fn corrupt_manifest_loads_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILENAME), "{ not json").unwrap();
        assert!(FrameCache::open(tmp.path()).is_empty());
    }

    #[test]
    fn version_mismatch_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let stale = r#"{"version": 999, "entries": {}}"#;
        std::fs::write(tmp.path().join(MANIFEST_FILENAME), stale).unwrap();
        assert_eq!(CacheManifest::load(tmp.path()).version, MANIFEST_VERSION);
    }

    #[test]
    fn hash_source_is_stable_and_distinct() {
        assert_eq!(hash_source(URL), hash_source(URL));
        assert_ne!(hash_source(URL), hash_source("https://example.com/other.png"));
        assert_eq!(hash_source(URL).len(), 64);
    }
}
