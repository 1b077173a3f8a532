//! Image sources and awaitable loading.
//!
//! A photo or frame can come from three places, all written as plain
//! strings in config files and on the command line:
//!
//! | Form | Example | Fetched with |
//! |---|---|---|
//! | Remote | `https://cdn.example.com/frame.png` | `reqwest` GET, no credentials |
//! | Data | `data:image/png;base64,iVBOR…` | `base64` decode |
//! | Path | `frames/gold.png` | `tokio::fs::read` |
//!
//! [`Loader::load`] fetches the bytes and then decodes them on the blocking
//! pool, returning only once the image is fully decoded. Callers can simply
//! `.await` a frame before drawing it. [`Loader::load_frame`] does the same
//! for frames, serving remote ones from the on-disk frame cache.

use crate::cache::FrameCache;
use crate::imaging::{BackendError, CompositeBackend, DecodedImage};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid data payload: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Decode(#[from] BackendError),
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Where an image's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageSource {
    Remote(String),
    Data { mime: String, payload: String },
    Path(PathBuf),
}

impl ImageSource {
    /// Classify a source string. Never fails for non-empty input: anything
    /// that is not a URL or `data:` payload is treated as a local path.
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LoadError::InvalidData("empty image source".into()));
        }
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Remote(raw.to_string()));
        }
        if lower.starts_with("data:") {
            let (header, payload) = raw[5..]
                .split_once(',')
                .ok_or_else(|| LoadError::InvalidData("data payload has no comma".into()))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| LoadError::InvalidData("only base64 data payloads are supported".into()))?;
            return Ok(Self::Data {
                mime: mime.to_string(),
                payload: payload.to_string(),
            });
        }
        Ok(Self::Path(PathBuf::from(raw)))
    }

    /// Read a local file into a `data:` payload, the way an admin upload is stored.
    pub fn data_url_from_file(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mime = mime_for_path(path).unwrap_or("application/octet-stream");
        Ok(Self::Data {
            mime: mime.to_string(),
            payload: BASE64_STANDARD.encode(bytes),
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Short human-readable description (data payloads are not printed in full).
    pub fn describe(&self) -> String {
        match self {
            Self::Remote(url) => url.clone(),
            Self::Data { mime, payload } => {
                format!("{mime} data ({} bytes)", payload.len() / 4 * 3)
            }
            Self::Path(p) => p.display().to_string(),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Data { mime, payload } => write!(f, "data:{mime};base64,{payload}"),
            Self::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

impl TryFrom<String> for ImageSource {
    type Error = LoadError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ImageSource> for String {
    fn from(source: ImageSource) -> Self {
        source.to_string()
    }
}

/// MIME type for the upload formats the backend decodes.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

type SharedCache = Arc<Mutex<FrameCache>>;

/// Fetches and decodes image sources.
///
/// Cheap to clone; clones share the HTTP client and the frame cache.
#[derive(Clone, Debug)]
pub struct Loader {
    client: reqwest::Client,
    cache: Option<SharedCache>,
}

impl Loader {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| LoadError::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self {
            client,
            cache: None,
        })
    }

    /// Route remote frame fetches through `cache`.
    pub fn with_cache(mut self, cache: FrameCache) -> Self {
        self.cache = Some(Arc::new(Mutex::new(cache)));
        self
    }

    /// Fetch the encoded bytes behind `source`. Never consults the cache.
    pub async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>, LoadError> {
        match source {
            ImageSource::Remote(url) => self.fetch_remote(url).await,
            ImageSource::Data { payload, .. } => BASE64_STANDARD
                .decode(payload.trim())
                .map_err(|e| LoadError::InvalidData(format!("bad base64: {e}"))),
            ImageSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| LoadError::Io {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }

    /// Fetch a frame's bytes. Remote frames go through the frame cache.
    pub async fn fetch_frame(&self, source: &ImageSource) -> Result<Vec<u8>, LoadError> {
        let (ImageSource::Remote(url), Some(cache)) = (source, &self.cache) else {
            return self.fetch(source).await;
        };

        if let Some(bytes) = cache_lookup(cache, url).await {
            debug!(url, "frame cache hit");
            return Ok(bytes);
        }
        let bytes = self.fetch_remote(url).await?;
        if let Err(e) = cache_store(cache, url, bytes.clone()).await {
            warn!(url, error = %e, "could not write frame cache");
        }
        Ok(bytes)
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        info!(url, "fetching remote image");
        let http_err = |source| LoadError::Http {
            url: url.to_string(),
            source,
        };
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?
            .bytes()
            .await
            .map_err(http_err)?
            .to_vec();
        Ok(bytes)
    }

    /// Fetch and fully decode `source`.
    ///
    /// Decoding runs on the blocking pool; the future resolves only once
    /// the pixels are complete, so a caller never sees a partial image.
    pub async fn load<B>(&self, source: &ImageSource, backend: &Arc<B>) -> Result<DecodedImage, LoadError>
    where
        B: CompositeBackend + 'static,
    {
        let bytes = self.fetch(source).await?;
        decode(source, bytes, backend).await
    }

    /// Like [`load`](Self::load), with remote frames served from the cache.
    pub async fn load_frame<B>(&self, source: &ImageSource, backend: &Arc<B>) -> Result<DecodedImage, LoadError>
    where
        B: CompositeBackend + 'static,
    {
        let bytes = self.fetch_frame(source).await?;
        decode(source, bytes, backend).await
    }
}

async fn decode<B>(source: &ImageSource, bytes: Vec<u8>, backend: &Arc<B>) -> Result<DecodedImage, LoadError>
where
    B: CompositeBackend + 'static,
{
    let backend = Arc::clone(backend);
    let decoded = tokio::task::spawn_blocking(move || backend.decode(&bytes))
        .await
        .map_err(|e| LoadError::Task(e.to_string()))??;
    let dims = decoded.dimensions();
    debug!(source = %source.describe(), width = dims.width, height = dims.height, "decoded image");
    Ok(decoded)
}

// Cache access runs on the blocking pool.

async fn cache_lookup(cache: &SharedCache, url: &str) -> Option<Vec<u8>> {
    let cache = Arc::clone(cache);
    let url = url.to_string();
    tokio::task::spawn_blocking(move || cache.lock().ok()?.get(&url))
        .await
        .ok()
        .flatten()
}

async fn cache_store(cache: &SharedCache, url: &str, bytes: Vec<u8>) -> Result<(), String> {
    let cache = Arc::clone(cache);
    let url = url.to_string();
    tokio::task::spawn_blocking(move || match cache.lock() {
        Ok(mut guard) => guard.insert(&url, &bytes).map_err(|e| e.to_string()),
        Err(_) => Err("frame cache lock poisoned".to_string()),
    })
    .await
    .map_err(|e| e.to_string())?
}
