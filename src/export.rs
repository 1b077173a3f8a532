//! Export adapter: lossless PNG encode and write to the download directory.
//!
//! The file is written to a hidden sibling first and renamed into place, so
//! a reader never sees a half-written PNG under the final name.

use crate::imaging::{BackendError, CompositeBackend, Raster};
use crate::source::LoadError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Filename used for every export unless configured otherwise.
pub const DEFAULT_FILENAME: &str = "st-patricks-175th.png";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not load frame: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Encode `raster` as PNG and save it as `dir/filename`.
pub async fn export_and_download<B>(
    backend: &Arc<B>,
    raster: Raster,
    dir: &Path,
    filename: &str,
) -> Result<PathBuf, ExportError>
where
    B: CompositeBackend + 'static,
{
    let encoder = Arc::clone(backend);
    let png = tokio::task::spawn_blocking(move || encoder.encode_png(&raster))
        .await
        .map_err(|e| ExportError::Task(e.to_string()))??;

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ExportError::Io { path, source }
    };

    tokio::fs::create_dir_all(dir).await.map_err(io_err(dir))?;
    let target = dir.join(filename);
    let partial = dir.join(format!(".{filename}.partial"));
    let written = match tokio::fs::write(&partial, &png).await {
        Ok(()) => tokio::fs::rename(&partial, &target)
            .await
            .map_err(io_err(&target)),
        Err(e) => Err(io_err(&partial)(e)),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }

    info!(path = %target.display(), bytes = png.len(), "exported image");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::solid;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_png_under_fixed_name() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(RustBackend::new());
        let raster = Raster::new(solid(16, 16, [0, 128, 0, 255]));

        let path = export_and_download(&backend, raster, tmp.path(), DEFAULT_FILENAME)
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("st-patricks-175th.png"));
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(8, 8).0, [0, 128, 0, 255]);
    }

    #[tokio::test]
    async fn leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::new());
        let raster = Raster::new(solid(4, 4, [0, 0, 0, 255]));

        export_and_download(&backend, raster, tmp.path(), "out.png")
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["out.png"]);
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::EncodePng {
                width: 4,
                height: 4
            }]
        );
    }

    #[tokio::test]
    async fn creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("downloads").join("nested");
        let backend = Arc::new(MockBackend::new());

        let path = export_and_download(&backend, Raster::new(solid(2, 2, [0; 4])), &dir, "x.png")
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_partial_file() {
        let tmp = TempDir::new().unwrap();
        // A non-empty directory squatting on the target name blocks the rename.
        let blocker = tmp.path().join("o.png");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();
        let backend = Arc::new(MockBackend::new());

        let result =
            export_and_download(&backend, Raster::new(solid(2, 2, [0; 4])), tmp.path(), "o.png")
                .await;

        assert!(matches!(result, Err(ExportError::Io { .. })));
        assert!(!tmp.path().join(".o.png.partial").exists());
    }

    #[tokio::test]
    async fn overwrites_previous_export() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(RustBackend::new());
        for color in [[255, 0, 0, 255], [0, 0, 255, 255]] {
            export_and_download(&backend, Raster::new(solid(4, 4, color)), tmp.path(), "o.png")
                .await
                .unwrap();
        }
        let img = image::open(tmp.path().join("o.png")).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }
}
