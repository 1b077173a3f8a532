//! Interactive compose session.
//!
//! A [`Session`] is the one place that owns the state of a compose: the
//! loaded photo, the live and committed crop, the display zoom, the frame
//! registry and the export gate. The UI layer (here, the CLI) drives it
//! through explicit method calls:
//!
//! ```text
//! load_photo ──► initial crop ──► update_crop / zoom ──► commit_crop
//!                                                           │
//!                                     begin_export ◄────────┘
//!                                          │
//!                              ExportJob::run (frame load, composite, PNG)
//! ```
//!
//! Every geometry operation returns `None` while no photo is loaded.
//!
//! [`Session::begin_export`] snapshots what the export needs, so the session
//! stays free to change (even load a different photo) while the job runs.
//! Only one job may be alive at a time.

use crate::config::AppConfig;
use crate::export::{DEFAULT_FILENAME, ExportError, export_and_download};
use crate::imaging::{
    CompositeBackend, CompositePlan, CropInteraction, CropRect, DEFAULT_COVERAGE, DecodedImage,
    Dimensions, DisplaySize, OUTPUT_SIZE, PixelRegion, ResampleFilter, Zoom, apply_interaction,
    clamp_crop, displayed_size, initial_crop, operations, plan_composite,
};
use crate::registry::{FrameAsset, FrameRegistry};
use crate::source::{ImageSource, LoadError, Loader};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};

/// Why an export cannot start right now.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportBlocked {
    #[error("No photo loaded")]
    NoPhoto,
    #[error("Crop has not been committed")]
    NoCommittedCrop,
    #[error("No frame available")]
    NoFrame,
    #[error("An export is already in progress")]
    Busy,
}

/// Layout and output settings a session runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Viewport width photos are fitted to before zoom; 0 disables fitting.
    pub max_width: u32,
    /// Share of the shorter displayed edge covered by a fresh crop.
    pub coverage: f64,
    pub zoom_step: f64,
    pub filter: ResampleFilter,
    pub output_dir: PathBuf,
    pub filename: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_width: 640,
            coverage: DEFAULT_COVERAGE,
            zoom_step: Zoom::STEP,
            filter: ResampleFilter::default(),
            output_dir: PathBuf::from("."),
            filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_width: config.display.max_width,
            coverage: f64::from(config.crop.coverage_percent) / 100.0,
            zoom_step: config.zoom.step,
            filter: config.output.filter,
            output_dir: config.output.directory.clone(),
            filename: config.output.filename.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct LoadedPhoto {
    image: DecodedImage,
    source: ImageSource,
    crop: CropRect,
    committed: Option<CropRect>,
}

/// Shared flag that admits one export at a time.
#[derive(Debug, Clone, Default)]
struct ExportGate(Arc<AtomicBool>);

impl ExportGate {
    fn try_acquire(&self) -> Option<ExportPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExportPermit(Arc::clone(&self.0)))
    }

    fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Held by a running export; releases the gate on drop.
#[derive(Debug)]
struct ExportPermit(Arc<AtomicBool>);

impl Drop for ExportPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session<B: CompositeBackend + 'static> {
    backend: Arc<B>,
    loader: Loader,
    registry: FrameRegistry,
    settings: SessionSettings,
    photo: Option<LoadedPhoto>,
    zoom: Zoom,
    gate: ExportGate,
}

impl<B: CompositeBackend + 'static> Session<B> {
    pub fn new(backend: Arc<B>, loader: Loader, registry: FrameRegistry, settings: SessionSettings) -> Self {
        Self {
            backend,
            loader,
            registry,
            settings,
            photo: None,
            zoom: Zoom::default(),
            gate: ExportGate::default(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &FrameRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FrameRegistry {
        &mut self.registry
    }

    pub fn into_registry(self) -> FrameRegistry {
        self.registry
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn has_photo(&self) -> bool {
        self.photo.is_some()
    }

    pub fn photo_source(&self) -> Option<&ImageSource> {
        self.photo.as_ref().map(|p| &p.source)
    }

    pub fn natural_size(&self) -> Option<Dimensions> {
        self.photo.as_ref().map(|p| p.image.dimensions())
    }

    pub fn displayed_size(&self) -> Option<DisplaySize> {
        self.natural_size()
            .map(|natural| displayed_size(natural, self.settings.max_width, self.zoom))
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.photo.as_ref().map(|p| p.crop)
    }

    pub fn committed_crop(&self) -> Option<CropRect> {
        self.photo.as_ref().and_then(|p| p.committed)
    }

    /// Load a photo and establish its initial centered crop.
    ///
    /// On failure the session is left exactly as it was.
    pub async fn load_photo(&mut self, source: ImageSource) -> Result<CropRect, LoadError> {
        let image = self.loader.load(&source, &self.backend).await?;
        let natural = image.dimensions();
        let displayed = displayed_size(natural, self.settings.max_width, self.zoom);
        let crop = initial_crop(displayed, self.settings.coverage);
        info!(
            source = %source.describe(),
            width = natural.width,
            height = natural.height,
            "loaded photo"
        );
        debug!(x = crop.x(), y = crop.y(), side = crop.side(), "initial crop");
        self.photo = Some(LoadedPhoto {
            image,
            source,
            crop,
            committed: None,
        });
        Ok(crop)
    }

    pub fn clear_photo(&mut self) {
        if self.photo.take().is_some() {
            info!("cleared photo");
        }
    }

    /// Apply one crop interaction to the live crop.
    pub fn update_crop(&mut self, interaction: CropInteraction) -> Option<CropRect> {
        let bounds = self.displayed_size()?;
        let photo = self.photo.as_mut()?;
        photo.crop = apply_interaction(photo.crop, interaction, bounds);
        debug!(
            x = photo.crop.x(),
            y = photo.crop.y(),
            side = photo.crop.side(),
            "crop updated"
        );
        Some(photo.crop)
    }

    /// Snapshot the live crop as the one export will use.
    pub fn commit_crop(&mut self) -> Option<CropRect> {
        let photo = self.photo.as_mut()?;
        photo.committed = Some(photo.crop);
        Some(photo.crop)
    }

    /// Change the zoom, keeping both crops on the same photo content.
    pub fn set_zoom(&mut self, zoom: Zoom) -> Zoom {
        let previous = self.zoom;
        self.zoom = zoom;
        if let Some(bounds) = self.displayed_size()
            && let Some(photo) = self.photo.as_mut()
        {
            let ratio = zoom.value() / previous.value();
            photo.crop = clamp_crop(photo.crop.scaled(ratio), bounds);
            photo.committed = photo
                .committed
                .map(|c| clamp_crop(c.scaled(ratio), bounds));
        }
        debug!(from = previous.value(), to = zoom.value(), "zoom changed");
        zoom
    }

    pub fn zoom_in(&mut self) -> Zoom {
        self.set_zoom(self.zoom.zoomed_in(self.settings.zoom_step))
    }

    pub fn zoom_out(&mut self) -> Zoom {
        self.set_zoom(self.zoom.zoomed_out(self.settings.zoom_step))
    }

    /// Whether an export could start now, and if not, why.
    pub fn export_readiness(&self) -> Result<(), ExportBlocked> {
        self.ready_parts().map(|_| ())
    }

    fn ready_parts(&self) -> Result<(&LoadedPhoto, CropRect, &FrameAsset), ExportBlocked> {
        let photo = self.photo.as_ref().ok_or(ExportBlocked::NoPhoto)?;
        let committed = photo.committed.ok_or(ExportBlocked::NoCommittedCrop)?;
        let frame = self
            .registry
            .selected()
            .map_err(|_| ExportBlocked::NoFrame)?;
        if self.gate.is_busy() {
            return Err(ExportBlocked::Busy);
        }
        Ok((photo, committed, frame))
    }

    /// Start an export of the committed crop with the selected frame.
    pub fn begin_export(&self) -> Result<ExportJob<B>, ExportBlocked> {
        let (photo, committed, frame) = self.ready_parts()?;
        let permit = self.gate.try_acquire().ok_or(ExportBlocked::Busy)?;

        let natural = photo.image.dimensions();
        let displayed = displayed_size(natural, self.settings.max_width, self.zoom);
        let plan = plan_composite(
            natural,
            displayed,
            &committed,
            OUTPUT_SIZE,
            self.settings.filter,
        );
        Ok(ExportJob {
            backend: Arc::clone(&self.backend),
            loader: self.loader.clone(),
            photo: photo.image.clone(),
            frame: frame.clone(),
            plan,
            output_dir: self.settings.output_dir.clone(),
            filename: self.settings.filename.clone(),
            _permit: permit,
        })
    }
}

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub frame: String,
    pub region: PixelRegion,
    pub size: u32,
}

/// A started export. Owns a snapshot of its inputs.
#[derive(Debug)]
pub struct ExportJob<B: CompositeBackend + 'static> {
    backend: Arc<B>,
    loader: Loader,
    photo: DecodedImage,
    frame: FrameAsset,
    plan: CompositePlan,
    output_dir: PathBuf,
    filename: String,
    _permit: ExportPermit,
}

impl<B: CompositeBackend + 'static> ExportJob<B> {
    pub fn plan(&self) -> &CompositePlan {
        &self.plan
    }

    pub fn frame_name(&self) -> &str {
        &self.frame.name
    }

    /// Load the frame, composite and write the PNG.
    pub async fn run(self) -> Result<ExportOutcome, ExportError> {
        let frame_image = self.loader.load_frame(&self.frame.source, &self.backend).await?;

        let backend = Arc::clone(&self.backend);
        let photo = self.photo.clone();
        let plan = self.plan;
        let raster = tokio::task::spawn_blocking(move || {
            operations::composite(backend.as_ref(), &photo, &frame_image, &plan)
        })
        .await
        .map_err(|e| ExportError::Task(e.to_string()))??;

        let path =
            export_and_download(&self.backend, raster, &self.output_dir, &self.filename).await?;
        Ok(ExportOutcome {
            path,
            frame: self.frame.name.clone(),
            region: self.plan.region,
            size: self.plan.size,
        })
    }
}
