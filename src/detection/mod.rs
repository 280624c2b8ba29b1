pub mod preprocessing;
pub mod contours;
pub mod validation;
pub mod extract;
pub mod steps;
#[cfg(feature = "ocr")]
pub mod ocr;

use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ScannerConfig;
use crate::detection::steps::*;
use crate::error::{Result, ScanError};
use crate::geometry;
use crate::models::{BoundingBox, Extent, Frame, RegionKind, ScreenRect};
use crate::pipeline::{Pipeline, PipelineContext, ScanData};

/// Where the frame came from and how the user framed the document
#[derive(Debug, Clone)]
pub struct CaptureContext {
    /// Framing guide in screen pixels (landscape)
    pub guide: ScreenRect,
    /// Screen extent; normalized to landscape before use
    pub screen: Extent,
    pub device_model: String,
    pub sensor_orientation: u16,
}

impl CaptureContext {
    pub fn new(guide: ScreenRect, screen: Extent) -> Self {
        Self {
            guide,
            screen,
            device_model: String::new(),
            sensor_orientation: 0,
        }
    }

    pub fn with_device(mut self, model: impl Into<String>, sensor_orientation: u16) -> Self {
        self.device_model = model.into();
        self.sensor_orientation = sensor_orientation;
        self
    }
}

/// A validated region cropped from the original image
#[derive(Debug, Clone)]
pub struct DetectedRegion {
    pub kind: RegionKind,
    /// Candidate box, relative to the guide region
    pub bbox: BoundingBox,
    /// Top-left of the guide region inside the decoded frame
    pub region_origin: (u32, u32),
    /// Outline coverage for text lines, box area for barcodes
    pub density: f64,
    /// Padded crop of the original pixels
    pub image: DynamicImage,
}

impl DetectedRegion {
    /// Candidate box in decoded-frame pixels
    pub fn frame_bbox(&self) -> BoundingBox {
        BoundingBox {
            x: self.bbox.x + self.region_origin.0,
            y: self.bbox.y + self.region_origin.1,
            ..self.bbox
        }
    }
}

/// Why nothing was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// The pipeline ran but no region passed validation
    NoCandidates,
    /// Text lines were found, but not enough to read a document
    TooFewLines { found: usize, required: usize },
    /// The frame could not be decoded
    DecodeFailed,
    /// The guide did not map onto the frame
    GeometryFailed,
    /// The background worker stopped before finishing
    Interrupted,
}

/// Result of one scan. Failures are folded into `NotFound` so a bad frame
/// never surfaces as an error.
#[derive(Debug, Clone)]
pub enum ScanOutcome<T> {
    Found(T),
    NotFound(NotFoundReason),
}

impl<T> ScanOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, ScanOutcome::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            ScanOutcome::Found(value) => Some(value),
            ScanOutcome::NotFound(_) => None,
        }
    }

    pub fn reason(&self) -> Option<NotFoundReason> {
        match self {
            ScanOutcome::Found(_) => None,
            ScanOutcome::NotFound(reason) => Some(*reason),
        }
    }

    fn from_error(err: ScanError) -> Self {
        let reason = match &err {
            ScanError::Geometry(_) | ScanError::ExtentMismatch { .. } => NotFoundReason::GeometryFailed,
            _ => NotFoundReason::DecodeFailed,
        };
        warn!("scan aborted: {}", err);
        ScanOutcome::NotFound(reason)
    }
}

/// Build the barcode pipeline from configuration
pub fn build_barcode_pipeline(config: &ScannerConfig) -> Pipeline {
    Pipeline::new()
        .add_step(Arc::new(BinarizeStep {
            params: config.binarization.shape,
        }))
        .add_step(Arc::new(MorphologyStep {
            open_kernel: config.morphology.open_kernel,
            close_kernel: config.morphology.close_kernel,
        }))
        .add_step(Arc::new(CandidateStep {
            target: RegionKind::Barcode,
            params: config.classification,
        }))
        .add_step(Arc::new(LargestBarcodeStep))
        .add_step(Arc::new(CropStep {
            buffer: config.extraction.crop_buffer,
        }))
}

/// Build the text-line pipeline from configuration
pub fn build_text_pipeline(config: &ScannerConfig) -> Pipeline {
    Pipeline::new()
        .add_step(Arc::new(ReaderBinarizeStep {
            params: config.binarization.reader,
        }))
        .add_step(Arc::new(BinarizeStep {
            params: config.binarization.shape,
        }))
        .add_step(Arc::new(MorphologyStep {
            open_kernel: config.morphology.open_kernel,
            close_kernel: config.morphology.close_kernel,
        }))
        .add_step(Arc::new(CandidateStep {
            target: RegionKind::TextLine,
            params: config.classification,
        }))
        .add_step(Arc::new(TextLineValidationStep {
            params: config.validation,
        }))
        .add_step(Arc::new(BoxedOverviewStep))
        .add_step(Arc::new(CropStep {
            buffer: config.extraction.crop_buffer,
        }))
}

/// Turn the items left at the end of a pipeline into regions
fn collect(data: Vec<ScanData>, origin: (u32, u32)) -> Vec<DetectedRegion> {
    data.into_iter()
        .filter_map(|item| {
            let candidate = item.candidate?;
            Some(DetectedRegion {
                kind: candidate.kind,
                bbox: candidate.bbox,
                region_origin: origin,
                density: candidate.density.unwrap_or_default(),
                image: item.image,
            })
        })
        .collect()
}

/// Finds barcode and text-line regions inside the framing guide of a frame
pub struct DocumentScanner {
    config: ScannerConfig,
    context: PipelineContext,
}

impl DocumentScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            context: PipelineContext::default(),
        }
    }

    /// Write intermediate images under `dir` (must be empty or absent)
    pub fn with_debug(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        self.context = Pipeline::new().with_debug(dir)?.context().clone();
        Ok(self)
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    fn pipeline_for(&self, target: RegionKind) -> Pipeline {
        let pipeline = match target {
            RegionKind::Barcode => build_barcode_pipeline(&self.config),
            RegionKind::TextLine => build_text_pipeline(&self.config),
        };
        pipeline.with_context(self.context.clone())
    }

    /// Decode the frame, apply any device correction and cut out the guide region
    pub fn guide_region(&self, frame: &Frame, capture: &CaptureContext) -> Result<(BoundingBox, DynamicImage)> {
        let mut img = frame.decode()?;

        if let Some(correction) = self
            .config
            .quirks
            .correction_for(&capture.device_model, capture.sensor_orientation)
        {
            debug!("applying {:?} for {}", correction, capture.device_model);
            img = correction.apply(&img);
        }

        let source = Extent::of(&img);
        if source.is_portrait() {
            return Err(ScanError::ExtentMismatch {
                expected: source.to_landscape().to_string(),
                actual: source.to_string(),
            });
        }

        let screen = capture.screen.to_landscape();
        let mapped = geometry::map_rect(&capture.guide, screen, source, self.config.mapping);
        debug!("guide {:?} on {} maps to {:?} on {}", capture.guide, screen, mapped, source);

        extract::crop_mapped(&img, &mapped)
    }

    /// Run the `target` pipeline on an already cropped guide region
    pub fn detect_in_region(&self, region: DynamicImage, target: RegionKind) -> Result<Vec<DetectedRegion>> {
        Ok(collect(self.pipeline_for(target).run(region)?, (0, 0)))
    }

    fn detect(&self, frame: &Frame, capture: &CaptureContext, target: RegionKind) -> Result<Vec<DetectedRegion>> {
        let (region_box, region) = self.guide_region(frame, capture)?;
        let data = self.pipeline_for(target).run(region)?;
        Ok(collect(data, (region_box.x, region_box.y)))
    }

    /// Largest barcode-shaped region, padded
    pub fn scan_barcode(&self, frame: &Frame, capture: &CaptureContext) -> ScanOutcome<DetectedRegion> {
        match self.detect(frame, capture, RegionKind::Barcode) {
            Ok(regions) => match regions.into_iter().next() {
                Some(region) => ScanOutcome::Found(region),
                None => ScanOutcome::NotFound(NotFoundReason::NoCandidates),
            },
            Err(e) => ScanOutcome::from_error(e),
        }
    }

    /// Every validated text line, in extraction order, if there are enough of them
    pub fn scan_text_lines(&self, frame: &Frame, capture: &CaptureContext) -> ScanOutcome<Vec<DetectedRegion>> {
        let required = self.config.extraction.min_text_lines;
        match self.detect(frame, capture, RegionKind::TextLine) {
            Ok(lines) if lines.is_empty() => ScanOutcome::NotFound(NotFoundReason::NoCandidates),
            Ok(lines) if lines.len() < required => {
                debug!("only {} of {} required text lines", lines.len(), required);
                ScanOutcome::NotFound(NotFoundReason::TooFewLines {
                    found: lines.len(),
                    required,
                })
            }
            Ok(lines) => ScanOutcome::Found(lines),
            Err(e) => ScanOutcome::from_error(e),
        }
    }
}

async fn in_background<T, F>(work: F) -> ScanOutcome<T>
where
    T: Send + 'static,
    F: FnOnce() -> ScanOutcome<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            warn!("scan worker stopped: {}", e);
            ScanOutcome::NotFound(NotFoundReason::Interrupted)
        }
    }
}

/// `scan_barcode` on a blocking worker thread
pub async fn scan_barcode_in_background(
    scanner: Arc<DocumentScanner>,
    frame: Frame,
    capture: CaptureContext,
) -> ScanOutcome<DetectedRegion> {
    in_background(move || scanner.scan_barcode(&frame, &capture)).await
}

/// `scan_text_lines` on a blocking worker thread
pub async fn scan_text_lines_in_background(
    scanner: Arc<DocumentScanner>,
    frame: Frame,
    capture: CaptureContext,
) -> ScanOutcome<Vec<DetectedRegion>> {
    in_background(move || scanner.scan_text_lines(&frame, &capture)).await
}
