pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod models;
pub mod pipeline;

pub use config::{load_config, save_config, ScannerConfig};
pub use detection::{
    build_barcode_pipeline, build_text_pipeline, scan_barcode_in_background,
    scan_text_lines_in_background, CaptureContext, DetectedRegion, DocumentScanner,
    NotFoundReason, ScanOutcome,
};
pub use error::ScanError;
pub use models::{BoundingBox, Candidate, Extent, Frame, MappedRect, RegionKind, ScreenRect, SupportedSize};
pub use pipeline::{Pipeline, PipelineContext, PipelineStep, ScanData};
