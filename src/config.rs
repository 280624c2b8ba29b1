//! Scanner configuration
//!
//! Every threshold the detector and the capture selector use, stored in TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::camera::PixelBounds;
use crate::camera::quirks::DeviceQuirks;
use crate::detection::contours::ClassifierParams;
use crate::detection::preprocessing::{KernelSize, ThresholdParams};
use crate::detection::validation::ValidationParams;
use crate::error::Result;
use crate::geometry::BufferRatios;

/// Scanner settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Screen → frame mapping
    pub mapping: BufferRatios,
    /// Binarization parameters
    pub binarization: BinarizationConfig,
    /// Morphological filter kernels
    pub morphology: MorphologyConfig,
    /// Bounding-box classification
    pub classification: ClassifierParams,
    /// Text-line density checks
    pub validation: ValidationParams,
    /// Output crops
    pub extraction: ExtractionConfig,
    /// Capture size selection
    pub capture: CaptureConfig,
    /// Per-device corrections
    pub quirks: DeviceQuirks,
}

/// The two thresholding setups
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizationConfig {
    /// Used to find line and barcode shapes
    pub shape: ThresholdParams,
    /// Used for density checks and the text reader
    pub reader: ThresholdParams,
}

impl Default for BinarizationConfig {
    fn default() -> Self {
        Self {
            shape: ThresholdParams::SHAPE,
            reader: ThresholdParams::READER,
        }
    }
}

/// Opening removes specks, closing fuses strokes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    pub open_kernel: KernelSize,
    pub close_kernel: KernelSize,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            open_kernel: KernelSize::new(1, 11),
            close_kernel: KernelSize::new(80, 1),
        }
    }
}

/// Crop settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Margin added around each crop, in pixels
    pub crop_buffer: u32,
    /// Fewer accepted text lines than this means the document was not read
    pub min_text_lines: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            crop_buffer: 20,
            min_text_lines: 4,
        }
    }
}

/// Capture-size selection settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub pixel_bounds: PixelBounds,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ScannerConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ScannerConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &ScannerConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_scanner_config() {
        let config = ScannerConfig::default();

        assert_eq!(config.mapping.width, 14.0);
        assert_eq!(config.binarization.shape.block_size, 13);
        assert_eq!(config.binarization.reader.constant, 20);
        assert_eq!(config.morphology.close_kernel, KernelSize::new(80, 1));
        assert_eq!(config.extraction.crop_buffer, 20);
        assert_eq!(config.extraction.min_text_lines, 4);
        assert_eq!(config.capture.pixel_bounds.min, 470 * 320);
        assert_eq!(config.capture.pixel_bounds.max, 800 * 600);
        assert!((config.validation.fill_threshold - 0.15).abs() < f64::EPSILON);
        assert!((config.validation.outline_threshold - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = ScannerConfig::default();
        config.validation.outline_threshold = 0.2;
        config.extraction.min_text_lines = 3;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!((loaded.validation.outline_threshold - 0.2).abs() < f64::EPSILON);
        assert!((loaded.validation.fill_threshold - 0.15).abs() < f64::EPSILON);
        assert_eq!(loaded.extraction.min_text_lines, 3);
        assert_eq!(loaded.quirks.entries.len(), config.quirks.entries.len());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ScannerConfig = toml::from_str("[extraction]\ncrop_buffer = 8\n").unwrap();
        assert_eq!(config.extraction.crop_buffer, 8);
        assert_eq!(config.extraction.min_text_lines, 4);
        assert_eq!(config.morphology.open_kernel, KernelSize::new(1, 11));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
