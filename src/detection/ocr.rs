use image::DynamicImage;
pub use ocrs::{ImageSource, OcrEngine}; // Re-export for callers that drive the engine directly
use ocrs::OcrEngineParams;
use rten::Model;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::detection::DetectedRegion;
use crate::detection::preprocessing::{self, ThresholdParams};
use crate::error::{Result, ScanError};

/// Anything that can turn a cropped text line into a string
pub trait TextReader {
    fn read(&self, line: &DynamicImage) -> Result<String>;
}

/// `ocrs`-backed reader
pub struct OcrsReader {
    engine: OcrEngine,
}

/// Default model location, `~/.cache/ocrs`
pub fn default_model_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ScanError::Ocr("neither HOME nor USERPROFILE is set".to_string()))?;
    Ok(Path::new(&home_dir).join(".cache/ocrs"))
}

impl OcrsReader {
    /// Load `text-detection.rten` and `text-recognition.rten` from `model_dir`
    pub fn load(model_dir: &Path) -> Result<Self> {
        let detection_model_path = model_dir.join("text-detection.rten");
        let recognition_model_path = model_dir.join("text-recognition.rten");

        if !detection_model_path.exists() || !recognition_model_path.exists() {
            return Err(ScanError::Ocr(format!(
                "OCR models not found. Expected locations:\n  - {}\n  - {}",
                detection_model_path.display(),
                recognition_model_path.display()
            )));
        }

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| ScanError::Ocr(e.to_string()))?;
        let recognition_model =
            Model::load_file(&recognition_model_path).map_err(|e| ScanError::Ocr(e.to_string()))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| ScanError::Ocr(e.to_string()))?;

        Ok(Self { engine })
    }
}

impl TextReader for OcrsReader {
    fn read(&self, line: &DynamicImage) -> Result<String> {
        let img = line.to_rgb8();
        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| ScanError::Ocr(e.to_string()))?;
        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| ScanError::Ocr(e.to_string()))?;
        let text = self.engine.get_text(&ocr_input).map_err(|e| ScanError::Ocr(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}

/// Re-binarize each line for the reader and read it, keeping line order
pub fn recognize_lines(
    reader: &dyn TextReader,
    lines: &[DetectedRegion],
    params: ThresholdParams,
) -> Result<Vec<String>> {
    let mut texts = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let binary = preprocessing::binarize(&line.image, params)?;
        let text = reader.read(&DynamicImage::ImageLuma8(binary))?;
        debug!("line {}: '{}'", i + 1, text);
        texts.push(text);
    }
    Ok(texts)
}
