use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::detection::preprocessing::BinaryImage;
use crate::error::{Result, ScanError};
use crate::models::Candidate;

/// One working image plus what earlier steps learned about it
#[derive(Clone)]
pub struct ScanData {
    /// The working image (color region, binary mask or final crop)
    pub image: DynamicImage,

    /// The guide region as decoded from the frame, shared by every item
    pub original: Arc<DynamicImage>,

    /// Reader-oriented binarization of `original`, once a step computed it
    pub reader: Option<Arc<BinaryImage>>,

    /// The candidate this item stands for (None before contour extraction)
    pub candidate: Option<Candidate>,
}

impl ScanData {
    /// Create ScanData for a full region
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            reader: None,
            candidate: None,
        }
    }

    /// Same shared state, different working image
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            original: self.original.clone(),
            reader: self.reader.clone(),
            candidate: self.candidate.clone(),
        }
    }
}

/// Where intermediate images go
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root of the dump tree
    pub output_dir: PathBuf,
}

/// Shared, read-only state handed to every step
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

impl PipelineContext {
    /// Write `image` to `<output_dir>/<dir>/<file>` when debug output is on.
    /// Failures are logged; diagnostics never fail a scan.
    pub fn dump(&self, dir: &str, file: &str, image: &DynamicImage) {
        let Some(debug_config) = &self.debug else {
            return;
        };

        let step_dir = debug_config.output_dir.join(dir);
        let output_path = step_dir.join(file);
        let saved = std::fs::create_dir_all(&step_dir)
            .map_err(ScanError::from)
            .and_then(|_| image.save(&output_path).map_err(ScanError::from));

        match saved {
            Ok(()) => debug!("saved {}/{}", dir, file),
            Err(e) => warn!("could not write debug image {}: {}", output_path.display(), e),
        }
    }
}

/// One stage of a scan
pub trait PipelineStep: Send + Sync {
    /// Steps may fan out (region → candidates), filter, or reduce to one item
    fn process(&self, data: Vec<ScanData>, context: &PipelineContext) -> Result<Vec<ScanData>>;

    /// Human-readable name for this step (used for logs and debug folders)
    fn name(&self) -> &str;
}

fn step_dir_name(index: usize, name: &str) -> String {
    format!("{:02}_{}", index, name.to_lowercase().replace(' ', "_"))
}

/// Ordered list of steps run over a guide region
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Dump every step's output under `output_dir`, which must be empty or absent
    pub fn with_debug(mut self, output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(ScanError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Reuse an existing context (e.g. one already pointing at a debug directory)
    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order on the guide region
    pub fn run(&self, input: DynamicImage) -> Result<Vec<ScanData>> {
        self.run_partial(input, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize) -> Result<Vec<ScanData>> {
        self.context.dump("00_input", "01.png", &input);

        let mut data = vec![ScanData::from_image(input)];

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!("running step: {} ({} items)", step.name(), data.len());
            data = step.process(data, &self.context)?;
            debug!("  → {} items", data.len());

            if self.context.debug.is_some() {
                let dir = step_dir_name(step_idx + 1, step.name());
                for (idx, item) in data.iter().enumerate() {
                    self.context.dump(&dir, &format!("{:02}.png", idx + 1), &item.image);
                }
            }

            if data.is_empty() {
                break;
            }
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
