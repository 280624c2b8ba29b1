use crate::detection::contours::{find_candidates, ClassifierParams, ContourForest};
use crate::detection::preprocessing::{self, KernelSize, ThresholdParams};
use crate::detection::validation::{self, ValidationParams};
use crate::detection::extract;
use crate::error::{Result, ScanError};
use crate::models::{Extent, RegionKind};
use crate::pipeline::{PipelineContext, PipelineStep, ScanData};
use image::{DynamicImage, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::sync::Arc;
use tracing::{debug, warn};

/// Binarize the original region for the text reader and keep it alongside
pub struct ReaderBinarizeStep {
    pub params: ThresholdParams,
}

impl PipelineStep for ReaderBinarizeStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let mut result = Vec::new();
        for item in data {
            let reader = Arc::new(preprocessing::binarize(&item.original, self.params)?);
            let mut new_item = item.with_image(DynamicImage::ImageLuma8((*reader).clone()));
            new_item.reader = Some(reader);
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Reader Binarization"
    }
}

/// Binarize the original region for shape detection
pub struct BinarizeStep {
    pub params: ThresholdParams,
}

impl PipelineStep for BinarizeStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let mut result = Vec::new();
        for item in data {
            let binary = preprocessing::binarize(&item.original, self.params)?;
            result.push(item.with_image(DynamicImage::ImageLuma8(binary)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Shape Binarization"
    }
}

/// Open then close to turn strokes into line blobs
pub struct MorphologyStep {
    pub open_kernel: KernelSize,
    pub close_kernel: KernelSize,
}

impl PipelineStep for MorphologyStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let mut result = Vec::new();
        for item in data {
            let binary = item.image.to_luma8();
            let merged = preprocessing::merge_strokes(&binary, self.open_kernel, self.close_kernel);
            result.push(item.with_image(DynamicImage::ImageLuma8(merged)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Morphology"
    }
}

/// Find contours and keep those whose box looks like `target` - splits one
/// mask into one item per candidate
pub struct CandidateStep {
    pub target: RegionKind,
    pub params: ClassifierParams,
}

impl PipelineStep for CandidateStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let mut result = Vec::new();

        for item in data {
            let mask = item.image.to_luma8();
            let forest = ContourForest::extract(&mask);
            let region = Extent::of(&item.original);
            let candidates = find_candidates(&forest, region, self.target, &self.params);

            debug!(
                "{} contours, {} {} candidates",
                forest.len(),
                candidates.len(),
                self.target
            );

            for candidate in candidates {
                let b = candidate.bbox;
                let mut new_item = item.with_image(item.image.crop_imm(b.x, b.y, b.width, b.height));
                new_item.candidate = Some(candidate);
                result.push(new_item);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Candidate Extraction"
    }
}

/// Drop text-line candidates that fail either density pass
pub struct TextLineValidationStep {
    pub params: ValidationParams,
}

impl PipelineStep for TextLineValidationStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let mut result = Vec::new();

        for item in data {
            let Some(candidate) = &item.candidate else {
                continue;
            };
            let reader = item.reader.as_ref().ok_or_else(|| {
                ScanError::Config("text-line validation needs reader binarization first".to_string())
            })?;

            match validation::validate_text_line(candidate, reader, &self.params) {
                Ok(coverage) => {
                    let mut new_item = item.clone();
                    if let Some(c) = new_item.candidate.as_mut() {
                        c.density = Some(coverage);
                    }
                    result.push(new_item);
                }
                Err(rejection) => {
                    debug!("contour {} rejected: {:?}", candidate.index, rejection);
                }
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Text Line Validation"
    }
}

/// Keep only the barcode candidate with the largest box
pub struct LargestBarcodeStep;

impl PipelineStep for LargestBarcodeStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let Some(first) = data.first().cloned() else {
            return Ok(Vec::new());
        };

        let winner = validation::largest_barcode(data.into_iter().filter_map(|item| item.candidate));

        Ok(winner
            .map(|candidate| {
                let mut item = first;
                let b = candidate.bbox;
                item.image = item.original.crop_imm(b.x, b.y, b.width, b.height);
                item.candidate = Some(candidate);
                vec![item]
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "Largest Barcode"
    }
}

/// Draw every surviving candidate onto a copy of the original (debug only)
pub struct BoxedOverviewStep;

impl PipelineStep for BoxedOverviewStep {
    fn process(&self, data: Vec<ScanData>, context: &PipelineContext) -> Result<Vec<ScanData>> {
        if context.debug.is_none() {
            return Ok(data);
        }
        let Some(first) = data.first() else {
            return Ok(data);
        };

        let mut overview = first.original.to_rgba8();
        for b in data.iter().filter_map(|item| item.candidate.as_ref().map(|c| c.bbox)) {
            draw_hollow_rect_mut(
                &mut overview,
                Rect::at(b.x as i32, b.y as i32).of_size(b.width, b.height),
                Rgba([255, 0, 0, 255]),
            );
        }
        context.dump("boxed", "boxed.png", &DynamicImage::ImageRgba8(overview));

        Ok(data)
    }

    fn name(&self) -> &str {
        "Boxed Overview"
    }
}

/// Crop each candidate from the original region with a margin
pub struct CropStep {
    pub buffer: u32,
}

impl PipelineStep for CropStep {
    fn process(&self, data: Vec<ScanData>, _context: &PipelineContext) -> Result<Vec<ScanData>> {
        let mut result = Vec::new();

        for item in data {
            let Some(candidate) = &item.candidate else {
                continue;
            };

            match extract::crop_with_buffer(&item.original, &candidate.bbox, self.buffer) {
                Some((_, cropped)) => result.push(item.with_image(cropped)),
                None => warn!("candidate {:?} lies outside the region, skipped", candidate.bbox),
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Region Crop"
    }
}
