use image::{GrayImage, Luma};
use image::imageops::crop_imm;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::point::Point;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::detection::preprocessing::{count_set, BinaryImage, FOREGROUND};
use crate::models::{BoundingBox, Candidate};

/// Density thresholds for accepting text lines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationParams {
    /// Minimum share of set pixels of the reader image inside the box
    pub fill_threshold: f64,
    /// Minimum share of the box covered by the drawn contour outline
    pub outline_threshold: f64,
    /// Outline stroke width in pixels
    pub outline_stroke: u32,
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            fill_threshold: 0.15,
            outline_threshold: 0.15,
            outline_stroke: 5,
        }
    }
}

/// Why a text-line candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    SparseFill { ratio: f64 },
    WeakOutline { ratio: f64 },
}

fn ratio(set: u64, bbox: &BoundingBox) -> f64 {
    if bbox.area() == 0 {
        return 0.0;
    }
    set as f64 / bbox.area() as f64
}

/// Share of set pixels of `binary` inside `bbox`
pub fn fill_ratio(binary: &BinaryImage, bbox: &BoundingBox) -> f64 {
    let view = crop_imm(binary, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
    ratio(count_set(&view), bbox)
}

/// Fresh box-sized mask with the outline stroked onto it. Parts of the stroke
/// falling outside the box are dropped.
pub fn outline_mask(outline: &[Point<u32>], bbox: &BoundingBox, stroke: u32) -> GrayImage {
    let mut mask = GrayImage::new(bbox.width, bbox.height);
    let stroke = stroke.max(1);
    let half = (stroke / 2) as i32;

    for p in outline {
        let x = p.x as i32 - bbox.x as i32 - half;
        let y = p.y as i32 - bbox.y as i32 - half;
        draw_filled_rect_mut(&mut mask, Rect::at(x, y).of_size(stroke, stroke), Luma([FOREGROUND]));
    }

    mask
}

/// Share of the box covered by the stroked outline
pub fn outline_ratio(outline: &[Point<u32>], bbox: &BoundingBox, stroke: u32) -> f64 {
    ratio(count_set(&outline_mask(outline, bbox, stroke)), bbox)
}

/// Both density passes must succeed. Returns the outline coverage.
pub fn validate_text_line(
    candidate: &Candidate,
    reader: &BinaryImage,
    params: &ValidationParams,
) -> Result<f64, Rejection> {
    let fill = fill_ratio(reader, &candidate.bbox);
    if fill < params.fill_threshold {
        return Err(Rejection::SparseFill { ratio: fill });
    }

    let coverage = outline_ratio(&candidate.outline, &candidate.bbox, params.outline_stroke);
    if coverage < params.outline_threshold {
        return Err(Rejection::WeakOutline { ratio: coverage });
    }

    Ok(coverage)
}

/// Candidate with the largest box; the first one seen wins a tie
pub fn largest_barcode(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        let replace = match &best {
            Some(current) => current.bbox.area() < candidate.bbox.area(),
            None => true,
        };
        if replace {
            best = Some(candidate);
        }
    }
    best.map(|mut c| {
        c.density = Some(c.bbox.area() as f64);
        c
    })
}
