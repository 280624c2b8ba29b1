use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::detection::preprocessing::BinaryImage;
use crate::models::{BoundingBox, Candidate, Extent, RegionKind};

/// One border in a two-level contour forest
#[derive(Debug, Clone)]
pub struct ContourNode {
    pub points: Arc<Vec<Point<u32>>>,
    pub is_hole: bool,
    pub parent: Option<usize>,
    pub first_child: Option<usize>,
    pub next_sibling: Option<usize>,
}

/// Flat arena of contours. Every outer border is a root; holes hang off the
/// outer border that directly encloses them. Siblings are linked in
/// extraction order.
#[derive(Debug, Clone, Default)]
pub struct ContourForest {
    nodes: Vec<ContourNode>,
    first_root: Option<usize>,
}

impl ContourForest {
    /// Trace every border of the foreground in `binary`
    pub fn extract(binary: &BinaryImage) -> Self {
        let traced = find_contours::<u32>(binary);

        let mut nodes: Vec<ContourNode> = traced
            .into_iter()
            .map(|c| {
                let is_hole = c.border_type == BorderType::Hole;
                ContourNode {
                    points: Arc::new(c.points),
                    is_hole,
                    // outer borders nested in a hole are still roots
                    parent: if is_hole { c.parent } else { None },
                    first_child: None,
                    next_sibling: None,
                }
            })
            .collect();

        let mut first_root = None;
        let mut last_root: Option<usize> = None;
        let mut last_child: Vec<Option<usize>> = vec![None; nodes.len()];

        for idx in 0..nodes.len() {
            match nodes[idx].parent {
                None => {
                    match last_root {
                        Some(prev) => nodes[prev].next_sibling = Some(idx),
                        None => first_root = Some(idx),
                    }
                    last_root = Some(idx);
                }
                Some(parent) => {
                    match last_child[parent] {
                        Some(prev) => nodes[prev].next_sibling = Some(idx),
                        None => nodes[parent].first_child = Some(idx),
                    }
                    last_child[parent] = Some(idx);
                }
            }
        }

        Self { nodes, first_root }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> Option<&ContourNode> {
        self.nodes.get(idx)
    }

    fn siblings_from(&self, start: Option<usize>) -> impl Iterator<Item = (usize, &ContourNode)> + '_ {
        std::iter::successors(start, move |&idx| self.nodes[idx].next_sibling)
            .map(move |idx| (idx, &self.nodes[idx]))
    }

    /// Top-level contours in extraction order
    pub fn roots(&self) -> impl Iterator<Item = (usize, &ContourNode)> + '_ {
        self.siblings_from(self.first_root)
    }

    /// Holes directly inside `idx`
    pub fn children(&self, idx: usize) -> impl Iterator<Item = (usize, &ContourNode)> + '_ {
        self.siblings_from(self.nodes.get(idx).and_then(|n| n.first_child))
    }
}

/// Geometric thresholds for tagging bounding boxes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    pub text_min_height: u32,
    pub text_min_width: u32,
    /// Text lines must be smaller than the region divided by this, on both axes
    pub text_max_divisor: f64,
    /// Barcodes are wider than this many times their height
    pub barcode_min_aspect: f64,
    /// Barcodes span at least this fraction of the region width
    pub barcode_min_width_fraction: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            text_min_height: 10,
            text_min_width: 50,
            text_max_divisor: 1.5,
            barcode_min_aspect: 3.0,
            barcode_min_width_fraction: 0.6,
        }
    }
}

impl ClassifierParams {
    pub fn is_text_line(&self, bbox: &BoundingBox, region: Extent) -> bool {
        let (w, h) = (bbox.width as f64, bbox.height as f64);
        bbox.width > bbox.height
            && bbox.height > self.text_min_height
            && bbox.width > self.text_min_width
            && h < region.height as f64 / self.text_max_divisor
            && w < region.width as f64 / self.text_max_divisor
    }

    pub fn is_barcode(&self, bbox: &BoundingBox, region: Extent) -> bool {
        let (w, h) = (bbox.width as f64, bbox.height as f64);
        w > self.barcode_min_aspect * h && w >= self.barcode_min_width_fraction * region.width as f64
    }

    pub fn matches(&self, kind: RegionKind, bbox: &BoundingBox, region: Extent) -> bool {
        match kind {
            RegionKind::TextLine => self.is_text_line(bbox, region),
            RegionKind::Barcode => self.is_barcode(bbox, region),
        }
    }

    /// Single tag for a box. The two predicates overlap for wide boxes
    /// between 0.6 and 2/3 of the region width; those are tagged as barcodes.
    pub fn classify(&self, bbox: &BoundingBox, region: Extent) -> Option<RegionKind> {
        if self.is_barcode(bbox, region) {
            Some(RegionKind::Barcode)
        } else if self.is_text_line(bbox, region) {
            Some(RegionKind::TextLine)
        } else {
            None
        }
    }
}

/// Top-level contours whose bounding box matches `target`, in extraction order
pub fn find_candidates(
    forest: &ContourForest,
    region: Extent,
    target: RegionKind,
    params: &ClassifierParams,
) -> Vec<Candidate> {
    forest
        .roots()
        .filter_map(|(idx, node)| {
            let bbox = BoundingBox::from_points(&node.points)?;
            params.matches(target, &bbox, region).then(|| Candidate {
                index: idx,
                bbox,
                outline: node.points.clone(),
                kind: target,
                density: None,
            })
        })
        .collect()
}
