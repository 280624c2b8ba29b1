use image::{DynamicImage, GenericImageView};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, ScanError};

/// Width/height of a screen, frame or capture size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

/// A capture size advertised by the camera device
pub type SupportedSize = Extent;

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build an extent with width >= height, swapping if the source reports portrait
    pub fn landscape(width: u32, height: u32) -> Self {
        Self::new(width, height).to_landscape()
    }

    pub fn of(img: &DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height }
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }

    pub fn to_landscape(self) -> Self {
        if self.is_portrait() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Extent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
        let height = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
        Ok(Self { width, height })
    }
}

/// Framing guide the user aligns the document against, in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left as f64 + self.right as f64) / 2.0,
            (self.top as f64 + self.bottom as f64) / 2.0,
        )
    }
}

impl FromStr for ScreenRect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("bad rectangle '{s}': {e}"))?;
        match parts[..] {
            [left, top, right, bottom] => Ok(Self::new(left, top, right, bottom)),
            _ => Err(format!("expected LEFT,TOP,RIGHT,BOTTOM, got '{s}'")),
        }
    }
}

/// Rectangle produced by the coordinate mapper. Not clamped: edges may be
/// negative or past the target extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl MappedRect {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.left as f64 + self.right as f64) / 2.0,
            (self.top as f64 + self.bottom as f64) / 2.0,
        )
    }

    /// Intersect with `[0, extent)`; `None` when nothing of the rectangle is left
    pub fn clamp_to(&self, extent: Extent) -> Option<BoundingBox> {
        let left = self.left.max(0) as i64;
        let top = self.top.max(0) as i64;
        let right = (self.right as i64).min(extent.width as i64);
        let bottom = (self.bottom as i64).min(extent.height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(BoundingBox {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Axis-aligned box in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest box containing every point (inclusive of edge pixels)
    pub fn from_points(points: &[Point<u32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn fits_within(&self, extent: Extent) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= extent.width
            && self.bottom() <= extent.height
    }

    /// Grow by `buffer` on every side. `None` if the grown box would start
    /// left of or above the origin.
    pub fn expanded(&self, buffer: u32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_sub(buffer)?,
            y: self.y.checked_sub(buffer)?,
            width: self.width + 2 * buffer,
            height: self.height + 2 * buffer,
        })
    }
}

/// What a candidate region is believed to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    TextLine,
    Barcode,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::TextLine => write!(f, "text line"),
            RegionKind::Barcode => write!(f, "barcode"),
        }
    }
}

/// A classified contour awaiting (or past) density validation
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Index of the contour in the forest it was extracted from
    pub index: usize,
    pub bbox: BoundingBox,
    /// Outer boundary of the contour, in region pixels
    pub outline: Arc<Vec<Point<u32>>>,
    pub kind: RegionKind,
    /// Set by the validator: outline coverage for text lines, box area for barcodes
    pub density: Option<f64>,
}

/// An encoded camera frame together with the size the camera claims it has
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub extent: Extent,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, extent: Extent) -> Self {
        Self { bytes, extent }
    }

    /// Decode the pixel buffer, rejecting frames whose decoded size matches
    /// neither orientation of the reported extent
    pub fn decode(&self) -> Result<DynamicImage> {
        if self.bytes.is_empty() {
            return Err(ScanError::EmptyImage("frame decoder"));
        }
        let img = image::load_from_memory(&self.bytes)?;
        let decoded = Extent::of(&img);
        if decoded.is_empty() {
            return Err(ScanError::EmptyImage("frame decoder"));
        }
        if decoded.to_landscape() != self.extent.to_landscape() {
            return Err(ScanError::ExtentMismatch {
                expected: self.extent.to_string(),
                actual: decoded.to_string(),
            });
        }
        Ok(img)
    }
}
