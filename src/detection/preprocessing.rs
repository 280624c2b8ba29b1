use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Single-channel image holding only 0 (background) and 255 (foreground)
pub type BinaryImage = GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Which side of the local threshold becomes white
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Ink turns white on a black page; used for shape detection
    WhiteOnBlack,
    /// Ink stays black on a white page; used for the text reader
    BlackOnWhite,
}

/// Adaptive threshold parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    /// Odd neighbourhood size in pixels
    pub block_size: u32,
    /// Subtracted from the weighted local mean
    pub constant: i32,
    pub polarity: Polarity,
}

impl ThresholdParams {
    /// Parameters for finding line and barcode shapes
    pub const SHAPE: Self = Self {
        block_size: 13,
        constant: 10,
        polarity: Polarity::WhiteOnBlack,
    };

    /// Parameters for the image handed to a text reader
    pub const READER: Self = Self {
        block_size: 21,
        constant: 20,
        polarity: Polarity::BlackOnWhite,
    };

    /// Gaussian sigma matching a kernel of `block_size` pixels
    pub fn sigma(&self) -> f32 {
        0.3 * ((self.block_size.max(3) as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

/// Structuring element size, width x height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSize {
    pub width: u32,
    pub height: u32,
}

impl KernelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> Result<GrayImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ScanError::EmptyImage("grayscale conversion"));
    }
    Ok(img.to_luma8())
}

/// Binarize against a Gaussian-weighted local mean minus `constant`
pub fn adaptive_threshold(gray: &GrayImage, params: ThresholdParams) -> Result<BinaryImage> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(ScanError::EmptyImage("adaptive threshold"));
    }

    let local_mean = gaussian_blur_f32(gray, params.sigma());

    Ok(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as i32;
        let threshold = local_mean.get_pixel(x, y)[0] as i32 - params.constant;
        let above = value > threshold;
        let white = match params.polarity {
            Polarity::BlackOnWhite => above,
            Polarity::WhiteOnBlack => !above,
        };
        Luma([if white { FOREGROUND } else { BACKGROUND }])
    }))
}

/// Grayscale then threshold
pub fn binarize(img: &DynamicImage, params: ThresholdParams) -> Result<BinaryImage> {
    let gray = to_grayscale(img)?;
    adaptive_threshold(&gray, params)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MorphOp {
    Erode,
    Dilate,
}

/// Slide a 1-D window of `len` (anchored at `len / 2`) along one line of
/// samples. Out-of-image samples are ignored, so borders neither erode nor
/// dilate.
fn sweep_line(line: &[bool], len: u32, op: MorphOp, out: &mut Vec<bool>) {
    out.clear();
    let n = line.len();
    let len = len.max(1) as usize;
    let anchor = len / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for &set in line {
        prefix.push(prefix.last().copied().unwrap_or(0) + set as usize);
    }

    for i in 0..n {
        let start = i.saturating_sub(anchor);
        let end = (i + len - anchor).min(n);
        let count = prefix[end] - prefix[start];
        out.push(match op {
            MorphOp::Erode => count == end - start,
            MorphOp::Dilate => count > 0,
        });
    }
}

/// Rectangular erosion/dilation, done as a horizontal then a vertical pass
fn rect_morph(img: &BinaryImage, kernel: KernelSize, op: MorphOp) -> BinaryImage {
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    let mut line = Vec::new();
    let mut swept = Vec::new();

    if kernel.width > 1 {
        for y in 0..height {
            line.clear();
            line.extend((0..width).map(|x| out.get_pixel(x, y)[0] != BACKGROUND));
            sweep_line(&line, kernel.width, op, &mut swept);
            for (x, &set) in swept.iter().enumerate() {
                out.put_pixel(x as u32, y, Luma([if set { FOREGROUND } else { BACKGROUND }]));
            }
        }
    }

    if kernel.height > 1 {
        for x in 0..width {
            line.clear();
            line.extend((0..height).map(|y| out.get_pixel(x, y)[0] != BACKGROUND));
            sweep_line(&line, kernel.height, op, &mut swept);
            for (y, &set) in swept.iter().enumerate() {
                out.put_pixel(x, y as u32, Luma([if set { FOREGROUND } else { BACKGROUND }]));
            }
        }
    }

    out
}

pub fn erode(img: &BinaryImage, kernel: KernelSize) -> BinaryImage {
    rect_morph(img, kernel, MorphOp::Erode)
}

pub fn dilate(img: &BinaryImage, kernel: KernelSize) -> BinaryImage {
    rect_morph(img, kernel, MorphOp::Dilate)
}

/// Erosion then dilation: removes specks smaller than the kernel
pub fn open(img: &BinaryImage, kernel: KernelSize) -> BinaryImage {
    dilate(&erode(img, kernel), kernel)
}

/// Dilation then erosion: bridges gaps smaller than the kernel
pub fn close(img: &BinaryImage, kernel: KernelSize) -> BinaryImage {
    erode(&dilate(img, kernel), kernel)
}

/// Open with the tall kernel to drop noise, then close with the wide kernel
/// to fuse neighbouring strokes into line blobs. The order is fixed: closing
/// first would fuse the noise as well.
pub fn merge_strokes(img: &BinaryImage, open_kernel: KernelSize, close_kernel: KernelSize) -> BinaryImage {
    let opened = open(img, open_kernel);
    close(&opened, close_kernel)
}

/// Number of non-background pixels
pub fn count_set(img: &GrayImage) -> u64 {
    img.pixels().filter(|p| p[0] != BACKGROUND).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_from_rows(rows: &[&str]) -> BinaryImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        GrayImage::from_fn(width, height, |x, y| {
            let set = rows[y as usize].as_bytes()[x as usize] == b'#';
            Luma([if set { FOREGROUND } else { BACKGROUND }])
        })
    }

    #[test]
    fn close_bridges_horizontal_gap() {
        let img = binary_from_rows(&["##..##"]);
        let closed = close(&img, KernelSize::new(3, 1));
        assert_eq!(count_set(&closed), 6);
    }

    #[test]
    fn open_removes_short_vertical_runs() {
        let img = binary_from_rows(&[".#", ".#", "##", ".#", ".#"]);
        let opened = open(&img, KernelSize::new(1, 3));
        // the single pixel in column 0 cannot hold a 1x3 kernel
        assert_eq!(opened.get_pixel(0, 2)[0], BACKGROUND);
        assert_eq!(count_set(&opened), 5);
    }

    #[test]
    fn erosion_does_not_eat_image_border() {
        let img = binary_from_rows(&["####"]);
        let eroded = erode(&img, KernelSize::new(3, 1));
        assert_eq!(count_set(&eroded), 4);
    }

    /// 200x40 mask with 1px vertical strokes of `height` every 4px from x=80
    fn stroke_row(height: u32) -> BinaryImage {
        GrayImage::from_fn(200, 40, |x, y| {
            let on_stroke = (80..=92).contains(&x) && (x - 80) % 4 == 0;
            let set = on_stroke && (10..10 + height).contains(&y);
            Luma([if set { FOREGROUND } else { BACKGROUND }])
        })
    }

    #[test]
    fn merge_strokes_opens_before_closing() {
        let (open_kernel, close_kernel) = (KernelSize::new(1, 11), KernelSize::new(80, 1));

        // short specks vanish before the wide close could join them
        let specks = stroke_row(5);
        assert_eq!(count_set(&merge_strokes(&specks, open_kernel, close_kernel)), 0);

        // closing alone fuses the same specks into a blob
        let fused = close(&specks, close_kernel);
        assert_eq!(fused.get_pixel(86, 12)[0], FOREGROUND);
        assert!(count_set(&fused) > count_set(&specks));
    }

    #[test]
    fn merge_strokes_keeps_and_fuses_tall_strokes() {
        let strokes = stroke_row(12);
        let merged = merge_strokes(&strokes, KernelSize::new(1, 11), KernelSize::new(80, 1));

        // gap between two strokes is filled on every stroke row
        for y in 10..22 {
            assert_eq!(merged.get_pixel(86, y)[0], FOREGROUND, "row {y}");
        }
        assert_eq!(merged.get_pixel(86, 5)[0], BACKGROUND);
        assert_eq!(merged.get_pixel(20, 15)[0], BACKGROUND);
    }

    #[test]
    fn empty_image_is_an_error() {
        let img = DynamicImage::new_luma8(0, 0);
        assert!(binarize(&img, ThresholdParams::SHAPE).is_err());
    }

    #[test]
    fn polarity_flips_ink() {
        // dark stripe on a light page
        let gray = GrayImage::from_fn(40, 40, |x, _| Luma([if (18..22).contains(&x) { 20 } else { 220 }]));
        let shape = adaptive_threshold(&gray, ThresholdParams::SHAPE).unwrap();
        let reader = adaptive_threshold(&gray, ThresholdParams::READER).unwrap();
        assert_eq!(shape.get_pixel(20, 20)[0], FOREGROUND);
        assert_eq!(shape.get_pixel(2, 20)[0], BACKGROUND);
        assert_eq!(reader.get_pixel(20, 20)[0], BACKGROUND);
    }
}
