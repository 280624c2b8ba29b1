use idscan::{CaptureContext, Extent, Frame, ScreenRect};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;

pub const PAGE: Rgb<u8> = Rgb([230, 230, 225]);
pub const INK: Rgb<u8> = Rgb([30, 30, 40]);

/// Frame size used by the end-to-end tests; the screen has the same size so
/// the guide maps 1:1 plus the margin
pub const FRAME: Extent = Extent::new(1400, 700);

/// Guide that maps to (40, 20)-(1360, 680) in the frame
pub const GUIDE: ScreenRect = ScreenRect::new(140, 70, 1260, 630);

pub fn blank_page() -> RgbImage {
    RgbImage::from_pixel(FRAME.width, FRAME.height, PAGE)
}

/// One line of block "characters": 8x16 glyphs with 4px gaps
pub fn draw_text_line(img: &mut RgbImage, x: i32, y: i32, glyphs: u32) {
    for i in 0..glyphs {
        draw_filled_rect_mut(img, Rect::at(x + 12 * i as i32, y).of_size(8, 16), INK);
    }
}

/// Vertical 3px bars with 3px gaps, `width` x `height`
pub fn draw_barcode(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    let mut offset = 0;
    while offset + 3 <= width {
        draw_filled_rect_mut(img, Rect::at(x + offset as i32, y).of_size(3, height), INK);
        offset += 6;
    }
}

/// Page with `lines` text lines of 25 glyphs, 80px apart
pub fn text_document(lines: u32) -> RgbImage {
    let mut img = blank_page();
    for i in 0..lines {
        draw_text_line(&mut img, 200, 120 + 80 * i as i32, 25);
    }
    img
}

/// Page with a 900x80 barcode and a thinner wide decoy strip above it
pub fn barcode_document() -> RgbImage {
    let mut img = blank_page();
    draw_barcode(&mut img, 200, 120, 810, 30);
    draw_barcode(&mut img, 200, 400, 900, 80);
    img
}

pub fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes
}

pub fn frame_from(img: RgbImage) -> Frame {
    let img = DynamicImage::ImageRgb8(img);
    let extent = Extent::of(&img);
    Frame::new(encode_png(&img), extent)
}

pub fn capture() -> CaptureContext {
    CaptureContext::new(GUIDE, FRAME)
}
