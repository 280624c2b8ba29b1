use image::DynamicImage;

use crate::error::{Result, ScanError};
use crate::models::{BoundingBox, Extent, MappedRect};

/// Crop `bbox` grown by `buffer` pixels on every side. If the grown box does
/// not fit inside the image the unexpanded box is used instead; `None` only
/// when even that falls outside.
pub fn crop_with_buffer(original: &DynamicImage, bbox: &BoundingBox, buffer: u32) -> Option<(BoundingBox, DynamicImage)> {
    let extent = Extent::of(original);
    let chosen = bbox
        .expanded(buffer)
        .filter(|grown| grown.fits_within(extent))
        .or_else(|| bbox.fits_within(extent).then_some(*bbox))?;

    let cropped = original.crop_imm(chosen.x, chosen.y, chosen.width, chosen.height);
    Some((chosen, cropped))
}

/// Cut the mapped guide region out of a decoded frame, clamped to its bounds
pub fn crop_mapped(frame: &DynamicImage, mapped: &MappedRect) -> Result<(BoundingBox, DynamicImage)> {
    let bbox = mapped
        .clamp_to(Extent::of(frame))
        .ok_or_else(|| ScanError::Geometry(format!("{mapped:?}")))?;
    Ok((bbox, frame.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height)))
}
