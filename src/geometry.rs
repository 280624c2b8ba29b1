//! Mapping rectangles between coordinate spaces
//!
//! The framing guide lives in screen pixels. The detector needs it in
//! decoded-frame pixels, and the autofocus collaborator needs it in the
//! camera's normalized `[-1000, 1000]` area space. Both are the same
//! proportional mapping with a margin added on every side.

use serde::{Deserialize, Serialize};

use crate::models::{Extent, MappedRect, ScreenRect};

/// Side length of the normalized focus/metering space (`-1000..=1000`)
pub const FOCUS_SPACE_SIZE: u32 = 2000;
/// Offset applied after mapping into the focus space
pub const FOCUS_SPACE_OFFSET: i32 = -1000;

/// Margin added around a mapped rectangle, as a divisor of the target extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferRatios {
    pub width: f64,
    pub height: f64,
}

impl Default for BufferRatios {
    fn default() -> Self {
        Self {
            width: 14.0,
            height: 14.0,
        }
    }
}

/// Map `rect` from a space of extent `from` into a space of extent `to`,
/// adding `to / ratio` of margin on each axis. Values are truncated toward
/// zero only once, at the end. No clamping happens here.
pub fn map_rect(rect: &ScreenRect, from: Extent, to: Extent, ratios: BufferRatios) -> MappedRect {
    debug_assert!(!from.is_empty(), "source extent must be non-empty, got {from}");
    debug_assert!(!to.is_empty(), "target extent must be non-empty, got {to}");
    debug_assert!(
        ratios.width > 0.0 && ratios.height > 0.0,
        "buffer ratios must be positive"
    );

    let scale_x = to.width as f64 / from.width as f64;
    let scale_y = to.height as f64 / from.height as f64;
    let buffer_x = to.width as f64 / ratios.width;
    let buffer_y = to.height as f64 / ratios.height;

    MappedRect {
        left: (rect.left as f64 * scale_x - buffer_x) as i32,
        top: (rect.top as f64 * scale_y - buffer_y) as i32,
        right: (rect.right as f64 * scale_x + buffer_x) as i32,
        bottom: (rect.bottom as f64 * scale_y + buffer_y) as i32,
    }
}

/// Camera focus/metering area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusArea {
    pub rect: MappedRect,
    pub weight: u32,
}

/// Map the framing guide into the camera's normalized focus space
pub fn focus_area(guide: &ScreenRect, screen: Extent, ratios: BufferRatios) -> FocusArea {
    let space = Extent::new(FOCUS_SPACE_SIZE, FOCUS_SPACE_SIZE);
    let mapped = map_rect(guide, screen, space, ratios);
    FocusArea {
        rect: MappedRect {
            left: mapped.left + FOCUS_SPACE_OFFSET,
            top: mapped.top + FOCUS_SPACE_OFFSET,
            right: mapped.right + FOCUS_SPACE_OFFSET,
            bottom: mapped.bottom + FOCUS_SPACE_OFFSET,
        },
        weight: 1,
    }
}
