//! Capture configuration
//!
//! Picks the capture resolution, focus and flash modes and display
//! orientation from what the camera device advertises. Runs once per camera
//! session, before frames are streamed.

pub mod quirks;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ScannerConfig;
use crate::geometry::{self, FocusArea};
use crate::models::{Extent, ScreenRect, SupportedSize};

/// Inclusive range of acceptable capture pixel counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub min: u64,
    pub max: u64,
}

impl Default for PixelBounds {
    fn default() -> Self {
        Self {
            min: 470 * 320,
            max: 800 * 600,
        }
    }
}

impl PixelBounds {
    pub fn contains(&self, size: &SupportedSize) -> bool {
        (self.min..=self.max).contains(&size.pixel_count())
    }
}

/// Choose the supported size that best fits the screen.
///
/// A size equal to the screen once turned landscape is returned at once,
/// even outside `bounds`. Otherwise the in-bounds size with the closest
/// aspect ratio wins, the one with more pixels on a tie. With nothing in
/// bounds the device default is returned.
pub fn select_capture_size(
    supported: &[SupportedSize],
    screen: Extent,
    default: SupportedSize,
    bounds: PixelBounds,
) -> SupportedSize {
    let screen = screen.to_landscape();
    let screen_ratio = screen.aspect_ratio();

    if let Some(exact) = supported.iter().find(|s| s.to_landscape() == screen) {
        debug!("exact capture size match {}", exact);
        return *exact;
    }

    // largest first, so equal ratios resolve the same way whatever the input order
    let mut by_pixels = supported.to_vec();
    by_pixels.sort_by_key(|s| std::cmp::Reverse(s.pixel_count()));

    let mut best: Option<SupportedSize> = None;
    let mut best_diff = f64::INFINITY;

    for size in &by_pixels {
        if !bounds.contains(size) {
            continue;
        }
        let diff = (size.to_landscape().aspect_ratio() - screen_ratio).abs();
        if diff < best_diff {
            best = Some(*size);
            best_diff = diff;
        }
    }

    match best {
        Some(size) => size,
        None => {
            debug!("no capture size within {:?}, using default {}", bounds, default);
            default
        }
    }
}

/// First `desired` value that the device supports
pub fn pick_supported<T: PartialEq + Copy>(supported: &[T], desired: &[T]) -> Option<T> {
    desired.iter().copied().find(|d| supported.contains(d))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    ContinuousPicture,
    ContinuousVideo,
    Auto,
    Macro,
    Edof,
    Fixed,
    Infinity,
}

/// Focus modes in order of preference for document capture
pub const FOCUS_PREFERENCE: [FocusMode; 5] = [
    FocusMode::ContinuousPicture,
    FocusMode::ContinuousVideo,
    FocusMode::Auto,
    FocusMode::Macro,
    FocusMode::Edof,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlashMode {
    Off,
    On,
    Auto,
    Torch,
    RedEye,
}

pub fn preferred_focus_mode(supported: &[FocusMode]) -> Option<FocusMode> {
    pick_supported(supported, &FOCUS_PREFERENCE)
}

/// Flash mode that turns the light on (torch, else flash) or off
pub fn light_mode(supported: &[FlashMode], on: bool) -> Option<FlashMode> {
    if on {
        pick_supported(supported, &[FlashMode::Torch, FlashMode::On])
    } else {
        pick_supported(supported, &[FlashMode::Off])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Back,
    Front,
}

/// Clockwise rotation to apply to the preview so it appears upright
pub fn display_orientation(sensor_degrees: u16, display_rotation: u16, facing: Facing) -> u16 {
    let sensor = sensor_degrees % 360;
    let rotation = display_rotation % 360;
    match facing {
        Facing::Front => (360 - (sensor + rotation) % 360) % 360,
        Facing::Back => (sensor + 360 - rotation) % 360,
    }
}

/// What the camera device reports about itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub model: String,
    pub supported_sizes: Vec<SupportedSize>,
    pub default_size: SupportedSize,
    #[serde(default)]
    pub focus_modes: Vec<FocusMode>,
    #[serde(default)]
    pub flash_modes: Vec<FlashMode>,
    pub sensor_orientation: u16,
    pub facing: Facing,
    #[serde(default)]
    pub video_stabilization: bool,
}

/// Settings handed to the camera before streaming starts
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Screen extent, landscape-normalized
    pub screen: Extent,
    pub capture_size: SupportedSize,
    pub focus_mode: Option<FocusMode>,
    /// Light off at session start, when the device can switch it
    pub flash_mode: Option<FlashMode>,
    pub display_orientation: u16,
    pub video_stabilization: bool,
}

impl CaptureSettings {
    /// Focus/metering area for the framing guide
    pub fn focus_area(&self, guide: &ScreenRect, config: &ScannerConfig) -> FocusArea {
        geometry::focus_area(guide, self.screen, config.mapping)
    }
}

/// Derive capture settings from the device capabilities and screen size
pub fn configure_capture(
    device: &DeviceCapabilities,
    screen: Extent,
    display_rotation: u16,
    config: &ScannerConfig,
) -> CaptureSettings {
    let screen = screen.to_landscape();
    let capture_size = select_capture_size(
        &device.supported_sizes,
        screen,
        device.default_size,
        config.capture.pixel_bounds,
    );
    info!("capture size {} for screen {}", capture_size, screen);

    CaptureSettings {
        screen,
        capture_size,
        focus_mode: preferred_focus_mode(&device.focus_modes),
        flash_mode: light_mode(&device.flash_modes, false),
        display_orientation: display_orientation(device.sensor_orientation, display_rotation, device.facing),
        video_stabilization: device.video_stabilization,
    }
}
