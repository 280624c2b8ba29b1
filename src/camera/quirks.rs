//! Per-device frame corrections
//!
//! Some devices deliver frames upside down. Rather than special-casing them
//! in the detector, corrections live in a small table keyed by device model.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Rotation applied to a decoded frame before detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Correction {
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        match self {
            Correction::Rotate90 => img.rotate90(),
            Correction::Rotate180 => img.rotate180(),
            Correction::Rotate270 => img.rotate270(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuirkEntry {
    /// Exact device model string
    pub model: String,
    /// Only match when the sensor reports this orientation (any if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_orientation: Option<u16>,
    pub correction: Correction,
}

/// Table of known-defective devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceQuirks {
    pub entries: Vec<QuirkEntry>,
}

impl Default for DeviceQuirks {
    fn default() -> Self {
        Self {
            entries: vec![QuirkEntry {
                model: "Nexus 5X".to_string(),
                sensor_orientation: None,
                correction: Correction::Rotate180,
            }],
        }
    }
}

impl DeviceQuirks {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// First correction registered for this device, if any
    pub fn correction_for(&self, model: &str, sensor_orientation: u16) -> Option<Correction> {
        self.entries
            .iter()
            .find(|e| {
                e.model == model
                    && e.sensor_orientation
                        .is_none_or(|deg| deg == sensor_orientation)
            })
            .map(|e| e.correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nexus_5x_is_rotated() {
        let quirks = DeviceQuirks::default();
        assert_eq!(quirks.correction_for("Nexus 5X", 270), Some(Correction::Rotate180));
        assert_eq!(quirks.correction_for("Pixel 3", 90), None);
    }

    #[test]
    fn orientation_filter() {
        let quirks = DeviceQuirks {
            entries: vec![QuirkEntry {
                model: "Acme".to_string(),
                sensor_orientation: Some(90),
                correction: Correction::Rotate270,
            }],
        };
        assert_eq!(quirks.correction_for("Acme", 90), Some(Correction::Rotate270));
        assert_eq!(quirks.correction_for("Acme", 270), None);
    }
}
