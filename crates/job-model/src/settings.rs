//! Deployment-level composite settings.
//!
//! These are chosen once per deployment and never inferred from a request.

use serde::{Deserialize, Serialize};

use crate::position::PositionKind;

/// Inset from the frame edges for corner placements, in pixels.
pub const DEFAULT_MARGIN_PX: u32 = 40;

/// Width of the soft mask edge, in pixels.
pub const DEFAULT_FEATHER_PX: u32 = 15;

/// Overlay width relative to its source width.
pub const DEFAULT_OVERLAY_SCALE: f64 = 0.3;

/// How the circular alpha mask reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskStrategy {
    /// Evaluated per pixel by the engine from a luma expression.
    #[default]
    Procedural,
    /// Pre-rendered grayscale image sized to the scaled overlay.
    Raster,
}

impl MaskStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MaskStrategy::Procedural => "procedural",
            MaskStrategy::Raster => "raster",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "procedural" | "geq" => Some(MaskStrategy::Procedural),
            "raster" | "image" | "png" => Some(MaskStrategy::Raster),
            _ => None,
        }
    }
}

/// How a finished composite is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Return the video bytes directly.
    #[default]
    Inline,
    /// Push the bytes to the blob sink and return its locator.
    Uploaded,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Inline => "inline",
            DeliveryMode::Uploaded => "uploaded",
        }
    }
}

/// Defaults applied to requests that omit optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeDefaults {
    /// Placement used when a request omits `position` or names an unknown one.
    pub default_position: PositionKind,

    /// Edge inset for corner placements.
    pub margin_px: u32,

    /// Soft edge width of the circular mask.
    pub feather_px: u32,

    /// Overlay scale used when a request omits `overlayWidth`.
    pub overlay_scale: f64,

    /// Mask delivery strategy.
    pub mask_strategy: MaskStrategy,
}

impl Default for CompositeDefaults {
    fn default() -> Self {
        Self {
            default_position: PositionKind::default(),
            margin_px: DEFAULT_MARGIN_PX,
            feather_px: DEFAULT_FEATHER_PX,
            overlay_scale: DEFAULT_OVERLAY_SCALE,
            mask_strategy: MaskStrategy::default(),
        }
    }
}
