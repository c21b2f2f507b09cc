//! Position resolver: symbolic overlay coordinates.
//!
//! Coordinates are expressions in the engine's overlay variables
//! (`W`/`H` for the background frame, `w`/`h` for the overlay), so a single
//! plan works for any source resolution.

use pipmerge_job_model::PositionKind;
use serde::Serialize;

use crate::graph::FrameDims;

/// Resolved placement of the overlay's top-left corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub kind: PositionKind,
    pub margin_px: u32,
    /// Horizontal origin expression.
    pub x: String,
    /// Vertical origin expression.
    pub y: String,
}

/// Map a placement kind to origin expressions, inset by `margin_px`.
pub fn resolve(kind: PositionKind, margin_px: u32) -> Placement {
    let m = margin_px;
    let (x, y) = match kind {
        PositionKind::TopLeft => (format!("{m}"), format!("{m}")),
        PositionKind::TopRight => (format!("W-w-{m}"), format!("{m}")),
        PositionKind::BottomLeft => (format!("{m}"), format!("H-h-{m}")),
        PositionKind::BottomRight => (format!("W-w-{m}"), format!("H-h-{m}")),
        PositionKind::Center => ("(W-w)/2".to_string(), "(H-h)/2".to_string()),
    };

    Placement {
        kind,
        margin_px,
        x,
        y,
    }
}

impl Placement {
    /// Concrete origin for known frame sizes, mirroring what the engine
    /// computes from [`Placement::x`] and [`Placement::y`].
    pub fn origin(&self, background: FrameDims, overlay: FrameDims) -> (i64, i64) {
        let m = self.margin_px as i64;
        let (bw, bh) = (background.width as i64, background.height as i64);
        let (ow, oh) = (overlay.width as i64, overlay.height as i64);

        match self.kind {
            PositionKind::TopLeft => (m, m),
            PositionKind::TopRight => (bw - ow - m, m),
            PositionKind::BottomLeft => (m, bh - oh - m),
            PositionKind::BottomRight => (bw - ow - m, bh - oh - m),
            PositionKind::Center => ((bw - ow) / 2, (bh - oh) / 2),
        }
    }

    /// Whether the overlay lands fully inside the background.
    pub fn fits(&self, background: FrameDims, overlay: FrameDims) -> bool {
        let (x, y) = self.origin(background, overlay);
        x >= 0
            && y >= 0
            && x + overlay.width as i64 <= background.width as i64
            && y + overlay.height as i64 <= background.height as i64
    }
}
