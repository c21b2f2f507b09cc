//! Circular alpha mask with a feathered edge.
//!
//! For a pixel at distance `d` from the mask centre, with `r` the circle
//! radius and `f` the feather width:
//!
//! ```text
//! d <= r - f       -> 255
//! r - f < d <= r   -> linear ramp 255 -> 0
//! d > r            -> 0
//! ```
//!
//! The same curve is available as an engine expression
//! ([`luma_expression`]) for the procedural strategy and as a rendered
//! grayscale image ([`AlphaMask`]) for the raster strategy.

use pipmerge_common::error::{PipmergeError, PipmergeResult};

use crate::graph::FrameDims;

/// 8-bit alpha field, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Alpha for a point `distance` away from the centre of a circle.
///
/// A feather wider than the radius is clamped to the radius, so the centre
/// always stays fully opaque.
pub fn alpha_at(distance: f64, radius: f64, feather: f64) -> u8 {
    if distance > radius {
        return 0;
    }

    let feather = feather.clamp(0.0, radius.max(0.0));
    if feather <= 0.0 || distance <= radius - feather {
        return 255;
    }

    let ramp = (radius - distance) / feather;
    (ramp * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Engine luma expression producing the same curve over a `W`x`H` plane.
///
/// Pixel centres are sampled (`X+0.5`), matching [`AlphaMask::generate`].
pub fn luma_expression(feather_px: u32) -> String {
    let distance = "hypot(X+0.5-W/2,Y+0.5-H/2)";
    let radius = "min(W,H)/2";
    if feather_px == 0 {
        format!("if(lte({distance},{radius}),255,0)")
    } else {
        // Same clamp as alpha_at: the feather never exceeds the radius.
        format!("clip(255*({radius}-{distance})/min({feather_px},{radius}),0,255)")
    }
}

impl AlphaMask {
    /// Square mask of side `size_px`, radius `size_px / 2`.
    pub fn generate(size_px: u32, feather_px: u32) -> PipmergeResult<Self> {
        if size_px == 0 {
            return Err(PipmergeError::graph_construction(
                "mask size must be at least one pixel",
            ));
        }

        let radius = size_px as f64 / 2.0;
        let centre = size_px as f64 / 2.0;
        let feather = feather_px as f64;

        let mut data = Vec::with_capacity((size_px as usize) * (size_px as usize));
        for y in 0..size_px {
            let dy = y as f64 + 0.5 - centre;
            for x in 0..size_px {
                let dx = x as f64 + 0.5 - centre;
                data.push(alpha_at(dx.hypot(dy), radius, feather));
            }
        }

        Ok(Self {
            width: size_px,
            height: size_px,
            data,
        })
    }

    /// Mask for an overlay of the given size: a circle of diameter
    /// `min(width, height)` centred on a transparent canvas.
    pub fn generate_for(dims: FrameDims, feather_px: u32) -> PipmergeResult<Self> {
        let side = dims.width.min(dims.height);
        Self::generate(side, feather_px)?.fit(dims.width, dims.height)
    }

    /// Place this mask at the centre of a larger transparent canvas.
    ///
    /// The alpha ramp is never stretched; a canvas smaller than the mask is
    /// an error.
    pub fn fit(&self, width: u32, height: u32) -> PipmergeResult<Self> {
        if width < self.width || height < self.height {
            return Err(PipmergeError::graph_construction(format!(
                "cannot fit {}x{} mask into {}x{} canvas",
                self.width, self.height, width, height
            )));
        }
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }

        let off_x = ((width - self.width) / 2) as usize;
        let off_y = ((height - self.height) / 2) as usize;
        let mut data = vec![0u8; (width as usize) * (height as usize)];
        for row in 0..self.height as usize {
            let src = row * self.width as usize;
            let dst = (row + off_y) * width as usize + off_x;
            data[dst..dst + self.width as usize]
                .copy_from_slice(&self.data[src..src + self.width as usize]);
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dims(&self) -> FrameDims {
        FrameDims::new(self.width, self.height)
    }

    /// Alpha at pixel `(x, y)`; out-of-range pixels are transparent.
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Fail unless the mask matches `expected` exactly.
    pub fn ensure_dims(&self, expected: FrameDims) -> PipmergeResult<()> {
        if self.dims() != expected {
            return Err(PipmergeError::graph_construction(format!(
                "mask is {}x{} but scaled overlay is {}x{}",
                self.width, self.height, expected.width, expected.height
            )));
        }
        Ok(())
    }

    /// Encode as an 8-bit grayscale PNG.
    pub fn to_png(&self) -> PipmergeResult<Vec<u8>> {
        let image = image::GrayImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| PipmergeError::graph_construction("mask buffer size mismatch"))?;

        let mut cursor = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| PipmergeError::graph_construction(format!("failed to encode mask: {e}")))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_regions() {
        assert_eq!(alpha_at(0.0, 50.0, 10.0), 255);
        assert_eq!(alpha_at(40.0, 50.0, 10.0), 255);
        assert_eq!(alpha_at(45.0, 50.0, 10.0), 128);
        assert_eq!(alpha_at(50.0, 50.0, 10.0), 0);
        assert_eq!(alpha_at(50.1, 50.0, 10.0), 0);
    }

    #[test]
    fn test_zero_feather_is_hard_edged() {
        assert_eq!(alpha_at(49.9, 50.0, 0.0), 255);
        assert_eq!(alpha_at(50.0, 50.0, 0.0), 255);
        assert_eq!(alpha_at(50.01, 50.0, 0.0), 0);
    }

    #[test]
    fn test_generate_corners_are_transparent() {
        let mask = AlphaMask::generate(101, 8).unwrap();
        assert_eq!(mask.alpha(50, 50), 255);
        assert_eq!(mask.alpha(0, 0), 0);
        assert_eq!(mask.alpha(100, 0), 0);
        assert_eq!(mask.alpha(0, 100), 0);
        assert_eq!(mask.alpha(100, 100), 0);
    }

    #[test]
    fn test_fit_centres_without_stretching() {
        let square = AlphaMask::generate(64, 6).unwrap();
        let fitted = square.fit(96, 64).unwrap();
        assert_eq!(fitted.dims(), FrameDims::new(96, 64));
        // Left and right padding columns are fully transparent.
        for y in 0..64 {
            assert_eq!(fitted.alpha(0, y), 0);
            assert_eq!(fitted.alpha(95, y), 0);
        }
        for y in 0..64 {
            for x in 0..64 {
                assert_eq!(fitted.alpha(x + 16, y), square.alpha(x, y));
            }
        }
    }

    #[test]
    fn test_fit_into_smaller_canvas_fails() {
        let square = AlphaMask::generate(64, 6).unwrap();
        assert!(square.fit(32, 64).is_err());
    }

    #[test]
    fn test_ensure_dims_rejects_mismatch() {
        let mask = AlphaMask::generate_for(FrameDims::new(320, 180), 10).unwrap();
        assert!(mask.ensure_dims(FrameDims::new(320, 180)).is_ok());
        assert!(mask.ensure_dims(FrameDims::new(322, 180)).is_err());
    }

    #[test]
    fn test_png_roundtrip_preserves_alpha() {
        let mask = AlphaMask::generate_for(FrameDims::new(40, 30), 4).unwrap();
        let png = mask.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (40, 30));
        assert_eq!(decoded.as_raw().as_slice(), mask.as_bytes());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(AlphaMask::generate(0, 0).is_err());
    }

    #[test]
    fn test_luma_expression_shapes() {
        assert_eq!(
            luma_expression(0),
            "if(lte(hypot(X+0.5-W/2,Y+0.5-H/2),min(W,H)/2),255,0)"
        );
        let soft = luma_expression(15);
        assert!(soft.starts_with("clip(255*(min(W,H)/2-hypot("));
        assert!(soft.contains("min(15,min(W,H)/2)"));
    }
}
