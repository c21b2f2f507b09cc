use pipmerge_graph::{alpha_at, resolve, AlphaMask, CompositeParams, FrameDims, GraphBuilder};
use pipmerge_job_model::{MaskStrategy, PositionKind};
use proptest::prelude::*;

fn position_strategy() -> impl Strategy<Value = PositionKind> {
    prop::sample::select(PositionKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn resolve_is_total(kind in position_strategy(), margin in 0u32..500) {
        let placement = resolve(kind, margin);
        prop_assert!(!placement.x.is_empty());
        prop_assert!(!placement.y.is_empty());
    }

    #[test]
    fn centre_pixel_is_opaque(half in 1u32..80, feather_seed in 0u32..1000) {
        let size = half * 2 + 1;
        let feather = feather_seed % (size / 2 + 1);
        prop_assume!(size >= 2 * feather);

        let mask = AlphaMask::generate(size, feather).unwrap();
        prop_assert_eq!(mask.alpha(size / 2, size / 2), 255);
        prop_assert_eq!(alpha_at(0.0, size as f64 / 2.0, feather as f64), 255);
    }

    #[test]
    fn outside_radius_is_transparent(size in 2u32..160, feather_seed in 0u32..1000) {
        let feather = feather_seed % (size / 2 + 1);
        let mask = AlphaMask::generate(size, feather).unwrap();
        let radius = size as f64 / 2.0;

        for y in 0..size {
            for x in 0..size {
                let dx = x as f64 + 0.5 - radius;
                let dy = y as f64 + 0.5 - radius;
                if dx.hypot(dy) > radius {
                    prop_assert_eq!(mask.alpha(x, y), 0);
                }
            }
        }
    }

    #[test]
    fn alpha_never_increases_with_distance(
        radius in 1.0f64..500.0,
        feather_ratio in 0.0f64..1.0,
        a in 0.0f64..1.2,
        b in 0.0f64..1.2,
    ) {
        let feather = radius * feather_ratio;
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(alpha_at(near * radius, radius, feather) >= alpha_at(far * radius, radius, feather));
    }

    #[test]
    fn procedural_plans_validate_for_any_scale(
        scale in 0.001f64..=1.0,
        kind in position_strategy(),
        feather in 0u32..64,
    ) {
        let plan = GraphBuilder::new(40, MaskStrategy::Procedural)
            .build_params(CompositeParams { overlay_scale: scale, position: kind, feather_px: feather }, None)
            .unwrap();
        prop_assert!(plan.validate().is_ok());
    }

    #[test]
    fn raster_mask_matches_scaled_overlay(
        width in 16u32..2000,
        height in 16u32..2000,
        scale in 0.05f64..=1.0,
    ) {
        let plan = GraphBuilder::new(20, MaskStrategy::Raster)
            .build_params(
                CompositeParams { overlay_scale: scale, position: PositionKind::BottomLeft, feather_px: 10 },
                Some(FrameDims::new(width, height)),
            )
            .unwrap();
        let mask = plan.raster_mask.as_ref().unwrap();
        prop_assert_eq!(mask.dims(), FrameDims::new(width, height).scaled(scale));
    }
}

#[test]
fn feather_band_ramps_down_monotonically() {
    let mask = AlphaMask::generate(201, 30).unwrap();
    let row = 100;
    let mut previous = 255u8;
    for x in 100..201 {
        let alpha = mask.alpha(x, row);
        assert!(alpha <= previous, "alpha rose at x={x}");
        previous = alpha;
    }
    assert!(mask.alpha(200, row) < 10);
}
