//! Pipmerge Graph Core
//!
//! Plans the picture-in-picture composite:
//! - **Position Resolver:** symbolic overlay coordinates per placement
//! - **Circular Mask:** feathered alpha mask, as an engine expression or raster
//! - **Filter Graph Builder:** scale, mask, alpha-merge and overlay stages
//!
//! This crate is pure computation. It spawns no processes and does no network I/O.
//! All inputs are data; all outputs are data.

pub mod graph;
pub mod mask;
pub mod position;

pub use graph::{
    CompositeParams, FilterStage, FrameDims, GraphBuilder, GraphPlan, MaskSource, Pin, PlanInput,
    ScaleSpec,
};
pub use mask::{alpha_at, luma_expression, AlphaMask};
pub use position::{resolve, Placement};
