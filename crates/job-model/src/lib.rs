//! Pipmerge Job Model
//!
//! Defines the data that flows into the compositing pipeline:
//! - **Job requests** as they arrive on the wire, and validated jobs
//! - **Placement** of the overlay on the background
//! - **Deployment settings** for mask strategy and delivery mode
//!
//! Pure data with validation; no I/O.

pub mod job;
pub mod position;
pub mod settings;

pub use job::{validate_overlay_scale, Job, JobError, JobId, JobRequest};
pub use position::PositionKind;
pub use settings::{
    CompositeDefaults, DeliveryMode, MaskStrategy, DEFAULT_FEATHER_PX, DEFAULT_MARGIN_PX,
    DEFAULT_OVERLAY_SCALE,
};
