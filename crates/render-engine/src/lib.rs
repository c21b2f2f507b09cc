//! Pipmerge Render Engine
//!
//! Batch compositing pipeline that downloads a background and an overlay
//! clip, masks the overlay with a feathered circle, places it
//! picture-in-picture and delivers the encoded result.
//!
//! # Pipeline Architecture
//!
//! ```text
//! background.mp4 ─────────────────────────────────────┐
//!                                                     ├── Overlay (position)
//! overlay.mp4 ── Scale ──┬── Split ───────────────┐   │        │
//!                        └── Mask (procedural     ├───┘        ▼
//!                             or mask.png) ── AlphaMerge   Encode (H.264)
//!                                                              │
//!                                                              ▼
//!                                                   inline bytes / blob sink
//! ```

pub mod acquire;
pub mod delivery;
pub mod executor;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod response;
pub mod workspace;

pub use acquire::{AssetFetcher, AssetPaths};
pub use delivery::{sink_from_config, BlobSink, Delivered, Delivery, DirectorySink, HttpPutSink};
pub use executor::{build_args, engine_diagnostics, AudioPlan, CompositionExecutor, Invocation};
pub use pipeline::Pipeline;
pub use probe::{parse_probe_output, MediaInfo, MediaProbe};
pub use progress::{JobProgress, JobStage, ProgressCallback};
pub use response::JobResponse;
pub use workspace::{Artifact, Workspace};
