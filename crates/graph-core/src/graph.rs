//! Filter graph planning.
//!
//! A [`GraphPlan`] is an ordered list of filter stages joined by named pins.
//! It is plain data until the executor renders it with
//! [`GraphPlan::to_filter_complex`] and hands it to the engine.
//!
//! ```text
//! [1:v] ── scale ──┬── split ── ov_color ───────────┐
//!                  │                                ├── alphamerge ── ov_masked ──┐
//!                  └────────── ov_shape ── mask ────┘                             ├── overlay ── vout
//! [0:v] ──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! With the raster strategy the mask comes from a third input instead of the
//! split branch.

use std::collections::HashSet;

use pipmerge_common::error::{PipmergeError, PipmergeResult};
use pipmerge_job_model::{validate_overlay_scale, Job, MaskStrategy, PositionKind};
use serde::Serialize;

use crate::mask::{luma_expression, AlphaMask};
use crate::position::{resolve, Placement};

/// Pixel dimensions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size after scaling the width by `factor`, preserving aspect ratio.
    ///
    /// Both sides are rounded down to even values, minimum 2.
    pub fn scaled(self, factor: f64) -> FrameDims {
        let width = even_floor(self.width as f64 * factor);
        let height = even_floor(width as f64 * self.height as f64 / self.width.max(1) as f64);
        FrameDims::new(width, height)
    }
}

fn even_floor(value: f64) -> u32 {
    let even = ((value / 2.0).floor() * 2.0) as u32;
    even.max(2)
}

/// Engine inputs, in command-line order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanInput {
    Background,
    Overlay,
    Mask,
}

impl PlanInput {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanInput::Background => "background",
            PlanInput::Overlay => "overlay",
            PlanInput::Mask => "mask",
        }
    }
}

/// A stream endpoint inside the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pin {
    /// Video stream of the engine input at this index.
    Input(usize),
    /// Intermediate or output label.
    Label(String),
}

impl Pin {
    pub fn label(name: &str) -> Self {
        Pin::Label(name.to_string())
    }

    fn render(&self) -> String {
        match self {
            Pin::Input(index) => format!("[{index}:v]"),
            Pin::Label(name) => format!("[{name}]"),
        }
    }
}

/// Overlay resize rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSpec {
    /// Width relative to the input width, height following the aspect ratio.
    Relative { factor: f64 },
    /// Exact output size, used when the mask is pre-rendered.
    Fixed { width: u32, height: u32 },
}

/// Where the mask stage gets its alpha from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskSource {
    /// Evaluated by the engine over the incoming plane.
    Procedural { feather_px: u32 },
    /// Pre-rendered grayscale image of exactly this size.
    Raster { width: u32, height: u32 },
}

/// One filter stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FilterStage {
    Scale {
        input: Pin,
        output: Pin,
        spec: ScaleSpec,
    },
    Split {
        input: Pin,
        outputs: [Pin; 2],
    },
    MaskGenerate {
        input: Pin,
        output: Pin,
        source: MaskSource,
    },
    AlphaMerge {
        main: Pin,
        mask: Pin,
        output: Pin,
    },
    Overlay {
        base: Pin,
        top: Pin,
        output: Pin,
        placement: Placement,
    },
}

impl FilterStage {
    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::Scale { .. } => "scale",
            FilterStage::Split { .. } => "split",
            FilterStage::MaskGenerate { .. } => "mask",
            FilterStage::AlphaMerge { .. } => "alphamerge",
            FilterStage::Overlay { .. } => "overlay",
        }
    }

    fn inputs(&self) -> Vec<&Pin> {
        match self {
            FilterStage::Scale { input, .. }
            | FilterStage::Split { input, .. }
            | FilterStage::MaskGenerate { input, .. } => vec![input],
            FilterStage::AlphaMerge { main, mask, .. } => vec![main, mask],
            FilterStage::Overlay { base, top, .. } => vec![base, top],
        }
    }

    fn outputs(&self) -> Vec<&Pin> {
        match self {
            FilterStage::Split { outputs, .. } => outputs.iter().collect(),
            FilterStage::Scale { output, .. }
            | FilterStage::MaskGenerate { output, .. }
            | FilterStage::AlphaMerge { output, .. }
            | FilterStage::Overlay { output, .. } => vec![output],
        }
    }

    fn render(&self) -> String {
        let ins: String = self.inputs().iter().map(|pin| pin.render()).collect();
        let outs: String = self.outputs().iter().map(|pin| pin.render()).collect();

        let body = match self {
            FilterStage::Scale { spec, .. } => match spec {
                ScaleSpec::Relative { factor } => format!(
                    "scale=w='max(2,trunc(iw*{factor}/2)*2)':h=-2:flags=lanczos,format=rgba"
                ),
                ScaleSpec::Fixed { width, height } => {
                    format!("scale=w={width}:h={height}:flags=lanczos,format=rgba")
                }
            },
            FilterStage::Split { .. } => "split=2".to_string(),
            FilterStage::MaskGenerate { source, .. } => match source {
                MaskSource::Procedural { feather_px } => {
                    format!("format=gray,geq=lum='{}'", luma_expression(*feather_px))
                }
                MaskSource::Raster { .. } => "format=gray".to_string(),
            },
            FilterStage::AlphaMerge { .. } => "alphamerge".to_string(),
            FilterStage::Overlay { placement, .. } => format!(
                "overlay=x='{}':y='{}':format=auto,format=yuv420p",
                placement.x, placement.y
            ),
        };

        format!("{ins}{body}{outs}")
    }
}

/// Complete, validated description of one composite.
#[derive(Debug, Clone, Serialize)]
pub struct GraphPlan {
    /// Engine inputs in command-line order; index `i` is `[i:v]`.
    pub inputs: Vec<PlanInput>,

    /// Stages in evaluation order.
    pub stages: Vec<FilterStage>,

    /// Final video pin.
    pub output: Pin,

    /// Pre-rendered mask for the raster strategy.
    #[serde(skip)]
    pub raster_mask: Option<AlphaMask>,
}

impl GraphPlan {
    /// Render to the engine's `-filter_complex` syntax.
    pub fn to_filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(FilterStage::render)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Engine input index for `input`, if the plan uses it.
    pub fn input_index(&self, input: PlanInput) -> Option<usize> {
        self.inputs.iter().position(|candidate| *candidate == input)
    }

    /// Check pin wiring: every label is produced once before it is consumed,
    /// consumed at most once, every input index exists, and the output pin is
    /// produced and left unconsumed.
    pub fn validate(&self) -> PipmergeResult<()> {
        let mut available: HashSet<&Pin> = HashSet::new();
        let mut produced: HashSet<&Pin> = HashSet::new();

        for stage in &self.stages {
            for pin in stage.inputs() {
                match pin {
                    Pin::Input(index) if *index >= self.inputs.len() => {
                        return Err(PipmergeError::graph_construction(format!(
                            "{} stage reads missing input {index}",
                            stage.name()
                        )));
                    }
                    Pin::Input(_) => {}
                    Pin::Label(name) => {
                        if !available.remove(pin) {
                            return Err(PipmergeError::graph_construction(format!(
                                "{} stage reads `{name}` before it is produced or after it was consumed",
                                stage.name()
                            )));
                        }
                    }
                }
            }

            for pin in stage.outputs() {
                if let Pin::Input(_) = pin {
                    return Err(PipmergeError::graph_construction(format!(
                        "{} stage writes to an input pin",
                        stage.name()
                    )));
                }
                if !produced.insert(pin) {
                    return Err(PipmergeError::graph_construction(format!(
                        "{} stage produces a duplicate pin",
                        stage.name()
                    )));
                }
                available.insert(pin);
            }
        }

        if !available.contains(&self.output) {
            return Err(PipmergeError::graph_construction(
                "plan output pin is never produced",
            ));
        }
        if available.len() != 1 {
            return Err(PipmergeError::graph_construction(
                "plan leaves intermediate pins unconsumed",
            ));
        }

        Ok(())
    }
}

/// Compositing parameters that shape a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    pub overlay_scale: f64,
    pub position: PositionKind,
    pub feather_px: u32,
}

impl From<&Job> for CompositeParams {
    fn from(job: &Job) -> Self {
        Self {
            overlay_scale: job.overlay_scale(),
            position: job.position(),
            feather_px: job.feather_px(),
        }
    }
}

/// Builds [`GraphPlan`]s for one deployment's margin and mask strategy.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    margin_px: u32,
    strategy: MaskStrategy,
}

impl GraphBuilder {
    pub fn new(margin_px: u32, strategy: MaskStrategy) -> Self {
        Self {
            margin_px,
            strategy,
        }
    }

    pub fn strategy(&self) -> MaskStrategy {
        self.strategy
    }

    /// Whether [`GraphBuilder::build`] needs the overlay's frame size.
    pub fn needs_overlay_dims(&self) -> bool {
        self.strategy == MaskStrategy::Raster
    }

    /// Plan the composite for `job`.
    ///
    /// `overlay_dims` is the overlay source's frame size as reported by the
    /// engine. The procedural plan is fully symbolic and ignores it; the
    /// raster plan needs it to size the mask.
    pub fn build(&self, job: &Job, overlay_dims: Option<FrameDims>) -> PipmergeResult<GraphPlan> {
        self.build_params(CompositeParams::from(job), overlay_dims)
    }

    pub fn build_params(
        &self,
        params: CompositeParams,
        overlay_dims: Option<FrameDims>,
    ) -> PipmergeResult<GraphPlan> {
        validate_overlay_scale(params.overlay_scale)
            .map_err(|e| PipmergeError::graph_construction(e.to_string()))?;

        let placement = resolve(params.position, self.margin_px);
        let scaled = Pin::label("ov_scaled");
        let color = Pin::label("ov_color");
        let shape = Pin::label("ov_shape");
        let mask = Pin::label("ov_mask");
        let masked = Pin::label("ov_masked");
        let output = Pin::label("vout");

        let plan = match self.strategy {
            MaskStrategy::Procedural => GraphPlan {
                inputs: vec![PlanInput::Background, PlanInput::Overlay],
                stages: vec![
                    FilterStage::Scale {
                        input: Pin::Input(1),
                        output: scaled.clone(),
                        spec: ScaleSpec::Relative {
                            factor: params.overlay_scale,
                        },
                    },
                    FilterStage::Split {
                        input: scaled,
                        outputs: [color.clone(), shape.clone()],
                    },
                    FilterStage::MaskGenerate {
                        input: shape,
                        output: mask.clone(),
                        source: MaskSource::Procedural {
                            feather_px: params.feather_px,
                        },
                    },
                    FilterStage::AlphaMerge {
                        main: color,
                        mask,
                        output: masked.clone(),
                    },
                    FilterStage::Overlay {
                        base: Pin::Input(0),
                        top: masked,
                        output: output.clone(),
                        placement,
                    },
                ],
                output,
                raster_mask: None,
            },
            MaskStrategy::Raster => {
                let source = overlay_dims.ok_or_else(|| {
                    PipmergeError::graph_construction(
                        "raster mask strategy requires the overlay frame size",
                    )
                })?;
                if source.width == 0 || source.height == 0 {
                    return Err(PipmergeError::graph_construction(format!(
                        "overlay reports empty frame {}x{}",
                        source.width, source.height
                    )));
                }
                let target = source.scaled(params.overlay_scale);
                let raster = AlphaMask::generate_for(target, params.feather_px)?;
                raster.ensure_dims(target)?;

                GraphPlan {
                    inputs: vec![PlanInput::Background, PlanInput::Overlay, PlanInput::Mask],
                    stages: vec![
                        FilterStage::Scale {
                            input: Pin::Input(1),
                            output: scaled.clone(),
                            spec: ScaleSpec::Fixed {
                                width: target.width,
                                height: target.height,
                            },
                        },
                        FilterStage::MaskGenerate {
                            input: Pin::Input(2),
                            output: mask.clone(),
                            source: MaskSource::Raster {
                                width: target.width,
                                height: target.height,
                            },
                        },
                        FilterStage::AlphaMerge {
                            main: scaled,
                            mask,
                            output: masked.clone(),
                        },
                        FilterStage::Overlay {
                            base: Pin::Input(0),
                            top: masked,
                            output: output.clone(),
                            placement,
                        },
                    ],
                    output,
                    raster_mask: Some(raster),
                }
            }
        };

        plan.validate()?;

        tracing::debug!(
            strategy = self.strategy.as_str(),
            position = %params.position,
            scale = params.overlay_scale,
            feather_px = params.feather_px,
            stages = plan.stages.len(),
            "Filter graph planned"
        );

        Ok(plan)
    }
}
