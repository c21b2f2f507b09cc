//! Job requests and validated jobs.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::position::PositionKind;
use crate::settings::CompositeDefaults;

/// Unique identity of a job. Workspaces and uploaded objects are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A job submission as it arrives on the wire.
///
/// Every field is optional here so that missing required fields are reported
/// as validation errors rather than parse failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub background_url: Option<String>,
    pub overlay_url: Option<String>,
    #[serde(alias = "overlayScale")]
    pub overlay_width: Option<f64>,
    pub position: Option<String>,
    pub feather_radius: Option<u32>,
}

impl JobRequest {
    /// Parse a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, JobError> {
        serde_json::from_slice(body).map_err(|e| JobError::Malformed {
            message: e.to_string(),
        })
    }
}

/// A validated, immutable compositing job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: JobId,
    background: Url,
    overlay: Url,
    overlay_scale: f64,
    position: PositionKind,
    feather_px: u32,
    position_defaulted: bool,
}

impl Job {
    /// Build a job from already-parsed parts.
    pub fn new(
        background: Url,
        overlay: Url,
        overlay_scale: f64,
        position: PositionKind,
        feather_px: u32,
    ) -> Result<Self, JobError> {
        check_scheme("backgroundUrl", &background)?;
        check_scheme("overlayUrl", &overlay)?;
        validate_overlay_scale(overlay_scale)?;

        Ok(Self {
            id: JobId::new(),
            background,
            overlay,
            overlay_scale,
            position,
            feather_px,
            position_defaulted: false,
        })
    }

    /// Validate a wire request, filling omitted fields from `defaults`.
    pub fn from_request(request: &JobRequest, defaults: &CompositeDefaults) -> Result<Self, JobError> {
        let background = parse_source("backgroundUrl", request.background_url.as_deref())?;
        let overlay = parse_source("overlayUrl", request.overlay_url.as_deref())?;
        let overlay_scale = request.overlay_width.unwrap_or(defaults.overlay_scale);
        let (position, position_defaulted) =
            PositionKind::parse_or(request.position.as_deref(), defaults.default_position);
        let feather_px = request.feather_radius.unwrap_or(defaults.feather_px);

        let mut job = Self::new(background, overlay, overlay_scale, position, feather_px)?;
        job.position_defaulted = position_defaulted;
        Ok(job)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn background(&self) -> &Url {
        &self.background
    }

    pub fn overlay(&self) -> &Url {
        &self.overlay
    }

    pub fn overlay_scale(&self) -> f64 {
        self.overlay_scale
    }

    pub fn position(&self) -> PositionKind {
        self.position
    }

    pub fn feather_px(&self) -> u32 {
        self.feather_px
    }

    /// True when the request named a placement that was not recognised.
    pub fn position_defaulted(&self) -> bool {
        self.position_defaulted
    }
}

/// Check that an overlay scale lies in `(0, 1]`.
pub fn validate_overlay_scale(scale: f64) -> Result<(), JobError> {
    if scale.is_finite() && scale > 0.0 && scale <= 1.0 {
        Ok(())
    } else {
        Err(JobError::InvalidScale { value: scale })
    }
}

fn parse_source(field: &'static str, raw: Option<&str>) -> Result<Url, JobError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(JobError::MissingField { field })?;

    let url = Url::parse(raw).map_err(|e| JobError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    check_scheme(field, &url)?;
    Ok(url)
}

fn check_scheme(field: &'static str, url: &Url) -> Result<(), JobError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(JobError::UnsupportedScheme {
            field,
            scheme: other.to_string(),
        }),
    }
}

/// Reasons a job request is rejected before any work starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("Missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("Invalid URL in `{field}`: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("Unsupported URL scheme `{scheme}` in `{field}` (expected http or https)")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error("overlayWidth must be in (0, 1], got {value}")]
    InvalidScale { value: f64 },

    #[error("Malformed request body: {message}")]
    Malformed { message: String },
}
