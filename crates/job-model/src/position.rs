//! Overlay placement on the background frame.

use serde::{Deserialize, Serialize};

/// Where the overlay is anchored on the background.
///
/// The wire form is camelCase (`bottomRight`); [`PositionKind::parse`] also
/// accepts snake_case, kebab-case and space separated names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PositionKind {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl PositionKind {
    /// Every placement, in a stable order.
    pub const ALL: [PositionKind; 5] = [
        PositionKind::TopLeft,
        PositionKind::TopRight,
        PositionKind::BottomLeft,
        PositionKind::BottomRight,
        PositionKind::Center,
    ];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            PositionKind::TopLeft => "topLeft",
            PositionKind::TopRight => "topRight",
            PositionKind::BottomLeft => "bottomLeft",
            PositionKind::BottomRight => "bottomRight",
            PositionKind::Center => "center",
        }
    }

    /// Parse a placement name, returning `None` for unknown values.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "topleft" => Some(PositionKind::TopLeft),
            "topright" => Some(PositionKind::TopRight),
            "bottomleft" => Some(PositionKind::BottomLeft),
            "bottomright" => Some(PositionKind::BottomRight),
            "center" | "centre" | "middle" => Some(PositionKind::Center),
            _ => None,
        }
    }

    /// Parse a placement name, falling back to `default` for unknown values.
    ///
    /// Returns the resolved kind and whether the fallback was taken.
    pub fn parse_or(raw: Option<&str>, default: PositionKind) -> (Self, bool) {
        match raw {
            None => (default, false),
            Some(value) if value.trim().is_empty() => (default, false),
            Some(value) => match Self::parse(value) {
                Some(kind) => (kind, false),
                None => (default, true),
            },
        }
    }

    /// Whether the overlay hugs the right edge.
    pub fn is_right(self) -> bool {
        matches!(self, PositionKind::TopRight | PositionKind::BottomRight)
    }

    /// Whether the overlay hugs the bottom edge.
    pub fn is_bottom(self) -> bool {
        matches!(self, PositionKind::BottomLeft | PositionKind::BottomRight)
    }
}

impl std::fmt::Display for PositionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
