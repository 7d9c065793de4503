//! Magnitude classification and region extraction.
//!
//! Both are pure functions: the tier drives marker styling, list badges and
//! terminal colors; the region label is only a grouping key for statistics.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Label used when an event has no usable place description.
pub const UNKNOWN_REGION: &str = "Unknown";

/// Trailing "of <region>" clause. The leading greedy `.*` makes the match
/// land on the last such clause.
static REGION_CLAUSE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^.*\bof\s+(\S.*)$").ok());

/// Severity tier derived from magnitude, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Moderate,
    High,
    Extreme,
}

impl Tier {
    /// Classify a magnitude. Thresholds are checked highest-first; a
    /// missing or NaN magnitude fails every threshold and lands in `Low`.
    #[must_use]
    pub fn of(mag: Option<f64>) -> Self {
        match mag {
            Some(m) if m >= 7.0 => Self::Extreme,
            Some(m) if m >= 6.0 => Self::High,
            Some(m) if m >= 5.0 => Self::Moderate,
            _ => Self::Low,
        }
    }

    /// Display color (CSS hex).
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Extreme => "#ef4444",
            Self::High => "#f97316",
            Self::Moderate => "#eab308",
            Self::Low => "#10b981",
        }
    }

    /// CSS animation class applied to map markers.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Extreme => "marker-pulse-extreme",
            Self::High => "marker-pulse-high",
            Self::Moderate => "marker-glow-med",
            Self::Low => "marker-glow-low",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extreme => "extreme",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// Extract a region label from a place description.
///
/// `"12 km SSW of Ridgecrest, CA"` becomes `"Ridgecrest, CA"`. Places
/// without an "of" clause are used whole; blank places become `"Unknown"`.
#[must_use]
pub fn region_of(place: Option<&str>) -> String {
    let place = match place.map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => return UNKNOWN_REGION.to_string(),
    };

    REGION_CLAUSE
        .as_ref()
        .and_then(|re| re.captures(place))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| place.to_string(), |m| m.as_str().trim().to_string())
}
