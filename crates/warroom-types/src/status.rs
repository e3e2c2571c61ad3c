use serde::{Deserialize, Serialize};

/// Inclusive lower bound of the healthy tier.
pub const HEALTHY_THRESHOLD: f64 = 0.72;
/// Inclusive lower bound of the warning tier.
pub const WARNING_THRESHOLD: f64 = 0.45;

/// Display tier derived from a normalized KPI score. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTier {
    Healthy,
    Warning,
    Risk,
    /// The score was not a number.
    Unknown,
}

impl StatusTier {
    pub fn label(self) -> &'static str {
        match self {
            StatusTier::Healthy => "healthy",
            StatusTier::Warning => "warning",
            StatusTier::Risk => "risk",
            StatusTier::Unknown => "unknown",
        }
    }
}

/// Map a score in `[0, 1]` to its tier. Out-of-range values are clamped.
pub fn classify(score: f64) -> StatusTier {
    if score.is_nan() {
        return StatusTier::Unknown;
    }
    let score = score.clamp(0.0, 1.0);
    if score >= HEALTHY_THRESHOLD {
        StatusTier::Healthy
    } else if score >= WARNING_THRESHOLD {
        StatusTier::Warning
    } else {
        StatusTier::Risk
    }
}
