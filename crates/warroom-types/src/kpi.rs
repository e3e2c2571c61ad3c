use serde::{Deserialize, Serialize};

use crate::status::{classify, StatusTier};

/// How a raw KPI value is mapped onto `[0, 1]` before classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalizer {
    /// The raw value already is a ratio.
    Ratio,
    /// Raw value expressed in percent.
    Percent,
    /// Linear interpolation between `min` (0.0) and `max` (1.0).
    Linear { min: f64, max: f64 },
}

impl Normalizer {
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Normalizer::Ratio => raw,
            Normalizer::Percent => raw / 100.0,
            Normalizer::Linear { min, max } => {
                let span = max - min;
                if span <= 0.0 || !span.is_finite() {
                    return f64::NAN;
                }
                ((raw - min) / span).clamp(0.0, 1.0)
            }
        }
    }
}

/// A single scalar business metric displayed as a labeled tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMetric {
    pub key: String,
    pub raw_value: f64,
    pub normalizer: Normalizer,
    pub label: String,
    pub unit: String,
    #[serde(default)]
    pub warning: Option<String>,
}

impl KpiMetric {
    pub fn new(
        key: impl Into<String>,
        raw_value: f64,
        normalizer: Normalizer,
        label: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            raw_value,
            normalizer,
            label: label.into(),
            unit: unit.into(),
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn normalized(&self) -> f64 {
        self.normalizer.apply(self.raw_value)
    }

    pub fn status(&self) -> StatusTier {
        classify(self.normalized())
    }
}
