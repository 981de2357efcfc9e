//! Engine configuration.
//!
//! Floats are quantized before hashing so `params_hash` is stable across
//! serializers and platforms.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_hash_hex, quantize};

/// Error type for configuration parsing and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The input is not valid JSON for this config.
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Parameters of a watershed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Look-ahead distance along the mainstem for vertex gradients, in map units.
    pub gradient_sample_distance: f64,
    /// Stream name that means "no name".
    pub unnamed_stream_label: String,
    /// Split streams at gradient break points and rebuild the network.
    pub split_at_gradient_breaks: bool,
    /// Lower bounds of gradient grade classes, ascending.
    pub grade_classes: Vec<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gradient_sample_distance: 100.0,
            unnamed_stream_label: "UNNAMED".to_string(),
            split_at_gradient_breaks: true,
            grade_classes: vec![0.0, 0.05, 0.07, 0.10, 0.12, 0.15, 0.20, 0.25, 0.30],
        }
    }
}

#[derive(Serialize)]
struct QuantizedEngineConfig<'a> {
    gradient_sample_distance: i64,
    unnamed_stream_label: &'a str,
    split_at_gradient_breaks: bool,
    grade_classes: Vec<i64>,
}

impl EngineConfig {
    /// Parse and validate a config from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gradient_sample_distance > 0.0) || !self.gradient_sample_distance.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "gradient_sample_distance",
                reason: format!("must be positive, got {}", self.gradient_sample_distance),
            });
        }
        if self.grade_classes.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(ConfigError::InvalidValue {
                field: "grade_classes",
                reason: "must be strictly ascending".to_string(),
            });
        }
        Ok(())
    }

    /// Deterministic hash of the parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&QuantizedEngineConfig {
            gradient_sample_distance: quantize(self.gradient_sample_distance),
            unnamed_stream_label: &self.unnamed_stream_label,
            split_at_gradient_breaks: self.split_at_gradient_breaks,
            grade_classes: self.grade_classes.iter().map(|g| quantize(*g)).collect(),
        })
    }

    /// Grade class of a gradient as a whole percent (e.g. `0.08` → `7`).
    ///
    /// Gradients below the first class fall into the first class.
    pub fn grade_class(&self, gradient: f64) -> Option<u32> {
        let first = *self.grade_classes.first()?;
        let lower = self
            .grade_classes
            .iter()
            .rev()
            .find(|c| gradient >= **c)
            .copied()
            .unwrap_or(first);
        Some((lower * 100.0).round() as u32)
    }
}
