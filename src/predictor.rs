//! Pluggable strategy classifiers.
//!
//! A predictor maps [`SampleFeatures`] to one of six strategies. Correctness
//! never depends on the answer: the engine verifies every result.

use crate::config::Strategy;
use crate::error::{SortContext, SortResult};
use crate::features::SampleFeatures;
use serde::Deserialize;
use std::path::Path;

/// Categories a predictor may return, in model output order
pub const CATEGORIES: [Strategy; 6] = [
    Strategy::Adaptive,
    Strategy::BucketSort,
    Strategy::Hybrid,
    Strategy::Parallel,
    Strategy::RadixSort,
    Strategy::CompressionSort,
];

/// Above this size, PARALLEL becomes worthwhile on multi-core hosts
pub const PARALLEL_MIN_ITEMS: usize = 1_000_000;

pub trait StrategyPredictor: Send + Sync {
    fn classify(&self, features: &SampleFeatures) -> Strategy;

    fn name(&self) -> &'static str;
}

/// Anything outside [`CATEGORIES`] becomes ADAPTIVE
pub fn coerce(strategy: Strategy) -> Strategy {
    if CATEGORIES.contains(&strategy) {
        strategy
    } else {
        Strategy::Adaptive
    }
}

/// Distribution rules shared by the default predictor and the heuristic selector
pub fn distribution_rule(features: &SampleFeatures, cpus: usize) -> Option<Strategy> {
    if features.is_heavy_tailed() {
        Some(Strategy::BucketSort)
    } else if features.nearly_sorted {
        Some(Strategy::Adaptive)
    } else if features.n > PARALLEL_MIN_ITEMS && cpus > 2 {
        Some(Strategy::Parallel)
    } else if features.is_low_variance() {
        Some(Strategy::Hybrid)
    } else {
        None
    }
}

/// Default predictor: the distribution rules, ADAPTIVE otherwise
#[derive(Debug, Clone)]
pub struct RuleBasedPredictor {
    cpus: usize,
}

impl RuleBasedPredictor {
    pub fn new() -> Self {
        Self::with_cpus(num_cpus::get())
    }

    pub fn with_cpus(cpus: usize) -> Self {
        Self { cpus }
    }
}

impl Default for RuleBasedPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyPredictor for RuleBasedPredictor {
    fn classify(&self, features: &SampleFeatures) -> Strategy {
        distribution_rule(features, self.cpus).unwrap_or(Strategy::Adaptive)
    }

    fn name(&self) -> &'static str {
        "rule_based"
    }
}

/// Single-layer linear classifier loaded from a JSON artifact:
///
/// ```json
/// { "weights": [[..6..], ..6 rows..], "bias": [..6..], "scale": [..6..] }
/// ```
///
/// `scale` is optional and multiplies the features before the layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearPredictor {
    weights: [[f64; 6]; 6],
    bias: [f64; 6],
    #[serde(default)]
    scale: Option<[f64; 6]>,
}

impl LinearPredictor {
    pub fn new(weights: [[f64; 6]; 6], bias: [f64; 6]) -> Self {
        Self {
            weights,
            bias,
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: [f64; 6]) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn from_json_str(json: &str) -> SortResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> SortResult<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read predictor model {}", path.display()))?;
        let model = Self::from_json_str(&json)?;
        log::info!("loaded predictor model from {}", path.display());
        Ok(model)
    }

    /// Raw class scores in [`CATEGORIES`] order
    pub fn logits(&self, features: &SampleFeatures) -> [f64; 6] {
        let mut x = features.as_vector();
        if let Some(scale) = &self.scale {
            for (value, factor) in x.iter_mut().zip(scale) {
                *value *= factor;
            }
        }

        let mut out = self.bias;
        for (row, score) in self.weights.iter().zip(out.iter_mut()) {
            *score += row.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>();
        }
        out
    }
}

impl StrategyPredictor for LinearPredictor {
    fn classify(&self, features: &SampleFeatures) -> Strategy {
        let logits = self.logits(features);
        if logits.iter().any(|v| !v.is_finite()) {
            return Strategy::Adaptive;
        }
        logits
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or(Strategy::Adaptive, |(index, _)| CATEGORIES[index])
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
