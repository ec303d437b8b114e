//! AUTO strategy selection
//!
//! Rules are evaluated in order and the first match wins:
//! 1. oversize input goes to EXTERNAL_SORT;
//! 2. an enabled predictor classifies the sampled features;
//! 3. otherwise the memory estimate, then the distribution rules, decide.

use crate::config::{SortConfig, Strategy};
use crate::error::SortResult;
use crate::features::{self, SampleFeatures};
use crate::predictor::{self, LinearPredictor, RuleBasedPredictor, StrategyPredictor};
use crate::system;

/// Fraction of available memory the in-memory paths may claim
const MEMORY_HEADROOM: f64 = 0.7;

/// Copies held at once by the in-memory paths (input, output, scratch)
const MEMORY_COPIES: u64 = 3;

pub struct StrategySelector {
    external_threshold: usize,
    predictor: Option<Box<dyn StrategyPredictor>>,
    seed: Option<u64>,
    available_memory: u64,
    cpus: usize,
}

impl StrategySelector {
    pub fn new(external_threshold: usize) -> Self {
        Self {
            external_threshold,
            predictor: None,
            seed: None,
            available_memory: system::available_memory_bytes(),
            cpus: system::cpu_count(),
        }
    }

    /// Selector for `config`, loading the predictor artifact when one is named
    pub fn from_config(config: &SortConfig) -> SortResult<Self> {
        let mut selector = Self::new(config.external_sort_threshold).with_seed(config.seed);

        if config.use_learned_predictor {
            let predictor: Box<dyn StrategyPredictor> = match &config.predictor_model {
                Some(path) => Box::new(LinearPredictor::from_path(path)?),
                None => Box::new(RuleBasedPredictor::new()),
            };
            selector = selector.with_predictor(predictor);
        }

        Ok(selector)
    }

    pub fn with_predictor(mut self, predictor: Box<dyn StrategyPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Override the probed host resources
    pub fn with_resources(mut self, available_memory: u64, cpus: usize) -> Self {
        self.available_memory = available_memory;
        self.cpus = cpus;
        self
    }

    pub fn predictor_name(&self) -> Option<&'static str> {
        self.predictor.as_ref().map(|p| p.name())
    }

    pub fn select(&self, data: &[f64]) -> Strategy {
        let n = data.len();
        if n > self.external_threshold {
            return Strategy::ExternalSort;
        }

        let mut rng = features::sampling_rng(self.seed);
        let features = SampleFeatures::extract(data, &mut rng);
        log::debug!("sample features: {features:?}");

        if let Some(predictor) = &self.predictor {
            let predicted = predictor::coerce(predictor.classify(&features));
            log::debug!("{} predictor chose {}", predictor.name(), predicted);
            return predicted;
        }

        self.heuristic(&features)
    }

    fn heuristic(&self, features: &SampleFeatures) -> Strategy {
        let footprint = (features.n as u64)
            .saturating_mul(std::mem::size_of::<f64>() as u64)
            .saturating_mul(MEMORY_COPIES);
        if footprint as f64 > self.available_memory as f64 * MEMORY_HEADROOM {
            return Strategy::MemoryEfficient;
        }

        if let Some(strategy) = predictor::distribution_rule(features, self.cpus) {
            return strategy;
        }

        if features.n > self.external_threshold {
            Strategy::ExternalSort
        } else {
            Strategy::Adaptive
        }
    }
}
