//! Configuration management for sort operations

use crate::error::{SortError, SortResult};
use crate::observer::{LogObserver, SortObserver};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Top-level approach used for an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Let the selector decide
    Auto,
    /// Independent chunk sorts on isolated workers, then k-way merge
    Parallel,
    /// In-place chunk sorts merged with a single scratch buffer
    MemoryEfficient,
    /// Percentile partitions sorted independently
    Hybrid,
    /// Sample-driven choice between stable sort, heapsort and hybrid
    Adaptive,
    /// Windowed sorting of a (possibly unbounded) sequence
    Stream,
    /// Block-parallel sort with a binary merge tree
    BlockSort,
    /// Bucket sort with adaptive bucket count
    BucketSort,
    /// LSD radix sort for non-negative integers
    RadixSort,
    /// Compression pre-check followed by an in-memory sort
    CompressionSort,
    /// Disk-backed chunked sort
    ExternalSort,
}

impl Strategy {
    /// Every strategy, in declaration order
    pub const ALL: [Strategy; 11] = [
        Strategy::Auto,
        Strategy::Parallel,
        Strategy::MemoryEfficient,
        Strategy::Hybrid,
        Strategy::Adaptive,
        Strategy::Stream,
        Strategy::BlockSort,
        Strategy::BucketSort,
        Strategy::RadixSort,
        Strategy::CompressionSort,
        Strategy::ExternalSort,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Parallel => "parallel",
            Strategy::MemoryEfficient => "memory_efficient",
            Strategy::Hybrid => "hybrid",
            Strategy::Adaptive => "adaptive",
            Strategy::Stream => "stream",
            Strategy::BlockSort => "block_sort",
            Strategy::BucketSort => "bucket_sort",
            Strategy::RadixSort => "radix_sort",
            Strategy::CompressionSort => "compression_sort",
            Strategy::ExternalSort => "external_sort",
        }
    }

    /// Strategies whose result is produced by a stable sort of the whole input
    pub fn is_stable_class(&self) -> bool {
        matches!(
            self,
            Strategy::Adaptive | Strategy::MemoryEfficient | Strategy::Stream
        )
    }
}

impl FromStr for Strategy {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| SortError::parse_error(&format!("unknown strategy: {s}")))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration structure for sort operations
#[derive(Clone)]
pub struct SortConfig {
    /// Requested strategy; `Auto` runs the selector
    pub strategy: Strategy,
    /// Worker threads for the shared pool and the chunk workers
    pub worker_count: Option<usize>,
    /// Stream window capacity and PARALLEL chunk length override
    pub chunk_size: Option<usize>,
    /// Initial capacity of the adaptive cache
    pub cache_size: usize,
    /// Fraction of available memory a chunk may plan for
    pub adaptive_threshold: f64,
    /// Route every input through the stream path
    pub stream_mode: bool,
    /// Elements per block for BLOCK_SORT
    pub block_size: usize,
    /// Consult the pluggable predictor during selection
    pub use_learned_predictor: bool,
    /// Pre-trained predictor artifact (JSON)
    pub predictor_model: Option<PathBuf>,
    /// Minimum input length for a compression attempt
    pub compression_threshold: usize,
    /// Input length above which AUTO goes external
    pub external_sort_threshold: usize,
    /// Bytes per external chunk read
    pub external_buffer_size: usize,
    /// Directory for the external sort spill file
    pub temp_dir: Option<PathBuf>,
    /// Seed for sampling; random when absent
    pub seed: Option<u64>,
    /// Receives progress messages
    pub observer: Arc<dyn SortObserver>,
}

impl fmt::Debug for SortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortConfig")
            .field("strategy", &self.strategy)
            .field("worker_count", &self.worker_count)
            .field("chunk_size", &self.chunk_size)
            .field("cache_size", &self.cache_size)
            .field("adaptive_threshold", &self.adaptive_threshold)
            .field("stream_mode", &self.stream_mode)
            .field("block_size", &self.block_size)
            .field("use_learned_predictor", &self.use_learned_predictor)
            .field("predictor_model", &self.predictor_model)
            .field("compression_threshold", &self.compression_threshold)
            .field("external_sort_threshold", &self.external_sort_threshold)
            .field("external_buffer_size", &self.external_buffer_size)
            .field("temp_dir", &self.temp_dir)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            worker_count: None,
            chunk_size: None,
            cache_size: 2000,
            adaptive_threshold: 0.8,
            stream_mode: false,
            block_size: 4096,
            use_learned_predictor: false,
            predictor_model: None,
            compression_threshold: 10_000,
            external_sort_threshold: 10_000_000,
            external_buffer_size: 1024 * 1024,
            temp_dir: None,
            seed: None,
            observer: Arc::new(LogObserver),
        }
    }
}

impl SortConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the worker count
    pub fn with_worker_count(mut self, workers: Option<usize>) -> Self {
        self.worker_count = workers;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the initial cache capacity
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Set the adaptive threshold
    pub fn with_adaptive_threshold(mut self, threshold: f64) -> Self {
        self.adaptive_threshold = threshold;
        self
    }

    /// Enable stream mode
    pub fn with_stream_mode(mut self, stream_mode: bool) -> Self {
        self.stream_mode = stream_mode;
        self
    }

    /// Set the block size
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Enable the learned predictor
    pub fn with_learned_predictor(mut self, enabled: bool) -> Self {
        self.use_learned_predictor = enabled;
        self
    }

    /// Load the predictor from a pre-trained artifact
    pub fn with_predictor_model(mut self, path: Option<PathBuf>) -> Self {
        self.predictor_model = path;
        self
    }

    /// Set the compression threshold
    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Set the external sort threshold
    pub fn with_external_sort_threshold(mut self, threshold: usize) -> Self {
        self.external_sort_threshold = threshold;
        self
    }

    /// Set the external read buffer size in bytes
    pub fn with_external_buffer_size(mut self, bytes: usize) -> Self {
        self.external_buffer_size = bytes;
        self
    }

    /// Set the spill directory
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Fix the sampling seed
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the progress observer
    pub fn with_observer(mut self, observer: Arc<dyn SortObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> SortResult<()> {
        if let Some(workers) = self.worker_count {
            if workers == 0 {
                return Err(SortError::thread_pool_error(
                    "worker count must be positive",
                ));
            }
            if workers > 1024 {
                return Err(SortError::thread_pool_error(
                    "too many workers (maximum 1024)",
                ));
            }
        }

        if self.chunk_size == Some(0) {
            return Err(SortError::invalid_config("chunk size must be positive"));
        }

        if self.block_size == 0 {
            return Err(SortError::invalid_config("block size must be positive"));
        }

        if self.cache_size == 0 {
            return Err(SortError::invalid_config("cache size must be positive"));
        }

        if !(self.adaptive_threshold > 0.0 && self.adaptive_threshold <= 1.0) {
            return Err(SortError::invalid_config(
                "adaptive threshold must lie in (0, 1]",
            ));
        }

        if self.external_buffer_size < std::mem::size_of::<f64>() {
            return Err(SortError::invalid_config(
                "external buffer must hold at least one element",
            ));
        }

        if self.predictor_model.is_some() && !self.use_learned_predictor {
            return Err(SortError::invalid_config(
                "a predictor model requires the learned predictor to be enabled",
            ));
        }

        Ok(())
    }

    /// Get effective worker count
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1).max(1))
    }

    /// Stream window capacity
    pub fn effective_stream_chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(1000)
    }

    /// External chunk length in bytes, rounded down to whole elements
    pub fn effective_external_buffer(&self) -> usize {
        let element = std::mem::size_of::<f64>();
        (self.external_buffer_size / element).max(1) * element
    }
}

/// Builder pattern for creating configurations
pub struct SortConfigBuilder {
    config: SortConfig,
}

impl SortConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: SortConfig::default(),
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.worker_count = Some(workers);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = Some(chunk_size);
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    pub fn stream(mut self) -> Self {
        self.config.stream_mode = true;
        self
    }

    pub fn learned(mut self) -> Self {
        self.config.use_learned_predictor = true;
        self
    }

    pub fn model(mut self, path: PathBuf) -> Self {
        self.config.use_learned_predictor = true;
        self.config.predictor_model = Some(path);
        self
    }

    pub fn compression_threshold(mut self, threshold: usize) -> Self {
        self.config.compression_threshold = threshold;
        self
    }

    pub fn external_threshold(mut self, threshold: usize) -> Self {
        self.config.external_sort_threshold = threshold;
        self
    }

    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.temp_dir = Some(dir);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SortObserver>) -> Self {
        self.config.observer = observer;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SortResult<SortConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for SortConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Preset configurations for common use cases
pub mod presets {
    use super::*;

    /// Windowed sorting of unbounded input
    pub fn streaming() -> SortConfig {
        SortConfig::new()
            .with_strategy(Strategy::Stream)
            .with_stream_mode(true)
    }

    /// Always spill to disk
    pub fn external() -> SortConfig {
        SortConfig::new().with_strategy(Strategy::ExternalSort)
    }

    /// Selection through the predictor
    pub fn learned() -> SortConfig {
        SortConfig::new().with_learned_predictor(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SortConfig::default();
        assert_eq!(config.strategy, Strategy::Auto);
        assert_eq!(config.cache_size, 2000);
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.compression_threshold, 10_000);
        assert!((config.adaptive_threshold - 0.8).abs() < f64::EPSILON);
        assert!(!config.stream_mode);
        assert!(!config.use_learned_predictor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SortConfigBuilder::new()
            .strategy(Strategy::BlockSort)
            .workers(3)
            .block_size(128)
            .seed(7)
            .build()
            .expect("Failed to build test config");

        assert_eq!(config.strategy, Strategy::BlockSort);
        assert_eq!(config.effective_worker_count(), 3);
        assert_eq!(config.block_size, 128);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "radix-sort".parse::<Strategy>().expect("Failed to parse radix"),
            Strategy::RadixSort
        );
        assert_eq!(
            "EXTERNAL_SORT"
                .parse::<Strategy>()
                .expect("Failed to parse external"),
            Strategy::ExternalSort
        );
        assert!("bogosort".parse::<Strategy>().is_err());
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().ok(), Some(strategy));
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SortConfig::default().with_block_size(0).validate().is_err());
        assert!(SortConfig::default()
            .with_worker_count(Some(0))
            .validate()
            .is_err());
        assert!(SortConfig::default()
            .with_adaptive_threshold(1.5)
            .validate()
            .is_err());
        assert!(SortConfig::default()
            .with_external_buffer_size(4)
            .validate()
            .is_err());
        assert!(SortConfig::default()
            .with_predictor_model(Some(PathBuf::from("model.json")))
            .validate()
            .is_err());
    }

    #[test]
    fn test_effective_external_buffer_rounds_to_elements() {
        let config = SortConfig::default().with_external_buffer_size(4100);
        assert_eq!(config.effective_external_buffer(), 4096);
    }

    #[test]
    fn test_presets() {
        let config = presets::streaming();
        assert!(config.stream_mode);
        assert_eq!(config.strategy, Strategy::Stream);

        let config = presets::external();
        assert_eq!(config.strategy, Strategy::ExternalSort);

        let config = presets::learned();
        assert!(config.use_learned_predictor);
    }
}
