//! Sort orchestration: strategy selection, dispatch, verification and stats.
//!
//! Every dispatched result is checked for order and length. A result that
//! fails the check is replaced by a stable sort of the input and flagged in
//! [`SortStats::error_detected`]. A path that returns an error leaves the input
//! unsorted and is reported through the observer; no failure escapes `sort`.
//!
//! The cache and metrics are shared across calls and guarded by locks, so an
//! engine may be used from several threads. Concurrent calls interleave their
//! entries in [`SortEngine::metrics`].

use crate::block::BlockManager;
use crate::bucket_sort::BucketSort;
use crate::cache::{AdaptiveCache, CacheKey};
use crate::compression::{CompressionOutcome, CompressionSort};
use crate::config::{SortConfig, Strategy};
use crate::error::{SortError, SortResult};
use crate::external_sort::ExternalSortCoordinator;
use crate::features;
use crate::merge::{is_non_decreasing, multiway_merge};
use crate::metrics::{
    monitored, Algorithm, MetricsCollector, PerformanceMetrics, PerformanceTracker, SortStats,
    TrackedTime,
};
use crate::parallel::ParallelSorter;
use crate::predictor::StrategyPredictor;
use crate::radix_sort::RadixSort;
use crate::selector::StrategySelector;
use crate::stream::{StreamProcessor, StreamWindows};
use crate::system;
use log::Level;

/// Algorithm recorded when verification replaces a result
pub const FALLBACK_ALGORITHM: Algorithm = Algorithm::Mergesort;

/// Output of one dispatched strategy
#[derive(Debug)]
struct Dispatched {
    data: Vec<f64>,
    algorithm: Algorithm,
    compression_ratio: f64,
    rerouted: Option<Algorithm>,
    stream_chunks: usize,
    io_operations: u64,
}

impl Dispatched {
    fn new(data: Vec<f64>, algorithm: Algorithm) -> Self {
        Self {
            data,
            algorithm,
            compression_ratio: 1.0,
            rerouted: None,
            stream_chunks: 0,
            io_operations: 0,
        }
    }
}

pub struct SortEngine {
    config: SortConfig,
    pool: rayon::ThreadPool,
    cache: AdaptiveCache<CacheKey, usize>,
    metrics: MetricsCollector,
    selector: StrategySelector,
}

impl SortEngine {
    pub fn new(config: SortConfig) -> SortResult<Self> {
        config.validate()?;

        let workers = config.effective_worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("hyperion-sort-{i}"))
            .build()
            .map_err(|err| {
                SortError::thread_pool_error(&format!("failed to build sort thread pool: {err}"))
            })?;

        let selector = StrategySelector::from_config(&config)?;
        let cache = AdaptiveCache::with_threshold(config.cache_size, config.adaptive_threshold);

        Ok(Self {
            config,
            pool,
            cache,
            metrics: MetricsCollector::new(),
            selector,
        })
    }

    /// Replace the predictor consulted by AUTO selection
    pub fn with_predictor(mut self, predictor: Box<dyn StrategyPredictor>) -> Self {
        self.selector = self.selector.with_predictor(predictor);
        self
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn cache(&self) -> &AdaptiveCache<CacheKey, usize> {
        &self.cache
    }

    /// Sort `input`, always returning data and stats
    pub fn sort(&self, input: &[f64]) -> (Vec<f64>, SortStats) {
        if self.config.stream_mode {
            return self.sort_stream(input.iter().copied());
        }
        if input.is_empty() {
            return (Vec::new(), SortStats::empty(self.config.strategy));
        }

        let strategy = self.resolve_strategy(input);
        self.notify(
            Level::Info,
            &format!("sorting {} items with strategy {}", input.len(), strategy),
        );

        let history_start = self.metrics.len();
        let tracker = PerformanceTracker::start("sort");
        let result = self
            .pool
            .install(|| monitored(&self.metrics, || self.dispatch(strategy, input)));
        let time = tracker.finish();

        match result {
            Ok(run) => self.complete(input, strategy, run, time, history_start),
            Err(err) => self.failed(input, strategy, &err, time),
        }
    }

    /// Oversize inputs always go to disk. Below that, the selector decides
    /// under AUTO or whenever a learned predictor is enabled.
    fn resolve_strategy(&self, input: &[f64]) -> Strategy {
        if input.len() > self.config.external_sort_threshold {
            return Strategy::ExternalSort;
        }
        match self.config.strategy {
            Strategy::Auto => self.selector.select(input),
            _ if self.config.use_learned_predictor => self.selector.select(input),
            explicit => explicit,
        }
    }

    /// Lazily sorted windows of `source`, sorted within each window only
    pub fn stream_windows<I>(&self, source: I) -> StreamWindows<I::IntoIter>
    where
        I: IntoIterator<Item = f64>,
    {
        StreamProcessor::new(self.config.effective_stream_chunk_size()).windows(source)
    }

    /// Consume `source` window by window and merge the windows into one sorted result
    pub fn sort_stream<I>(&self, source: I) -> (Vec<f64>, SortStats)
    where
        I: IntoIterator<Item = f64>,
    {
        let history_start = self.metrics.len();
        let tracker = PerformanceTracker::start("stream");
        let (merged, chunks) = self.merge_windows(source);
        let time = tracker.finish();

        if merged.is_empty() {
            return (Vec::new(), SortStats::empty(Strategy::Stream));
        }

        let run = Dispatched {
            stream_chunks: chunks,
            ..Dispatched::new(merged, Algorithm::Timsort)
        };
        // Windows are a permutation of the source, so the merge output doubles as the input.
        let source = run.data.clone();
        self.complete(&source, Strategy::Stream, run, time, history_start)
    }

    fn merge_windows<I>(&self, source: I) -> (Vec<f64>, usize)
    where
        I: IntoIterator<Item = f64>,
    {
        let mut windows = self.stream_windows(source);
        let sorted: Vec<Vec<f64>> = windows.by_ref().collect();
        let chunks = windows.chunks_processed();
        log::debug!("merging {chunks} stream windows");
        (multiway_merge(&sorted), chunks)
    }

    fn parallel_sorter(&self) -> ParallelSorter<'_> {
        ParallelSorter::new(
            BucketSort::new(&self.cache, self.config.seed),
            BlockManager::new(self.config.block_size),
            &self.metrics,
            self.config.effective_worker_count(),
        )
        .with_adaptive_threshold(self.config.adaptive_threshold)
        .with_chunk_size(self.config.chunk_size)
    }

    fn dispatch(&self, strategy: Strategy, input: &[f64]) -> SortResult<Dispatched> {
        let sorter = self.parallel_sorter();

        let run = match strategy {
            Strategy::Parallel => Dispatched::new(sorter.isolated_chunk_sort(input)?, Algorithm::Quicksort),
            Strategy::MemoryEfficient => {
                Dispatched::new(sorter.memory_efficient_sort(input), Algorithm::Mergesort)
            }
            Strategy::Hybrid => Dispatched::new(sorter.hybrid_sort(input), Algorithm::Introsort),
            Strategy::Adaptive => {
                let mut rng = features::sampling_rng(self.config.seed);
                let (data, algorithm) = sorter.adaptive_sort(input, &mut rng);
                Dispatched::new(data, algorithm)
            }
            Strategy::Stream => {
                let (data, chunks) = self.merge_windows(input.iter().copied());
                Dispatched {
                    stream_chunks: chunks,
                    ..Dispatched::new(data, Algorithm::Timsort)
                }
            }
            Strategy::BlockSort => Dispatched::new(sorter.block_sort(input), Algorithm::BlockMergesort),
            Strategy::BucketSort => {
                let bucket = BucketSort::new(&self.cache, self.config.seed);
                Dispatched::new(bucket.sort(input), Algorithm::BucketSort)
            }
            Strategy::RadixSort => self.radix_or_reroute(input),
            Strategy::CompressionSort => {
                match CompressionSort::new(self.config.compression_threshold).sort(input)? {
                    CompressionOutcome::Sorted { data, ratio } => Dispatched {
                        compression_ratio: ratio,
                        ..Dispatched::new(data, Algorithm::Introsort)
                    },
                    CompressionOutcome::Skipped { data } => {
                        log::debug!("compression skipped, sorting directly");
                        Dispatched::new(stable_sort(data), Algorithm::Timsort)
                    }
                }
            }
            Strategy::ExternalSort => {
                let coordinator = ExternalSortCoordinator::new(
                    self.config.effective_external_buffer(),
                    self.config.temp_dir.clone(),
                );
                let output = coordinator.sort(input)?;
                self.metrics.record("external_chunks", output.chunks as f64);
                Dispatched {
                    io_operations: output.io_operations,
                    ..Dispatched::new(output.data, Algorithm::ExternalMergesort)
                }
            }
            Strategy::Auto => {
                return Err(SortError::internal("AUTO must be resolved before dispatch"));
            }
        };

        Ok(run)
    }

    fn radix_or_reroute(&self, input: &[f64]) -> Dispatched {
        match RadixSort::default().sort_floats(input) {
            Some(data) => Dispatched::new(data, Algorithm::RadixSort),
            None => {
                let err = SortError::domain_violation(
                    "radix sort needs finite, non-negative integers no larger than 2^53",
                );
                self.notify(Level::Warn, &format!("{err}; rerouting to {FALLBACK_ALGORITHM}"));
                Dispatched {
                    rerouted: Some(FALLBACK_ALGORITHM),
                    ..Dispatched::new(stable_sort(input.to_vec()), FALLBACK_ALGORITHM)
                }
            }
        }
    }

    /// Keep `data` if it is a sorted permutation of `input`'s length, else sort `input` stably
    pub(crate) fn verify_or_fallback(&self, input: &[f64], data: Vec<f64>) -> (Vec<f64>, bool) {
        if data.len() == input.len() && is_non_decreasing(&data) {
            return (data, false);
        }

        self.notify(
            Level::Warn,
            &format!(
                "verification failed ({} of {} items, sorted: {}); falling back to {}",
                data.len(),
                input.len(),
                is_non_decreasing(&data),
                FALLBACK_ALGORITHM
            ),
        );
        (stable_sort(input.to_vec()), true)
    }

    fn complete(
        &self,
        input: &[f64],
        strategy: Strategy,
        run: Dispatched,
        time: TrackedTime,
        history_start: usize,
    ) -> (Vec<f64>, SortStats) {
        let (data, error_detected) = self.verify_or_fallback(input, run.data);
        let fallback_strategy = if error_detected {
            Some(FALLBACK_ALGORITHM)
        } else {
            run.rerouted
        };

        let bucket_distribution = BucketSort::new(&self.cache, self.config.seed).distribution(&data);
        let cache = self.cache.stats();
        let memory_peak = system::peak_rss_mb();

        let stats = SortStats {
            execution_time: time.wall,
            memory_usage: memory_peak,
            items_processed: input.len(),
            cpu_usage: cpu_usage(time),
            bucket_distribution,
            strategy_used: strategy,
            algorithm_used: Some(run.algorithm),
            performance: PerformanceMetrics {
                cpu_time: time.cpu,
                wall_time: time.wall,
                memory_peak,
                cache_hits: cache.hits,
                cache_misses: cache.misses,
                cache_efficiency: cache.hit_rate(),
                thread_count: self.pool.current_num_threads(),
                io_operations: run.io_operations,
            },
            optimization_history: self.metrics.since(history_start),
            stream_chunks: run.stream_chunks,
            compression_ratio: run.compression_ratio,
            error_detected,
            fallback_strategy,
        };

        self.notify(
            Level::Info,
            &format!(
                "sorted {} items with {} ({}) in {:.4}s",
                stats.items_processed,
                strategy,
                stats.algorithm_name(),
                stats.execution_time
            ),
        );
        (data, stats)
    }

    fn failed(
        &self,
        input: &[f64],
        strategy: Strategy,
        err: &SortError,
        time: TrackedTime,
    ) -> (Vec<f64>, SortStats) {
        self.notify(Level::Error, &format!("strategy {strategy} failed: {err}"));

        let stats = SortStats {
            execution_time: time.wall,
            items_processed: input.len(),
            cpu_usage: cpu_usage(time),
            performance: PerformanceMetrics {
                cpu_time: time.cpu,
                wall_time: time.wall,
                thread_count: self.pool.current_num_threads(),
                ..PerformanceMetrics::default()
            },
            error_detected: true,
            ..SortStats::empty(strategy)
        };
        (input.to_vec(), stats)
    }

    fn notify(&self, level: Level, message: &str) {
        self.config.observer.notify(level, message);
    }
}

fn stable_sort(mut data: Vec<f64>) -> Vec<f64> {
    data.sort_by(f64::total_cmp);
    data
}

fn cpu_usage(time: TrackedTime) -> f64 {
    if time.wall > 0.0 {
        time.cpu / time.wall * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortConfigBuilder;
    use crate::features::SampleFeatures;
    use crate::observer::RecordingObserver;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn engine_with(config: SortConfig) -> SortEngine {
        SortEngine::new(config.with_worker_count(Some(2)).with_seed(Some(42))).expect("engine")
    }

    fn reference(data: &[f64]) -> Vec<f64> {
        stable_sort(data.to_vec())
    }

    fn random_data(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_range(-1e6..1e6)).collect()
    }

    #[test]
    fn test_empty_input() {
        let engine = engine_with(SortConfig::default());
        let (data, stats) = engine.sort(&[]);
        assert!(data.is_empty());
        assert_eq!(stats.items_processed, 0);
        assert!(!stats.error_detected);
    }

    #[test]
    fn test_single_element() {
        let engine = engine_with(SortConfig::default());
        let (data, stats) = engine.sort(&[5.0]);
        assert_eq!(data, vec![5.0]);
        assert_eq!(stats.items_processed, 1);
        assert!(!stats.error_detected);
    }

    #[test]
    fn test_every_explicit_strategy_sorts() -> SortResult<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let data = random_data(12_000, 1);
        let expected = reference(&data);

        for strategy in Strategy::ALL {
            let config = SortConfig::default()
                .with_strategy(strategy)
                .with_external_buffer_size(8 * 1024)
                .with_temp_dir(Some(temp_dir.path().to_path_buf()));
            let engine = engine_with(config);
            let (sorted, stats) = engine.sort(&data);
            assert_eq!(sorted, expected, "strategy {strategy}");
            assert!(!stats.error_detected, "strategy {strategy}");
            assert_eq!(stats.items_processed, data.len());
            assert!(stats.algorithm_used.is_some());
        }
        Ok(())
    }

    #[test]
    fn test_radix_sort_integers() {
        let engine = engine_with(SortConfig::default().with_strategy(Strategy::RadixSort));
        let (data, stats) = engine.sort(&[3.0, 1.0, 2.0]);
        assert_eq!(data, vec![1.0, 2.0, 3.0]);
        assert_eq!(stats.algorithm_used, Some(Algorithm::RadixSort));
        assert_eq!(stats.fallback_strategy, None);
    }

    #[test]
    fn test_radix_domain_violation_reroutes() {
        let observer = Arc::new(RecordingObserver::new());
        let engine = engine_with(
            SortConfig::default()
                .with_strategy(Strategy::RadixSort)
                .with_observer(observer.clone()),
        );
        let (data, stats) = engine.sort(&[3.5, -1.0, 2.0]);
        assert_eq!(data, vec![-1.0, 2.0, 3.5]);
        assert!(!stats.error_detected);
        assert_eq!(stats.fallback_strategy, Some(FALLBACK_ALGORITHM));
        assert!(observer.contains(Level::Warn, "rerouting"));
    }

    #[test]
    fn test_sorted_input_selects_stable_class() {
        let engine = engine_with(SortConfig::default());
        let input: Vec<f64> = (0..5000).map(f64::from).collect();
        let (data, stats) = engine.sort(&input);
        assert_eq!(data, input);
        assert!(stats.strategy_used.is_stable_class());
        assert_eq!(stats.algorithm_used, Some(Algorithm::Timsort));
    }

    #[test]
    fn test_compression_below_threshold() {
        let engine = engine_with(SortConfig::default().with_strategy(Strategy::CompressionSort));
        let (data, stats) = engine.sort(&[3.0, 1.0, 2.0]);
        assert_eq!(stats.compression_ratio, 1.0);
        assert_eq!(data, vec![1.0, 2.0, 3.0]);
        assert!(!stats.error_detected);
    }

    #[test]
    fn test_verification_fallback() {
        let observer = Arc::new(RecordingObserver::new());
        let engine = engine_with(SortConfig::default().with_observer(observer.clone()));

        let input = vec![2.0, 1.0, 3.0];
        let (data, replaced) = engine.verify_or_fallback(&input, vec![3.0, 1.0, 2.0]);
        assert!(replaced);
        assert_eq!(data, vec![1.0, 2.0, 3.0]);

        let (data, replaced) = engine.verify_or_fallback(&input, vec![1.0, 2.0]);
        assert!(replaced);
        assert_eq!(data, vec![1.0, 2.0, 3.0]);

        let (_, replaced) = engine.verify_or_fallback(&input, vec![1.0, 2.0, 3.0]);
        assert!(!replaced);
        assert!(observer.contains(Level::Warn, "verification failed"));
    }

    #[test]
    fn test_execution_failure_returns_input() {
        let observer = Arc::new(RecordingObserver::new());
        let config = SortConfig::default()
            .with_strategy(Strategy::ExternalSort)
            .with_temp_dir(Some("/nonexistent/hyperion-sort".into()))
            .with_observer(observer.clone());
        let engine = engine_with(config);

        let input = vec![3.0, 1.0, 2.0];
        let (data, stats) = engine.sort(&input);
        assert_eq!(data, input);
        assert!(stats.error_detected);
        assert_eq!(stats.items_processed, 3);
        assert_eq!(stats.algorithm_name(), "none");
        assert!(observer.contains(Level::Error, "external_sort"));
    }

    #[test]
    fn test_wrong_predictor_stays_correct() {
        struct AlwaysRadix;
        impl StrategyPredictor for AlwaysRadix {
            fn classify(&self, _: &SampleFeatures) -> Strategy {
                Strategy::RadixSort
            }
            fn name(&self) -> &'static str {
                "always_radix"
            }
        }

        let engine = engine_with(SortConfig::default()).with_predictor(Box::new(AlwaysRadix));
        let data = random_data(3000, 2);
        let (sorted, stats) = engine.sort(&data);
        assert_eq!(sorted, reference(&data));
        assert_eq!(stats.strategy_used, Strategy::RadixSort);
        assert_eq!(stats.fallback_strategy, Some(FALLBACK_ALGORITHM));
    }

    #[test]
    fn test_stream_mode_merges_windows() {
        let config = SortConfigBuilder::new()
            .stream()
            .chunk_size(1000)
            .workers(2)
            .build()
            .expect("config");
        let engine = SortEngine::new(config).expect("engine");

        let data = random_data(4_500, 3);
        let (sorted, stats) = engine.sort(&data);
        assert_eq!(sorted, reference(&data));
        assert_eq!(stats.strategy_used, Strategy::Stream);
        assert_eq!(stats.stream_chunks, 5);
        assert_eq!(stats.items_processed, data.len());
    }

    #[test]
    fn test_stream_windows_are_piecewise() {
        let engine = engine_with(SortConfig::default().with_chunk_size(Some(100)));
        let windows: Vec<Vec<f64>> = engine.stream_windows((0..250).rev().map(f64::from)).collect();
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| is_non_decreasing(w)));
        assert_eq!(windows[0][0], 150.0);
    }

    #[test]
    fn test_block_sort_history() {
        let engine = engine_with(
            SortConfig::default()
                .with_strategy(Strategy::BlockSort)
                .with_block_size(1000),
        );
        let data = random_data(4000, 4);
        let (sorted, stats) = engine.sort(&data);
        assert_eq!(sorted, reference(&data));
        let names: Vec<&str> = stats.optimization_history.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"block_splits"));
        assert!(names.contains(&"block_merges"));
        assert!(names.contains(&"operation_time"));
    }

    #[test]
    fn test_external_stats() -> SortResult<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let config = SortConfig::default()
            .with_strategy(Strategy::ExternalSort)
            .with_external_buffer_size(4096)
            .with_temp_dir(Some(temp_dir.path().to_path_buf()));
        let engine = engine_with(config);

        let data = random_data(2048, 5);
        let (sorted, stats) = engine.sort(&data);
        assert_eq!(sorted, reference(&data));
        assert_eq!(stats.algorithm_used, Some(Algorithm::ExternalMergesort));
        assert_eq!(stats.performance.io_operations, 5);
        assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_oversize_input_overrides_explicit_strategy() -> SortResult<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let config = SortConfig::default()
            .with_strategy(Strategy::Hybrid)
            .with_external_sort_threshold(1000)
            .with_temp_dir(Some(temp_dir.path().to_path_buf()));
        let engine = engine_with(config);

        let data = random_data(5000, 6);
        let (sorted, stats) = engine.sort(&data);
        assert_eq!(sorted, reference(&data));
        assert_eq!(stats.strategy_used, Strategy::ExternalSort);
        assert_eq!(stats.algorithm_used, Some(Algorithm::ExternalMergesort));
        assert!(stats.performance.io_operations > 1);

        // At the threshold the explicit strategy still runs
        let (_, stats) = engine.sort(&data[..1000]);
        assert_eq!(stats.strategy_used, Strategy::Hybrid);
        Ok(())
    }

    #[test]
    fn test_learned_predictor_overrides_explicit_strategy() {
        struct AlwaysBucket;
        impl StrategyPredictor for AlwaysBucket {
            fn classify(&self, _: &SampleFeatures) -> Strategy {
                Strategy::BucketSort
            }
            fn name(&self) -> &'static str {
                "always_bucket"
            }
        }

        let config = SortConfig::default()
            .with_strategy(Strategy::Hybrid)
            .with_learned_predictor(true);
        let engine = engine_with(config).with_predictor(Box::new(AlwaysBucket));
        let data = random_data(3000, 7);
        let (sorted, stats) = engine.sort(&data);
        assert_eq!(sorted, reference(&data));
        assert_eq!(stats.strategy_used, Strategy::BucketSort);

        let engine = engine_with(SortConfig::default().with_strategy(Strategy::Hybrid))
            .with_predictor(Box::new(AlwaysBucket));
        let (_, stats) = engine.sort(&data);
        assert_eq!(stats.strategy_used, Strategy::Hybrid);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = SortEngine::new(SortConfig::default().with_block_size(0)).err();
        assert!(matches!(err, Some(SortError::InvalidConfig { .. })));
    }
}
