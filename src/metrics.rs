//! Timestamped metric events, performance tracking and result statistics

use crate::config::Strategy;
use crate::system;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Concrete procedure executed within a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Quicksort,
    Introsort,
    Heapsort,
    Timsort,
    Mergesort,
    RadixSort,
    BucketSort,
    BlockMergesort,
    ExternalMergesort,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Quicksort => "quicksort",
            Algorithm::Introsort => "introsort",
            Algorithm::Heapsort => "heapsort",
            Algorithm::Timsort => "timsort",
            Algorithm::Mergesort => "mergesort",
            Algorithm::RadixSort => "radixsort",
            Algorithm::BucketSort => "bucketsort",
            Algorithm::BlockMergesort => "block_mergesort",
            Algorithm::ExternalMergesort => "externalmergesort",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEvent {
    pub name: String,
    pub value: f64,
    /// Seconds since the collector was created
    pub timestamp: f64,
}

/// Snapshot returned by [`MetricsCollector::summary`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_duration: f64,
    pub metrics: Vec<MetricEvent>,
}

/// Append-only event log shared by the algorithm paths
pub struct MetricsCollector {
    start: Instant,
    events: Mutex<Vec<MetricEvent>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, name: &str, value: f64) {
        let timestamp = self.start.elapsed().as_secs_f64();
        self.events.lock().push(MetricEvent {
            name: name.to_string(),
            value,
            timestamp,
        });
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_duration: self.start.elapsed().as_secs_f64(),
            metrics: self.events(),
        }
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Events recorded at or after position `start`
    pub fn since(&self, start: usize) -> Vec<MetricEvent> {
        let events = self.events.lock();
        events[start.min(events.len())..].to_vec()
    }

    /// Number of events named `name`
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall and CPU time of one tracked scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackedTime {
    pub wall: f64,
    pub cpu: f64,
}

/// Measures wall and process CPU time between `start` and `finish`
pub struct PerformanceTracker {
    label: &'static str,
    wall_start: Instant,
    cpu_start: f64,
}

impl PerformanceTracker {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            wall_start: Instant::now(),
            cpu_start: system::process_cpu_time(),
        }
    }

    pub fn finish(self) -> TrackedTime {
        let time = TrackedTime {
            wall: self.wall_start.elapsed().as_secs_f64(),
            cpu: (system::process_cpu_time() - self.cpu_start).max(0.0),
        };
        log::debug!("{}: CPU time {:.4}s", self.label, time.cpu);
        log::debug!("{}: wall time {:.4}s", self.label, time.wall);
        time
    }
}

/// Records `operation_time` and `memory_delta` around a closure
pub fn monitored<T>(metrics: &MetricsCollector, f: impl FnOnce() -> T) -> T {
    let start_mem = system::peak_rss_mb();
    let start = Instant::now();
    let result = f();
    metrics.record("memory_delta", system::peak_rss_mb() - start_mem);
    metrics.record("operation_time", start.elapsed().as_secs_f64());
    result
}

/// Resource usage captured alongside a sort
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub cpu_time: f64,
    pub wall_time: f64,
    pub memory_peak: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_efficiency: f64,
    pub thread_count: usize,
    pub io_operations: u64,
}

/// Result record returned with every sorted array
#[derive(Debug, Clone, Serialize)]
pub struct SortStats {
    pub execution_time: f64,
    pub memory_usage: f64,
    pub items_processed: usize,
    pub cpu_usage: f64,
    pub bucket_distribution: Vec<usize>,
    pub strategy_used: Strategy,
    /// `None` when nothing ran (empty input or an execution failure)
    pub algorithm_used: Option<Algorithm>,
    pub performance: PerformanceMetrics,
    pub optimization_history: Vec<MetricEvent>,
    pub stream_chunks: usize,
    pub compression_ratio: f64,
    pub error_detected: bool,
    pub fallback_strategy: Option<Algorithm>,
}

impl SortStats {
    /// Stats for a run that did no work
    pub fn empty(strategy: Strategy) -> Self {
        Self {
            execution_time: 0.0,
            memory_usage: 0.0,
            items_processed: 0,
            cpu_usage: 0.0,
            bucket_distribution: Vec::new(),
            strategy_used: strategy,
            algorithm_used: None,
            performance: PerformanceMetrics::default(),
            optimization_history: Vec::new(),
            stream_chunks: 0,
            compression_ratio: 1.0,
            error_detected: false,
            fallback_strategy: None,
        }
    }

    /// Name of the algorithm, `"none"` when nothing ran
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm_used.map_or("none", |a| a.as_str())
    }

    pub fn items_per_second(&self) -> f64 {
        if self.execution_time > 0.0 {
            self.items_processed as f64 / self.execution_time
        } else {
            0.0
        }
    }
}
