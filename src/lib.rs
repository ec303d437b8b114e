//! Adaptive numeric sorting engine
//!
//! This crate picks, per input, one of several sorting strategies from the
//! input's size, a sampled description of its distribution and the host's
//! resources, then runs it on a bounded worker pool. Large inputs spill to
//! disk, unbounded inputs are sorted window by window, and every result is
//! verified before it is returned.
//!
//! ```no_run
//! use hyperion_sort::{SortConfig, SortEngine};
//!
//! let engine = SortEngine::new(SortConfig::default())?;
//! let (sorted, stats) = engine.sort(&[3.0, 1.0, 2.0]);
//! assert_eq!(sorted, vec![1.0, 2.0, 3.0]);
//! println!("{} via {}", stats.strategy_used, stats.algorithm_name());
//! # Ok::<(), hyperion_sort::SortError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod error;
pub mod config;
pub mod observer;

// Building blocks
pub mod cache;
pub mod block;
pub mod merge;
pub mod features;
pub mod system;
pub mod metrics;

// Sorting implementations
pub mod algorithms;
pub mod radix_sort;
pub mod bucket_sort;
pub mod parallel;
pub mod stream;
pub mod external_sort;
pub mod compression;

// Selection and orchestration
pub mod predictor;
pub mod selector;
pub mod engine;

// Re-export commonly used types
pub use config::{SortConfig, SortConfigBuilder, Strategy};
pub use engine::SortEngine;
pub use error::{SortError, SortResult};
pub use metrics::{Algorithm, SortStats};
pub use observer::{LogObserver, SortObserver};
pub use predictor::{LinearPredictor, RuleBasedPredictor, StrategyPredictor};

/// Process exit codes used by the command-line driver
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const SORT_FAILURE: i32 = 2;

/// Sort `input` with a one-off engine built from `config`
pub fn sort(input: &[f64], config: &SortConfig) -> SortResult<(Vec<f64>, SortStats)> {
    let engine = SortEngine::new(config.clone())?;
    Ok(engine.sort(input))
}
