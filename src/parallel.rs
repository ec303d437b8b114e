//! Partition- and block-parallel sorts, isolated chunk workers, and the
//! memory-efficient chunked sort.
//!
//! Shared-memory work (blocks, percentile partitions, buckets) runs on the
//! rayon pool installed by the engine. The PARALLEL strategy instead hands
//! owned chunks to a dedicated set of worker threads over channels, so each
//! worker touches only its own buffer.

use crate::algorithms::{self, INSERTION_THRESHOLD, PARALLEL_THRESHOLD};
use crate::block::BlockManager;
use crate::bucket_sort::BucketSort;
use crate::error::{SortError, SortResult};
use crate::features::{self, SampleFeatures};
use crate::merge::{merge_adjacent_runs, merge_two, multiway_merge};
use crate::metrics::{Algorithm, MetricsCollector};
use crate::system;
use crossbeam_channel::{bounded, unbounded};
use rand::Rng;
use rayon::prelude::*;
use std::thread;

/// Inputs shorter than this are sorted whole instead of partitioned
const MIN_PARTITIONED: usize = 1000;

/// Upper bound on percentile pivots for the hybrid sort
const MAX_PIVOTS: usize = 10;

/// Parallel sort paths sharing the engine's cache and metrics
pub struct ParallelSorter<'a> {
    bucket: BucketSort<'a>,
    blocks: BlockManager,
    metrics: &'a MetricsCollector,
    workers: usize,
    adaptive_threshold: f64,
    chunk_size: Option<usize>,
}

impl<'a> ParallelSorter<'a> {
    pub fn new(
        bucket: BucketSort<'a>,
        blocks: BlockManager,
        metrics: &'a MetricsCollector,
        workers: usize,
    ) -> Self {
        Self {
            bucket,
            blocks,
            metrics,
            workers: workers.max(1),
            adaptive_threshold: 0.8,
            chunk_size: None,
        }
    }

    pub fn with_adaptive_threshold(mut self, threshold: f64) -> Self {
        self.adaptive_threshold = threshold;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Percentile partitions sorted independently with introsort
    pub fn hybrid_sort(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < MIN_PARTITIONED {
            return algorithms::introsort(data.to_vec());
        }

        let partitions = percentile_partitions(data);
        log::debug!("hybrid sort: {} partitions", partitions.len());

        let sorted: Vec<Vec<f64>> = partitions
            .into_par_iter()
            .map(algorithms::introsort)
            .collect();
        sorted.concat()
    }

    /// Blocks sorted in parallel, then merged pairwise until one remains
    pub fn block_sort(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < MIN_PARTITIONED {
            let mut whole = data.to_vec();
            whole.sort_by(f64::total_cmp);
            return whole;
        }

        let blocks = self.blocks.split(data);
        self.metrics.record("block_splits", 1.0);

        let mut sorted: Vec<Vec<f64>> = blocks
            .par_iter()
            .map(|block| self.sort_block(block))
            .collect();

        while sorted.len() > 1 {
            sorted = sorted
                .par_chunks(2)
                .map(|pair| match pair {
                    [left, right] => merge_two(left, right),
                    [single] => single.clone(),
                    _ => Vec::new(),
                })
                .collect();
            self.metrics.record("block_merges", 1.0);
        }

        sorted.pop().unwrap_or_default()
    }

    /// Per-block dispatch by size and spread
    pub fn sort_block(&self, block: &[f64]) -> Vec<f64> {
        if block.len() < INSERTION_THRESHOLD {
            let mut owned = block.to_vec();
            algorithms::insertion_sort(&mut owned);
            return owned;
        }

        let std_dev = features::std_dev(block);
        let range = features::value_range(block);
        if features::is_low_variance(std_dev, range) {
            self.bucket.sort(block)
        } else if block.len() < PARALLEL_THRESHOLD {
            algorithms::quicksort(block.to_vec())
        } else {
            algorithms::introsort(block.to_vec())
        }
    }

    /// Sample-driven choice: stable sort, heapsort, or hybrid partitioning
    pub fn adaptive_sort<R: Rng + ?Sized>(&self, data: &[f64], rng: &mut R) -> (Vec<f64>, Algorithm) {
        let features = SampleFeatures::extract(data, rng);

        if features.nearly_sorted {
            let mut result = data.to_vec();
            crate::metrics::monitored(self.metrics, || result.sort_by(f64::total_cmp));
            (result, Algorithm::Timsort)
        } else if features.is_low_variance() {
            let mut result = data.to_vec();
            crate::metrics::monitored(self.metrics, || algorithms::heapsort(&mut result));
            (result, Algorithm::Heapsort)
        } else {
            let result = crate::metrics::monitored(self.metrics, || self.hybrid_sort(data));
            (result, Algorithm::Introsort)
        }
    }

    /// Chunk length for PARALLEL and MEMORY_EFFICIENT
    pub fn chunk_size_for(&self, n: usize) -> usize {
        if let Some(size) = self.chunk_size {
            return size.max(1);
        }

        let element = std::mem::size_of::<f64>();
        let total_bytes = (n * element) as f64;
        let cpus = system::cpu_count();
        let l3_estimate = (cpus * (1 << 20)) as f64;

        if total_bytes < l3_estimate {
            return n.clamp(1, 10_000);
        }

        let available = system::available_memory_bytes() as f64;
        let by_memory = (total_bytes / (available * self.adaptive_threshold)) as usize;
        let optimal_chunks = cpus.max(by_memory).max(1);
        (n / optimal_chunks).max(1000)
    }

    /// Split into adaptive chunks, sort each on an isolated worker, k-way merge
    pub fn isolated_chunk_sort(&self, data: &[f64]) -> SortResult<Vec<f64>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = self.chunk_size_for(data.len());
        let chunk_count = (data.len() / chunk_size).max(1);
        let manager = BlockManager::new(data.len().div_ceil(chunk_count));
        let chunks: Vec<Vec<f64>> = manager.split(data).into_iter().map(<[f64]>::to_vec).collect();
        log::debug!(
            "isolated chunk sort: {} chunks on {} workers",
            chunks.len(),
            self.workers
        );

        let sorted = sort_on_workers(chunks, self.workers)?;
        Ok(multiway_merge(&sorted))
    }

    /// Sort fixed chunks in place, then merge runs bottom-up through one scratch buffer
    pub fn memory_efficient_sort(&self, data: &[f64]) -> Vec<f64> {
        let mut result = data.to_vec();
        let chunk_size = self.chunk_size_for(data.len());

        for chunk in result.chunks_mut(chunk_size) {
            chunk.sort_unstable_by(f64::total_cmp);
        }

        let mut scratch = Vec::with_capacity(chunk_size.min(result.len()) * 2);
        let mut width = chunk_size;
        while width < result.len() {
            let mut start = 0;
            while start + width < result.len() {
                let end = (start + 2 * width).min(result.len());
                merge_adjacent_runs(&mut result[start..end], width, &mut scratch);
                start = end;
            }
            width *= 2;
        }
        result
    }
}

/// Split `data` between percentile pivots; the last partition includes the maximum
pub fn percentile_partitions(data: &[f64]) -> Vec<Vec<f64>> {
    let points = (data.len() / MIN_PARTITIONED + 1).min(MAX_PIVOTS);
    let quantiles: Vec<f64> = (0..points)
        .map(|i| {
            if points == 1 {
                0.0
            } else {
                100.0 * i as f64 / (points - 1) as f64
            }
        })
        .collect();
    let pivots = percentiles(data, &quantiles);

    // Interior pivots bound the partitions: [p0, p1), [p1, p2), ..., [p_{k-2}, max]
    let interior = if pivots.len() > 2 {
        &pivots[1..pivots.len() - 1]
    } else {
        &[][..]
    };

    let mut partitions = vec![Vec::new(); interior.len() + 1];
    for &x in data {
        let idx = interior.partition_point(|p| p.total_cmp(&x).is_le());
        partitions[idx].push(x);
    }
    partitions.retain(|p| !p.is_empty());
    partitions
}

/// Linearly interpolated percentiles (0..=100) of `data`
pub fn percentiles(data: &[f64], quantiles: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut scratch = data.to_vec();
    let last = scratch.len() - 1;

    quantiles
        .iter()
        .map(|q| {
            let pos = (q / 100.0).clamp(0.0, 1.0) * last as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let lo_val = select_rank(&mut scratch, lo);
            if hi == lo {
                return lo_val;
            }
            let hi_val = select_rank(&mut scratch, hi);
            let span = hi_val - lo_val;
            // Infinite or NaN neighbours keep the lower rank as the pivot
            if span.is_finite() {
                lo_val + span * (pos - lo as f64)
            } else {
                lo_val
            }
        })
        .collect()
}

fn select_rank(scratch: &mut [f64], k: usize) -> f64 {
    let (_, value, _) = scratch.select_nth_unstable_by(k, f64::total_cmp);
    *value
}

/// Sort owned chunks on `workers` dedicated threads fed through channels
pub fn sort_on_workers(chunks: Vec<Vec<f64>>, workers: usize) -> SortResult<Vec<Vec<f64>>> {
    let total = chunks.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, total);

    let (job_tx, job_rx) = bounded::<(usize, Vec<f64>)>(workers * 2);
    let (result_tx, result_rx) = unbounded::<(usize, Vec<f64>)>();

    thread::scope(|scope| -> SortResult<()> {
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("chunk-worker-{id}"))
                .spawn_scoped(scope, move || {
                    for (index, mut chunk) in job_rx.iter() {
                        chunk.sort_unstable_by(f64::total_cmp);
                        if result_tx.send((index, chunk)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| SortError::thread_pool_error(&e.to_string()))?;
            handles.push(handle);
        }
        drop(job_rx);
        drop(result_tx);

        for job in chunks.into_iter().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut failed = 0;
        for handle in handles {
            if handle.join().is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(SortError::thread_pool_error(&format!(
                "{failed} chunk worker(s) panicked"
            )));
        }
        Ok(())
    })?;

    let mut slots: Vec<Option<Vec<f64>>> = vec![None; total];
    for (index, chunk) in result_rx.try_iter() {
        slots[index] = Some(chunk);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| SortError::merge_failed(&format!("chunk {index} was never sorted")))
        })
        .collect()
}
