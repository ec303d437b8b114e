//! Bucket sort with a memoized, distribution-aware bucket count

use crate::cache::{AdaptiveCache, CacheKey};
use crate::features::{self, SAMPLE_SIZE};
use rayon::prelude::*;

/// Below this length the bucket count is simply `n / 10`
const SMALL_INPUT: usize = 1000;

/// Bucket sorter sharing the engine's memo cache
pub struct BucketSort<'a> {
    cache: &'a AdaptiveCache<CacheKey, usize>,
    seed: Option<u64>,
}

impl<'a> BucketSort<'a> {
    pub fn new(cache: &'a AdaptiveCache<CacheKey, usize>, seed: Option<u64>) -> Self {
        Self { cache, seed }
    }

    /// Number of buckets for `data`, memoized by `(n, rounded std-dev)`
    pub fn bucket_count(&self, data: &[f64]) -> usize {
        let n = data.len();
        if n < SMALL_INPUT {
            return (n / 10).max(1);
        }

        let key = CacheKey::Text(format!("bucket_count_{}_{:.2}", n, features::std_dev(data)));
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let mut rng = features::sampling_rng(self.seed);
        let sample = features::take_sample(data, SAMPLE_SIZE, &mut rng);
        let std_dev = features::std_dev(&sample);
        let range = features::value_range(&sample);

        let count = count_for(n, std_dev, range);

        log::debug!("bucket count for {n} elements: {count}");
        self.cache.put(key, count);
        count
    }

    /// Distribute into equal-width buckets, sort each in parallel, concatenate
    pub fn sort(&self, data: &[f64]) -> Vec<f64> {
        let Some((min, max)) = features::min_max(data) else {
            return Vec::new();
        };
        if min.total_cmp(&max).is_eq() {
            return data.to_vec();
        }

        let n_buckets = self.bucket_count(data);
        let mut buckets = vec![Vec::new(); n_buckets];
        for &x in data {
            buckets[bucket_index(x, min, max, n_buckets)].push(x);
        }

        buckets
            .par_iter_mut()
            .filter(|bucket| !bucket.is_empty())
            .for_each(|bucket| bucket.sort_unstable_by(f64::total_cmp));

        let mut result = Vec::with_capacity(data.len());
        for bucket in buckets.iter().filter(|b| !b.is_empty()) {
            result.extend_from_slice(bucket);
        }
        result
    }

    /// Histogram of `data` over `bucket_count` equal-width buckets
    pub fn distribution(&self, data: &[f64]) -> Vec<usize> {
        let Some((min, max)) = features::min_max(data) else {
            return Vec::new();
        };
        let n_buckets = self.bucket_count(data);
        let mut counts = vec![0usize; n_buckets];
        for &x in data {
            counts[bucket_index(x, min, max, n_buckets)] += 1;
        }
        counts
    }
}

/// Linear interpolation between `min` and `max`, clamped to the last bucket.
/// Monotone in `x`, so concatenating sorted buckets yields sorted output.
fn bucket_index(x: f64, min: f64, max: f64, n_buckets: usize) -> usize {
    let width = (max - min) / n_buckets as f64;
    let idx = ((x - min) / width) as usize;
    idx.min(n_buckets - 1)
}

/// Bucket count for `n` elements whose sample has the given spread
fn count_for(n: usize, std_dev: f64, range: f64) -> usize {
    if !(range > 0.0) || !range.is_finite() {
        return 1;
    }
    let n = n as f64;
    let count = if features::is_low_variance(std_dev, range) {
        n.sqrt()
    } else {
        (n.sqrt() * (std_dev / range) * 2.0).min(n / n.log2())
    };
    (count as usize).max(1)
}
