//! Sampled statistical features used to pick a strategy

use itertools::{Itertools, MinMaxResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Maximum number of elements inspected when sampling
pub const SAMPLE_SIZE: usize = 1000;

/// Fraction of adjacent inversions below which a sample counts as nearly sorted
pub const NEARLY_SORTED_RATIO: f64 = 0.1;

/// Build the sampling RNG, deterministic when a seed is given
pub fn sampling_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Up to `max` random elements, kept in their original relative order
pub fn take_sample<R: Rng + ?Sized>(data: &[f64], max: usize, rng: &mut R) -> Vec<f64> {
    let amount = data.len().min(max);
    if amount == data.len() {
        return data.to_vec();
    }

    let mut indices = rand::seq::index::sample(rng, data.len(), amount).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| data[i]).collect()
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let var = data.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / data.len() as f64;
    var.sqrt()
}

/// Minimum and maximum under the total order
pub fn min_max(data: &[f64]) -> Option<(f64, f64)> {
    match data.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(x) => Some((x, x)),
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
    }
}

/// Peak-to-peak distance
pub fn value_range(data: &[f64]) -> f64 {
    min_max(data).map_or(0.0, |(lo, hi)| hi - lo)
}

fn central_moment(data: &[f64], m: f64, order: i32) -> f64 {
    data.iter().map(|x| (x - m).powi(order)).sum::<f64>() / data.len() as f64
}

/// Biased sample skewness, zero for constant data
pub fn skewness(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let m2 = central_moment(data, m, 2);
    if m2 <= f64::EPSILON * m.abs().max(1.0) {
        return 0.0;
    }
    central_moment(data, m, 3) / m2.powf(1.5)
}

/// Biased excess (Fisher) kurtosis, zero for constant data
pub fn kurtosis(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let m2 = central_moment(data, m, 2);
    if m2 <= f64::EPSILON * m.abs().max(1.0) {
        return 0.0;
    }
    central_moment(data, m, 4) / (m2 * m2) - 3.0
}

/// Fewer than 10% of adjacent pairs are inversions
pub fn is_nearly_sorted(sample: &[f64]) -> bool {
    let inversions = sample
        .iter()
        .tuple_windows()
        .filter(|(a, b)| b.total_cmp(a).is_lt())
        .count();
    (inversions as f64) < sample.len() as f64 * NEARLY_SORTED_RATIO
}

/// Standard deviation small relative to the range ("clustered" data)
pub fn is_low_variance(std_dev: f64, range: f64) -> bool {
    std_dev < range / 100.0
}

/// Features extracted from a sample of the input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleFeatures {
    pub std_dev: f64,
    pub range: f64,
    pub nearly_sorted: bool,
    pub n: usize,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl SampleFeatures {
    /// Sample up to [`SAMPLE_SIZE`] elements of `data` and describe them
    pub fn extract<R: Rng + ?Sized>(data: &[f64], rng: &mut R) -> Self {
        let sample = take_sample(data, SAMPLE_SIZE, rng);
        Self::from_sample(&sample, data.len())
    }

    pub fn from_sample(sample: &[f64], n: usize) -> Self {
        Self {
            std_dev: std_dev(sample),
            range: value_range(sample),
            nearly_sorted: is_nearly_sorted(sample),
            n,
            skewness: skewness(sample),
            kurtosis: kurtosis(sample),
        }
    }

    pub fn is_low_variance(&self) -> bool {
        is_low_variance(self.std_dev, self.range)
    }

    pub fn is_heavy_tailed(&self) -> bool {
        self.skewness > 2.0 || self.kurtosis > 5.0
    }

    /// Feature vector in predictor order
    pub fn as_vector(&self) -> [f64; 6] {
        [
            self.std_dev,
            self.range,
            if self.nearly_sorted { 1.0 } else { 0.0 },
            self.n as f64,
            self.skewness,
            self.kurtosis,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_keeps_input_order() {
        let data: Vec<f64> = (0..10_000).map(f64::from).collect();
        let mut rng = sampling_rng(Some(11));
        let sample = take_sample(&data, SAMPLE_SIZE, &mut rng);
        assert_eq!(sample.len(), SAMPLE_SIZE);
        assert!(sample.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_small_input_sampled_whole() {
        let data = [3.0, 1.0, 2.0];
        let mut rng = sampling_rng(Some(1));
        assert_eq!(take_sample(&data, SAMPLE_SIZE, &mut rng), data.to_vec());
    }

    #[test]
    fn test_moments() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        assert!((std_dev(&data) - 2.0).abs() < 1e-12);
        assert!((value_range(&data) - 7.0).abs() < 1e-12);

        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&symmetric).abs() < 1e-12);
        assert!((kurtosis(&symmetric) + 1.3).abs() < 1e-12);

        let constant = [4.0; 16];
        assert_eq!(skewness(&constant), 0.0);
        assert_eq!(kurtosis(&constant), 0.0);
    }

    #[test]
    fn test_heavy_tail_detection() {
        let mut data = vec![1.0; 990];
        data.extend(std::iter::repeat(1000.0).take(10));
        let features = SampleFeatures::from_sample(&data, data.len());
        assert!(features.skewness > 2.0);
        assert!(features.is_heavy_tailed());
    }

    #[test]
    fn test_nearly_sorted() {
        let ascending: Vec<f64> = (0..100).map(f64::from).collect();
        assert!(is_nearly_sorted(&ascending));

        let descending: Vec<f64> = ascending.iter().rev().copied().collect();
        assert!(!is_nearly_sorted(&descending));
    }

    #[test]
    fn test_feature_vector_layout() {
        let features = SampleFeatures::from_sample(&[1.0, 2.0, 3.0], 3);
        let v = features.as_vector();
        assert_eq!(v[1], 2.0);
        assert_eq!(v[2], 1.0);
        assert_eq!(v[3], 3.0);
    }
}
