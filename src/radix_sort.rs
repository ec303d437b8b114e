//! Radix sort implementation for non-negative integer data
//! Achieves O(n * digits) time complexity vs O(n log n) for comparison-based sorts

use rayon::prelude::*;

/// Largest float that still round-trips exactly through `u64`
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

const RADIX: usize = 10;

/// LSD base-10 radix sort for non-negative integers
pub struct RadixSort {
    /// Whether to use parallel processing
    parallel: bool,
}

impl RadixSort {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    /// Whether every value is a finite, non-negative integer that fits a `u64` exactly
    pub fn accepts(&self, values: &[f64]) -> bool {
        // Sign bit check also turns away -0.0, which would come back as +0.0
        let check = |x: &f64| {
            x.is_finite() && x.is_sign_positive() && x.fract() == 0.0 && *x <= MAX_EXACT_INTEGER
        };
        if self.parallel && values.len() > 10_000 {
            values.par_iter().all(check)
        } else {
            values.iter().all(check)
        }
    }

    /// Sort floats that satisfy [`RadixSort::accepts`]; returns `None` otherwise
    pub fn sort_floats(&self, values: &[f64]) -> Option<Vec<f64>> {
        if !self.accepts(values) {
            return None;
        }

        let mut keys: Vec<u64> = if self.parallel && values.len() > 10_000 {
            values.par_iter().map(|&x| x as u64).collect()
        } else {
            values.iter().map(|&x| x as u64).collect()
        };
        self.sort(&mut keys);
        Some(keys.into_iter().map(|k| k as f64).collect())
    }

    /// Stable bucket pass per decimal digit until the exponent exceeds the maximum
    pub fn sort(&self, values: &mut [u64]) {
        if values.len() < 2 {
            return;
        }

        let max_val = if self.parallel && values.len() > 10_000 {
            values.par_iter().copied().max().unwrap_or(0)
        } else {
            values.iter().copied().max().unwrap_or(0)
        };

        let mut temp = vec![0u64; values.len()];
        let mut exp: u64 = 1;

        while max_val / exp > 0 {
            let counts = self.digit_counts(values, exp);

            // Calculate positions
            let mut positions = [0usize; RADIX];
            for digit in 1..RADIX {
                positions[digit] = positions[digit - 1] + counts[digit - 1];
            }

            // Distribute values
            for &value in values.iter() {
                let digit = ((value / exp) % RADIX as u64) as usize;
                temp[positions[digit]] = value;
                positions[digit] += 1;
            }

            values.copy_from_slice(&temp);

            match exp.checked_mul(RADIX as u64) {
                Some(next) => exp = next,
                None => break,
            }
        }
    }

    fn digit_counts(&self, values: &[u64], exp: u64) -> [usize; RADIX] {
        let count = |mut acc: [usize; RADIX], &value: &u64| {
            acc[((value / exp) % RADIX as u64) as usize] += 1;
            acc
        };

        if self.parallel && values.len() > 10_000 {
            values
                .par_iter()
                .fold(|| [0usize; RADIX], count)
                .reduce(
                    || [0usize; RADIX],
                    |mut a, b| {
                        for (x, y) in a.iter_mut().zip(b) {
                            *x += y;
                        }
                        a
                    },
                )
        } else {
            values.iter().fold([0usize; RADIX], count)
        }
    }
}

impl Default for RadixSort {
    fn default() -> Self {
        Self::new(true)
    }
}
