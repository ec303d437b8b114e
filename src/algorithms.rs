//! Comparison sorts: insertion sort, three-way quicksort, introsort, heapsort
//!
//! Quicksort and introsort partition around a ninther pivot into
//! less/equal/greater parts. Parts larger than [`PARALLEL_THRESHOLD`] are
//! recursed through `rayon::join`, so all fan-out lands on whichever rayon
//! pool the caller installed; smaller parts recurse on the calling thread.

use std::cmp::Ordering;

/// Sub-arrays of at most this many elements use insertion sort
pub const INSERTION_THRESHOLD: usize = 16;

/// Partitions above this size recurse in parallel
pub const PARALLEL_THRESHOLD: usize = 1000;

/// Insertion sort for small arrays (O(n) best case)
pub fn insertion_sort(data: &mut [f64]) {
    for i in 1..data.len() {
        let key = data[i];
        let mut j = i;
        while j > 0 && data[j - 1].total_cmp(&key) == Ordering::Greater {
            data[j] = data[j - 1];
            j -= 1;
        }
        data[j] = key;
    }
}

/// Lower median of a small set of values
pub fn median(values: &[f64]) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    insertion_sort(&mut sorted);
    sorted[(sorted.len() - 1) / 2]
}

fn median_of_three(a: f64, b: f64, c: f64) -> f64 {
    if a.total_cmp(&b) == Ordering::Greater {
        if b.total_cmp(&c) != Ordering::Less {
            b
        } else if a.total_cmp(&c) == Ordering::Greater {
            c
        } else {
            a
        }
    } else if a.total_cmp(&c) != Ordering::Less {
        a
    } else if b.total_cmp(&c) == Ordering::Greater {
        c
    } else {
        b
    }
}

/// Median-of-medians pivot over three strided thirds.
///
/// Always returns an element of `data`, so a partition around it has a
/// non-empty middle part.
pub fn ninther(data: &[f64]) -> f64 {
    if data.len() < 9 {
        return median(data);
    }

    let third = data.len() / 3;
    let m0 = median_of_three(data[0], data[third], data[2 * third]);
    let m1 = median_of_three(data[1], data[1 + third], data[1 + 2 * third]);
    let m2 = median_of_three(data[2], data[2 + third], data[2 + 2 * third]);
    median_of_three(m0, m1, m2)
}

fn three_way_split(data: &[f64], pivot: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut less = Vec::new();
    let mut equal = Vec::new();
    let mut greater = Vec::new();
    for &x in data {
        match x.total_cmp(&pivot) {
            Ordering::Less => less.push(x),
            Ordering::Equal => equal.push(x),
            Ordering::Greater => greater.push(x),
        }
    }
    (less, equal, greater)
}

fn concat(mut left: Vec<f64>, middle: Vec<f64>, right: Vec<f64>) -> Vec<f64> {
    left.reserve(middle.len() + right.len());
    left.extend(middle);
    left.extend(right);
    left
}

/// Three-way quicksort with a ninther pivot
pub fn quicksort(mut data: Vec<f64>) -> Vec<f64> {
    if data.len() <= INSERTION_THRESHOLD {
        insertion_sort(&mut data);
        return data;
    }

    let pivot = ninther(&data);
    let parallel = data.len() > PARALLEL_THRESHOLD;
    let (less, equal, greater) = three_way_split(&data, pivot);
    drop(data);

    let (left, right) = if parallel {
        rayon::join(|| quicksort(less), || quicksort(greater))
    } else {
        (quicksort(less), quicksort(greater))
    };
    concat(left, equal, right)
}

/// Recursion budget for introsort: `2 * floor(log2 n)`
pub fn introsort_depth(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        2 * n.ilog2()
    }
}

/// Quicksort with a depth budget that falls back to heapsort
pub fn introsort(data: Vec<f64>) -> Vec<f64> {
    let depth = introsort_depth(data.len());
    introsort_with_depth(data, depth)
}

fn introsort_with_depth(mut data: Vec<f64>, depth: u32) -> Vec<f64> {
    if data.len() <= INSERTION_THRESHOLD {
        insertion_sort(&mut data);
        return data;
    }
    if depth == 0 {
        heapsort(&mut data);
        return data;
    }

    let pivot = ninther(&data);
    let parallel = data.len() > PARALLEL_THRESHOLD;
    let (less, equal, greater) = three_way_split(&data, pivot);
    drop(data);

    let (left, right) = if parallel {
        rayon::join(
            || introsort_with_depth(less, depth - 1),
            || introsort_with_depth(greater, depth - 1),
        )
    } else {
        (
            introsort_with_depth(less, depth - 1),
            introsort_with_depth(greater, depth - 1),
        )
    };
    concat(left, equal, right)
}

fn sift_down(data: &mut [f64], mut root: usize, end: usize) {
    loop {
        let left = 2 * root + 1;
        if left >= end {
            break;
        }
        let right = left + 1;
        let mut largest = root;
        if data[left].total_cmp(&data[largest]) == Ordering::Greater {
            largest = left;
        }
        if right < end && data[right].total_cmp(&data[largest]) == Ordering::Greater {
            largest = right;
        }
        if largest == root {
            break;
        }
        data.swap(root, largest);
        root = largest;
    }
}

/// In-place binary max-heap sort
pub fn heapsort(data: &mut [f64]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    for i in (0..n / 2).rev() {
        sift_down(data, i, n);
    }
    for end in (1..n).rev() {
        data.swap(0, end);
        sift_down(data, 0, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::is_non_decreasing;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_data(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_range(-1000.0..1000.0)).collect()
    }

    fn reference(data: &[f64]) -> Vec<f64> {
        let mut sorted = data.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    #[test]
    fn test_insertion_sort() {
        let mut data = vec![5.0, 2.0, 8.0, 1.0, 9.0, 3.0, 7.0, 4.0, 6.0];
        insertion_sort(&mut data);
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_ninther_returns_element() {
        assert_eq!(median(&[4.0, 1.0]), 1.0);
        assert_eq!(median(&[3.0, 9.0, 5.0]), 5.0);

        let data: Vec<f64> = (0..27).map(f64::from).collect();
        let pivot = ninther(&data);
        assert!(data.contains(&pivot));
        assert!(pivot > 0.0 && pivot < 26.0);
    }

    #[test]
    fn test_quicksort_matches_reference() {
        for (len, seed) in [(0, 1), (1, 2), (16, 3), (17, 4), (999, 5), (5000, 6)] {
            let data = random_data(len, seed);
            assert_eq!(quicksort(data.clone()), reference(&data), "len {len}");
        }
    }

    #[test]
    fn test_quicksort_many_duplicates() {
        let data: Vec<f64> = (0..20_000).map(|i| (i % 3) as f64).collect();
        let sorted = quicksort(data.clone());
        assert_eq!(sorted, reference(&data));
    }

    #[test]
    fn test_introsort_matches_reference() {
        for (len, seed) in [(2, 7), (100, 8), (4096, 9), (30_000, 10)] {
            let data = random_data(len, seed);
            assert_eq!(introsort(data.clone()), reference(&data), "len {len}");
        }
    }

    #[test]
    fn test_introsort_zero_depth_uses_heapsort() {
        let data = random_data(500, 11);
        let sorted = introsort_with_depth(data.clone(), 0);
        assert_eq!(sorted, reference(&data));
        assert_eq!(introsort_depth(1024), 20);
    }

    #[test]
    fn test_heapsort() {
        let mut data = random_data(1234, 12);
        let expected = reference(&data);
        heapsort(&mut data);
        assert_eq!(data, expected);

        let mut single = vec![5.0];
        heapsort(&mut single);
        assert_eq!(single, vec![5.0]);
    }

    #[test]
    fn test_nan_and_infinities_do_not_lose_elements() {
        let data = vec![f64::NAN, 1.0, f64::INFINITY, -0.0, f64::NEG_INFINITY, 0.0, 3.0]
            .into_iter()
            .cycle()
            .take(70)
            .collect::<Vec<_>>();
        let sorted = quicksort(data.clone());
        assert_eq!(sorted.len(), data.len());
        assert!(is_non_decreasing(&sorted));
    }
}
