//! k-way merge of ascending partitions

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Heap entry: current head of one partition
#[derive(Debug)]
struct MergeItem {
    value: f64,
    partition: usize,
    position: usize,
}

impl PartialEq for MergeItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeItem {}

impl PartialOrd for MergeItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.partition.cmp(&other.partition))
            .then(self.position.cmp(&other.position))
    }
}

/// Merge already-sorted partitions into one ascending vector.
///
/// Empty partitions are skipped. Ties resolve toward the lower partition
/// index.
pub fn multiway_merge<P: AsRef<[f64]>>(partitions: &[P]) -> Vec<f64> {
    let total = partitions.iter().map(|p| p.as_ref().len()).sum();
    let mut merged = Vec::with_capacity(total);

    let mut heap: BinaryHeap<Reverse<MergeItem>> = BinaryHeap::with_capacity(partitions.len());
    for (partition, data) in partitions.iter().enumerate() {
        if let Some(&value) = data.as_ref().first() {
            heap.push(Reverse(MergeItem {
                value,
                partition,
                position: 0,
            }));
        }
    }

    while let Some(Reverse(item)) = heap.pop() {
        merged.push(item.value);

        let source = partitions[item.partition].as_ref();
        let next = item.position + 1;
        if let Some(&value) = source.get(next) {
            heap.push(Reverse(MergeItem {
                value,
                partition: item.partition,
                position: next,
            }));
        }
    }

    merged
}

/// Two-way merge used by the block merge tree
pub fn merge_two(left: &[f64], right: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        if left[i].total_cmp(&right[j]) != Ordering::Greater {
            out.push(left[i]);
            i += 1;
        } else {
            out.push(right[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}

/// Merge the sorted runs `slice[..mid]` and `slice[mid..]` through `scratch`
pub fn merge_adjacent_runs(slice: &mut [f64], mid: usize, scratch: &mut Vec<f64>) {
    if mid == 0 || mid >= slice.len() {
        return;
    }

    scratch.clear();
    let (left, right) = slice.split_at(mid);
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        if left[i].total_cmp(&right[j]) != Ordering::Greater {
            scratch.push(left[i]);
            i += 1;
        } else {
            scratch.push(right[j]);
            j += 1;
        }
    }
    scratch.extend_from_slice(&left[i..]);
    scratch.extend_from_slice(&right[j..]);

    slice.copy_from_slice(scratch);
}

/// Whether `data` is non-decreasing under the total order
pub fn is_non_decreasing(data: &[f64]) -> bool {
    data.windows(2)
        .all(|pair| pair[0].total_cmp(&pair[1]) != Ordering::Greater)
}
