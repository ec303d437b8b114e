//! Compression-assisted sort path.
//!
//! A zstd round trip over the raw element bytes serves as a cheap redundancy
//! probe. Only inputs that are large enough and actually compress get sorted
//! here; everything else is handed back untouched as [`CompressionOutcome::Skipped`].

use crate::error::{SortError, SortResult};
use rayon::prelude::*;
use std::io::{Read, Write};

/// Fast level; the ratio is a probe, not an archive
const LEVEL: i32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// Decompressed and sorted; `ratio` is compressed / original size
    Sorted { data: Vec<f64>, ratio: f64 },
    /// Below the threshold or not compressible; data is unchanged
    Skipped { data: Vec<f64> },
}

impl CompressionOutcome {
    pub fn ratio(&self) -> f64 {
        match self {
            CompressionOutcome::Sorted { ratio, .. } => *ratio,
            CompressionOutcome::Skipped { .. } => 1.0,
        }
    }

    pub fn into_data(self) -> Vec<f64> {
        match self {
            CompressionOutcome::Sorted { data, .. } | CompressionOutcome::Skipped { data } => data,
        }
    }
}

pub struct CompressionSort {
    threshold: usize,
}

impl CompressionSort {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn sort(&self, data: &[f64]) -> SortResult<CompressionOutcome> {
        if data.len() < self.threshold {
            return Ok(CompressionOutcome::Skipped {
                data: data.to_vec(),
            });
        }

        let original: &[u8] = bytemuck::cast_slice(data);
        let compressed = compress(original)?;
        let ratio = compressed.len() as f64 / original.len().max(1) as f64;
        log::debug!(
            "compressed {} bytes to {} (ratio {:.3})",
            original.len(),
            compressed.len(),
            ratio
        );

        if ratio >= 1.0 {
            return Ok(CompressionOutcome::Skipped {
                data: data.to_vec(),
            });
        }

        let mut restored = decompress(&compressed, data.len())?;
        restored.par_sort_unstable_by(f64::total_cmp);
        Ok(CompressionOutcome::Sorted {
            data: restored,
            ratio,
        })
    }
}

fn compress(bytes: &[u8]) -> SortResult<Vec<u8>> {
    let mut encoder = zstd::Encoder::new(Vec::with_capacity(bytes.len() / 2), LEVEL)
        .map_err(|e| SortError::compression(&e.to_string()))?;
    encoder
        .write_all(bytes)
        .map_err(|e| SortError::compression(&e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| SortError::compression(&e.to_string()))
}

fn decompress(frame: &[u8], elements: usize) -> SortResult<Vec<f64>> {
    let mut decoder =
        zstd::Decoder::new(frame).map_err(|e| SortError::compression(&e.to_string()))?;
    let mut values = vec![0f64; elements];
    decoder
        .read_exact(bytemuck::cast_slice_mut(&mut values))
        .map_err(|e| SortError::compression(&e.to_string()))?;
    Ok(values)
}
