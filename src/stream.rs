//! Windowed sorting of unbounded input.
//!
//! Each window is sorted on its own, so the emitted sequence is only sorted
//! piecewise. Window capacity follows a least-squares trend over the last few
//! flushes.

use std::collections::VecDeque;

/// Flushes remembered for the size trend
const HISTORY_LEN: usize = 5;

/// Smallest window capacity after adaptation
pub const MIN_WINDOW: usize = 1000;

/// Window capacity and flush history
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    chunk_size: usize,
    history: VecDeque<usize>,
    chunks_processed: usize,
}

impl StreamProcessor {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            history: VecDeque::with_capacity(HISTORY_LEN),
            chunks_processed: 0,
        }
    }

    /// Current window capacity
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunks_processed(&self) -> usize {
        self.chunks_processed
    }

    /// Lazily cut `source` into sorted windows
    pub fn windows<I>(self, source: I) -> StreamWindows<I::IntoIter>
    where
        I: IntoIterator<Item = f64>,
    {
        StreamWindows {
            source: source.into_iter(),
            buffer: Vec::with_capacity(self.chunk_size),
            processor: self,
            exhausted: false,
        }
    }

    /// Sort a window and update the capacity for the next one
    fn flush(&mut self, buffer: &mut Vec<f64>) -> Vec<f64> {
        let mut window = std::mem::take(buffer);
        window.sort_by(f64::total_cmp);
        self.chunks_processed += 1;

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(window.len());

        if let Some(predicted) = predict_next(&self.history) {
            let next = if predicted.is_finite() && predicted > 0.0 {
                predicted as usize
            } else {
                0
            };
            self.chunk_size = next.max(MIN_WINDOW);
            log::debug!("stream window resized to {}", self.chunk_size);
        }

        window
    }
}

/// Least-squares line over `(1, h1) .. (k, hk)` evaluated at `k + 1`
fn predict_next(history: &VecDeque<usize>) -> Option<f64> {
    let k = history.len();
    if k < 2 {
        return None;
    }

    let n = k as f64;
    let mean_x = (n + 1.0) / 2.0;
    let mean_y = history.iter().map(|&h| h as f64).sum::<f64>() / n;

    let (mut cov, mut var) = (0.0, 0.0);
    for (i, &h) in history.iter().enumerate() {
        let dx = (i + 1) as f64 - mean_x;
        cov += dx * (h as f64 - mean_y);
        var += dx * dx;
    }

    let slope = cov / var;
    Some(mean_y + slope * (n + 1.0 - mean_x))
}

/// One-shot iterator of sorted windows
pub struct StreamWindows<I> {
    source: I,
    buffer: Vec<f64>,
    processor: StreamProcessor,
    exhausted: bool,
}

impl<I> StreamWindows<I> {
    pub fn chunks_processed(&self) -> usize {
        self.processor.chunks_processed()
    }

    pub fn chunk_size(&self) -> usize {
        self.processor.chunk_size()
    }
}

impl<I: Iterator<Item = f64>> Iterator for StreamWindows<I> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.exhausted {
            return None;
        }

        for value in self.source.by_ref() {
            self.buffer.push(value);
            if self.buffer.len() >= self.processor.chunk_size {
                return Some(self.processor.flush(&mut self.buffer));
            }
        }

        self.exhausted = true;
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.processor.flush(&mut self.buffer))
        }
    }
}
