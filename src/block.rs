//! Fixed-size block splitting and concatenation

/// Splits arrays into nearly-equal contiguous blocks and joins them back
#[derive(Debug, Clone, Copy)]
pub struct BlockManager {
    block_size: usize,
}

impl BlockManager {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Divide `data` into `max(1, len / block_size)` contiguous blocks whose
    /// lengths differ by at most one; the first `len % blocks` are longer.
    pub fn split<'a>(&self, data: &'a [f64]) -> Vec<&'a [f64]> {
        if data.is_empty() {
            return Vec::new();
        }

        let blocks = (data.len() / self.block_size).max(1);
        let base = data.len() / blocks;
        let extra = data.len() % blocks;

        let mut result = Vec::with_capacity(blocks);
        let mut start = 0;
        for i in 0..blocks {
            let len = base + usize::from(i < extra);
            result.push(&data[start..start + len]);
            start += len;
        }
        result
    }

    /// Concatenate blocks in list order
    pub fn merge<B: AsRef<[f64]>>(&self, blocks: &[B]) -> Vec<f64> {
        let total = blocks.iter().map(|b| b.as_ref().len()).sum();
        let mut result = Vec::with_capacity(total);
        for block in blocks {
            result.extend_from_slice(block.as_ref());
        }
        result
    }
}

impl Default for BlockManager {
    fn default() -> Self {
        Self::new(4096)
    }
}
