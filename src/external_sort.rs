//! Disk-backed sort for inputs too large to keep every intermediate in memory.
//!
//! The input is spilled to a temporary file of native-endian `f64`s, read back
//! in fixed byte ranges by concurrent tasks, sorted per range and k-way merged.
//! The spill file is removed before `sort` returns, on success or failure.

use crate::error::{SortContext, SortError, SortResult};
use crate::merge::multiway_merge;
use crossbeam_channel::unbounded;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const ELEMENT: usize = std::mem::size_of::<f64>();

/// Byte range of the spill file read and sorted as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalChunk {
    pub offset: u64,
    pub length: usize,
}

/// Sorted data plus I/O bookkeeping
#[derive(Debug)]
pub struct ExternalSortOutput {
    pub data: Vec<f64>,
    pub chunks: usize,
    pub io_operations: u64,
}

/// Spill, chunked concurrent read, local sort, k-way merge
pub struct ExternalSortCoordinator {
    /// Chunk length in bytes, a whole number of elements
    buffer_size: usize,
    temp_dir: Option<PathBuf>,
}

impl ExternalSortCoordinator {
    pub fn new(buffer_size: usize, temp_dir: Option<PathBuf>) -> Self {
        let buffer_size = (buffer_size / ELEMENT).max(1) * ELEMENT;
        Self {
            buffer_size,
            temp_dir,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn sort(&self, data: &[f64]) -> SortResult<ExternalSortOutput> {
        if data.is_empty() {
            return Ok(ExternalSortOutput {
                data: Vec::new(),
                chunks: 0,
                io_operations: 0,
            });
        }

        let spill = self.spill(data)?;
        let path = spill.path().to_path_buf();
        let file_len = spill
            .as_file()
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();

        let chunks = plan_chunks(file_len, self.buffer_size);
        log::debug!(
            "external sort: {} bytes in {} chunks of {} bytes",
            file_len,
            chunks.len(),
            self.buffer_size
        );

        let sorted = read_sorted_chunks(&path, &chunks)?;
        let merged = multiway_merge(&sorted);

        spill
            .close()
            .with_context(|| format!("failed to remove {}", path.display()))?;

        if merged.len() != data.len() {
            return Err(SortError::merge_failed(&format!(
                "external merge produced {} of {} elements",
                merged.len(),
                data.len()
            )));
        }

        Ok(ExternalSortOutput {
            data: merged,
            chunks: chunks.len(),
            // One write, one read per chunk
            io_operations: 1 + chunks.len() as u64,
        })
    }

    /// Write `data` to a fresh temporary file
    fn spill(&self, data: &[f64]) -> SortResult<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hyperion-spill-").suffix(".bin");

        let spill = if let Some(dir) = &self.temp_dir {
            builder
                .tempfile_in(dir)
                .with_context(|| format!("failed to create spill file in {}", dir.display()))?
        } else if let Ok(tmpdir) = std::env::var("TMPDIR") {
            builder
                .tempfile_in(&tmpdir)
                .with_context(|| format!("failed to create spill file in {tmpdir}"))?
        } else {
            builder
                .tempfile()
                .with_context(|| "failed to create spill file".to_string())?
        };

        {
            let mut writer = BufWriter::new(spill.as_file());
            writer
                .write_all(bytemuck::cast_slice(data))
                .and_then(|_| writer.flush())
                .with_context(|| format!("failed to write {}", spill.path().display()))?;
        }

        Ok(spill)
    }
}

/// Cover `file_len` bytes with ranges of at most `buffer_size` bytes
pub fn plan_chunks(file_len: u64, buffer_size: usize) -> Vec<ExternalChunk> {
    let buffer = buffer_size.max(1) as u64;
    let count = file_len.div_ceil(buffer);
    (0..count)
        .map(|i| {
            let offset = i * buffer;
            ExternalChunk {
                offset,
                length: (file_len - offset).min(buffer) as usize,
            }
        })
        .collect()
}

/// Issue every chunk read at once on the current rayon pool, then collect
fn read_sorted_chunks(path: &Path, chunks: &[ExternalChunk]) -> SortResult<Vec<Vec<f64>>> {
    let (tx, rx) = unbounded();

    rayon::scope(|scope| {
        for (index, chunk) in chunks.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let _ = tx.send((index, read_chunk(path, chunk)));
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Vec<f64>>> = vec![None; chunks.len()];
    for (index, result) in rx.iter() {
        slots[index] = Some(result?);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| SortError::merge_failed(&format!("external chunk {index} was not read")))
        })
        .collect()
}

/// Read one range and sort it once the read has completed
fn read_chunk(path: &Path, chunk: &ExternalChunk) -> SortResult<Vec<f64>> {
    let context = || {
        format!(
            "failed to read {} bytes at offset {} of {}",
            chunk.length,
            chunk.offset,
            path.display()
        )
    };

    let mut file = File::open(path).with_context(context)?;
    file.seek(SeekFrom::Start(chunk.offset)).with_context(context)?;

    if chunk.length % ELEMENT != 0 {
        return Err(SortError::internal(&format!(
            "chunk at offset {} is not a whole number of elements",
            chunk.offset
        )));
    }

    let mut values = vec![0f64; chunk.length / ELEMENT];
    file.read_exact(bytemuck::cast_slice_mut(&mut values))
        .with_context(context)?;
    values.sort_unstable_by(f64::total_cmp);
    Ok(values)
}
