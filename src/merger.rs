//! Tournament merge scheduler.

use std::path::Path;

use crate::chunk::Chunk;
use crate::error::SortError;
use crate::stream::{ChunkWriter, Encoding};
use crate::task::Task;

/// Encoding of the chunks produced by the intermediate merge rounds.
pub const INTERMEDIATE_ENCODING: Encoding = Encoding::Compact;

/// Merge scheduler.
/// Sorts every chunk concurrently and then merges adjacent chunk pairs round by round until a single chunk remains.
/// Merge order forms a balanced binary tree so every record is rewritten *log2(n)* times where *n* is the number
/// of chunks. Tasks of a round run on a bounded thread pool and the next round starts only when all of them are done.
pub struct MergeScheduler<'a> {
    /// Thread pool the sort and merge tasks are run on.
    thread_pool: &'a rayon::ThreadPool,
    /// Encoding of the final chunk.
    output_encoding: Encoding,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl<'a> MergeScheduler<'a> {
    /// Creates a new scheduler.
    ///
    /// # Arguments
    /// * `thread_pool` - Thread pool the tasks are run on
    /// * `output_encoding` - Encoding of the resulting chunk
    pub fn new(thread_pool: &'a rayon::ThreadPool, output_encoding: Encoding) -> Self {
        MergeScheduler {
            thread_pool,
            output_encoding,
            rw_buf_size: None,
        }
    }

    /// Sets chunk read/write buffer size used for the output file.
    pub fn with_rw_buf_size(mut self, buf_size: Option<usize>) -> Self {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Sorts and merges the chunks into a single one stored at `output`.
    /// Chunks consumed by merges are removed, an empty chunk list produces an empty output file.
    pub fn run(&self, chunks: Vec<Chunk>, output: &Path) -> Result<Chunk, SortError> {
        let chunks = self.sort_all(chunks)?;

        let mut result = match self.merge_all(chunks)? {
            Some(result) => result,
            None => {
                log::info!("no records to sort, creating empty {}", output.display());
                ChunkWriter::create(output, self.output_encoding, self.rw_buf_size)?.finish()?;
                return Ok(Chunk::new(output, self.output_encoding).with_rw_buf_size(self.rw_buf_size));
            }
        };

        if result.encoding() != self.output_encoding {
            return result.transcode(output, self.output_encoding);
        }

        log::debug!("moving {} to {}", result.path().display(), output.display());
        result.rename(output)?;

        return Ok(result);
    }

    /// Sorts all the chunks concurrently, one task per chunk.
    /// All tasks are waited for, the first error by chunk order is returned.
    pub fn sort_all(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, SortError> {
        log::info!("sorting {} chunks", chunks.len());

        let tasks = Vec::from_iter(chunks.into_iter().map(|chunk| {
            Task::spawn_in(self.thread_pool, move || {
                chunk.sort()?;
                Ok(chunk)
            })
        }));

        let chunks = wait_all(tasks)?;
        log::debug!("chunks sorting done");

        return Ok(chunks);
    }

    /// Merges chunk pairs round by round until at most one chunk remains.
    pub fn merge_all(&self, mut chunks: Vec<Chunk>) -> Result<Option<Chunk>, SortError> {
        let mut round = 1;
        while chunks.len() > 1 {
            chunks = self.merge_round(round, chunks)?;
            round += 1;
        }

        return Ok(chunks.pop());
    }

    /// Merges adjacent chunk pairs concurrently, one task per pair.
    /// The next round chunk list is the merged pairs in pairing order followed by the unpaired trailing chunk if any.
    /// The last pair is merged into the output encoding, other rounds produce compact chunks.
    pub fn merge_round(&self, round: usize, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, SortError> {
        let encoding = if chunks.len() == 2 {
            self.output_encoding
        } else {
            INTERMEDIATE_ENCODING
        };
        log::info!("merge round {}: {} chunks ({:?})", round, chunks.len(), encoding);

        let mut tasks = Vec::with_capacity(chunks.len() / 2);
        let mut carried = None;

        let mut chunks = chunks.into_iter();
        while let Some(left) = chunks.next() {
            match chunks.next() {
                Some(right) => tasks.push(Task::spawn_in(self.thread_pool, move || merge_pair(left, right, encoding))),
                None => carried = Some(left),
            }
        }

        let mut next_chunks = wait_all(tasks)?;
        if let Some(carried) = carried {
            log::debug!("carrying {} to the next round", carried.path().display());
            next_chunks.push(carried);
        }

        return Ok(next_chunks);
    }
}

fn merge_pair(left: Chunk, right: Chunk, encoding: Encoding) -> Result<Chunk, SortError> {
    let merged = left.merge(&right, encoding)?;
    left.remove()?;
    right.remove()?;

    return Ok(merged);
}

/// Waits for every task even if some of them have failed.
fn wait_all<T: Send + 'static>(tasks: Vec<Task<T>>) -> Result<Vec<T>, SortError> {
    let mut results = Vec::with_capacity(tasks.len());
    let mut first_err = None;

    for task in tasks {
        match task.wait() {
            Ok(result) => results.push(result),
            Err(err) => {
                log::debug!("task failed: {}", err);
                first_err.get_or_insert(err);
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
