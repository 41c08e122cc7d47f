//! Input file splitter.

use std::path::{Path, PathBuf};

use crate::chunk::Chunk;
use crate::error::SortError;
use crate::stream::{ChunkReader, ChunkWriter, Encoding};

/// Encoding of the chunks produced by the splitter.
pub const LEAF_ENCODING: Encoding = Encoding::Compact;

/// Splitting result.
#[derive(Debug)]
pub struct Split {
    chunks: Vec<Chunk>,
    dropped_lines: u64,
}

impl Split {
    /// Created chunks in creation order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// Number of input lines dropped for not having a `.` separator.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }
}

/// Partitions a textual input file into chunks of approximately fixed size.
pub struct Splitter {
    /// Directory the chunk files are created in.
    chunks_dir: PathBuf,
    /// Target chunk size in bytes.
    chunk_size: u64,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl Splitter {
    /// Creates a new splitter.
    ///
    /// # Arguments
    /// * `chunks_dir` - Directory the `<n>.chunk` files are created in
    /// * `chunk_size` - Size in bytes after which the current chunk is closed and a new one started
    pub fn new(chunks_dir: impl Into<PathBuf>, chunk_size: u64) -> Self {
        Splitter {
            chunks_dir: chunks_dir.into(),
            chunk_size,
            rw_buf_size: None,
        }
    }

    /// Sets chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: Option<usize>) -> Self {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Streams the input file once and writes its records to consecutive chunks.
    /// Concatenating the returned chunks in order yields the input records in their original order.
    pub fn split_into_chunks(&self, input: &Path) -> Result<Split, SortError> {
        let mut reader = ChunkReader::open(input, Encoding::Textual, self.rw_buf_size)?;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut writer: Option<ChunkWriter> = None;
        let mut current_size = self.chunk_size;

        while let Some(record) = reader.read_next()? {
            if current_size >= self.chunk_size {
                if let Some(full) = writer.take() {
                    full.finish()?;
                }

                let path = self.chunks_dir.join(format!("{}.chunk", chunks.len() + 1));
                log::trace!("creating chunk {}", path.display());
                writer = Some(ChunkWriter::create(&path, LEAF_ENCODING, self.rw_buf_size)?);
                chunks.push(Chunk::new(path, LEAF_ENCODING).with_rw_buf_size(self.rw_buf_size));
                current_size = 0;
            }

            if let Some(chunk_writer) = writer.as_mut() {
                current_size += chunk_writer.write_next(&record)? as u64;
            }
        }

        if let Some(last) = writer {
            last.finish()?;
        }

        log::info!(
            "input {} split into {} chunks ({} malformed lines dropped)",
            input.display(),
            chunks.len(),
            reader.dropped_lines()
        );

        return Ok(Split {
            chunks,
            dropped_lines: reader.dropped_lines(),
        });
    }
}
