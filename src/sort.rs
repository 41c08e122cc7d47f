//! External sorter.

use std::path::{Path, PathBuf};

use crate::error::SortError;
use crate::merger::MergeScheduler;
use crate::split::Splitter;
use crate::stream::Encoding;

/// Default target chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Debug)]
pub struct ExternalSorterBuilder {
    /// Number of threads to be used to sort and merge chunks in parallel.
    threads_number: Option<usize>,
    /// Directory to be used to store chunk files.
    chunks_dir: Option<PathBuf>,
    /// Target chunk size in bytes.
    chunk_size: u64,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Sorted file encoding.
    output_encoding: Encoding,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.threads_number,
            self.chunks_dir.as_deref(),
            self.chunk_size,
            self.rw_buf_size,
            self.output_encoding,
        )
    }

    /// Sets number of threads to be used to sort and merge chunks in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store chunk files.
    pub fn with_chunks_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.chunks_dir = Some(path.into());
        return self;
    }

    /// Sets target chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> ExternalSorterBuilder {
        self.chunk_size = chunk_size;
        return self;
    }

    /// Sets chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets sorted file encoding.
    pub fn with_output_encoding(mut self, encoding: Encoding) -> ExternalSorterBuilder {
        self.output_encoding = encoding;
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            threads_number: None,
            chunks_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rw_buf_size: None,
            output_encoding: Encoding::Textual,
        }
    }
}

/// External sorter.
pub struct ExternalSorter {
    /// Sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store chunk files.
    chunks_dir: Option<PathBuf>,
    /// Target chunk size in bytes.
    chunk_size: u64,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Sorted file encoding.
    output_encoding: Encoding,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `threads_number` - Number of threads to be used to sort and merge chunks in parallel. If the parameter is
    ///   [`None`] threads number will be selected based on available CPU core number.
    /// * `chunks_dir` - Directory to be used to store chunk files. If the parameter is [`None`] a temporary
    ///   directory next to the output file will be used and removed once sorting is finished.
    /// * `chunk_size` - Target chunk size in bytes.
    /// * `rw_buf_size` - Chunks file read/write buffer size.
    /// * `output_encoding` - Sorted file encoding.
    pub fn new(
        threads_number: Option<usize>,
        chunks_dir: Option<&Path>,
        chunk_size: u64,
        rw_buf_size: Option<usize>,
        output_encoding: Encoding,
    ) -> Result<Self, SortError> {
        return Ok(ExternalSorter {
            thread_pool: Self::init_thread_pool(threads_number)?,
            chunks_dir: chunks_dir.map(Path::to_path_buf),
            chunk_size,
            rw_buf_size,
            output_encoding,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, SortError> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    fn init_tmp_directory(output: &Path) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => tempfile::tempdir_in(parent),
            _ => tempfile::tempdir_in("."),
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts the input file lines by their integer key and writes the result to the output file.
    ///
    /// # Arguments
    /// * `input` - File to be sorted, one `<integer>.<text>` record per line
    /// * `output` - Sorted file path
    pub fn sort(&self, input: &Path, output: &Path) -> Result<(), SortError> {
        // kept alive until sorting is done, removed on drop
        let tmp_dir;
        let chunks_dir = match &self.chunks_dir {
            Some(chunks_dir) => chunks_dir.as_path(),
            None => {
                tmp_dir = Self::init_tmp_directory(output)?;
                tmp_dir.path()
            }
        };

        let split = Splitter::new(chunks_dir, self.chunk_size)
            .with_rw_buf_size(self.rw_buf_size)
            .split_into_chunks(input)?;

        MergeScheduler::new(&self.thread_pool, self.output_encoding)
            .with_rw_buf_size(self.rw_buf_size)
            .run(split.into_chunks(), output)?;

        log::info!("sorted {} into {}", input.display(), output.display());

        return Ok(());
    }
}
