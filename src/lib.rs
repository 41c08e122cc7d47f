//! `chunk-sort` is an external merge sort of line oriented files that do not fit into memory.
//!
//! Every input line is a record of the form `<integer>.<text>`. Records are ordered by the integer key
//! and, on equal keys, byte-wise by the text. Lines without a `.` are dropped.
//!
//! # Overview
//!
//! Sorting is done in three steps:
//!
//! * **Split:**
//!   the input file is streamed once and partitioned into chunk files of approximately fixed size.
//! * **Sort:**
//!   every chunk is loaded into memory, sorted and written back. Chunks are sorted concurrently.
//! * **Merge:**
//!   adjacent chunks are merged pairwise, round by round, until a single chunk remains. Intermediate
//!   chunks are stored in a compact length-prefixed binary format, the last merge produces a text file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use chunk_sort::ExternalSorterBuilder;
//!
//! let sorter = ExternalSorterBuilder::new()
//!     .with_chunk_size(64 * 1024 * 1024)
//!     .with_chunks_dir(Path::new("./chunks"))
//!     .build()
//!     .unwrap();
//!
//! sorter.sort(Path::new("unsorted.txt"), Path::new("sorted.txt")).unwrap();
//! ```

pub mod chunk;
pub mod error;
pub mod merger;
pub mod record;
pub mod sort;
pub mod split;
pub mod stream;
pub mod task;

pub use chunk::Chunk;
pub use error::SortError;
pub use merger::MergeScheduler;
pub use record::Record;
pub use sort::{ExternalSorter, ExternalSorterBuilder};
pub use split::{Split, Splitter};
pub use stream::{ChunkReader, ChunkWriter, Encoding};
pub use task::Task;
