//! File backed chunk of records.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::slice::ParallelSliceMut;

use crate::error::SortError;
use crate::record::{self, Record};
use crate::stream::{ChunkReader, ChunkWriter, Encoding};

const CHUNK_EXTENSION: &str = "chunk";
const RANGE_SEPARATOR: char = '+';

/// Chunk of records stored on file system.
/// The chunk content is loaded into memory only while it is being sorted or merged.
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk {
    path: PathBuf,
    encoding: Encoding,
    buf_size: Option<usize>,
}

impl Chunk {
    /// Creates a handle to an existing chunk file.
    pub fn new(path: impl Into<PathBuf>, encoding: Encoding) -> Self {
        Chunk {
            path: path.into(),
            encoding,
            buf_size: None,
        }
    }

    /// Sets chunk file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: Option<usize>) -> Self {
        self.buf_size = buf_size;
        return self;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Opens the chunk for sequential reading.
    pub fn reader(&self) -> Result<ChunkReader, SortError> {
        ChunkReader::open(&self.path, self.encoding, self.buf_size)
    }

    /// Sorts chunk records in place. The chunk file is overwritten with the sorted records.
    pub fn sort(&self) -> Result<(), SortError> {
        let mut records: Vec<Record> = self.reader()?.collect::<Result<_, _>>()?;
        log::debug!("sorting {} records of {}", records.len(), self.path.display());

        records.par_sort();

        let mut writer = ChunkWriter::create(&self.path, self.encoding, self.buf_size)?;
        for record in &records {
            writer.write_next(record)?;
        }
        writer.finish()?;

        return Ok(());
    }

    /// Merges two sorted chunks into a new one stored next to `self`.
    /// Both chunks must be sorted otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `other` - Chunk to be merged with this one
    /// * `encoding` - Encoding of the resulting chunk
    pub fn merge(&self, other: &Chunk, encoding: Encoding) -> Result<Chunk, SortError> {
        let result = Chunk::new(self.merged_path(other), encoding).with_rw_buf_size(self.buf_size);
        log::debug!(
            "merging {} and {} into {}",
            self.path.display(),
            other.path.display(),
            result.path.display()
        );

        let mut left_reader = self.reader()?;
        let mut right_reader = other.reader()?;
        let mut writer = ChunkWriter::create(&result.path, encoding, self.buf_size)?;

        let mut left = left_reader.read_next()?;
        let mut right = right_reader.read_next()?;

        loop {
            match record::compare(left.as_ref(), right.as_ref()) {
                Ordering::Equal if left.is_none() => break,
                Ordering::Less | Ordering::Equal => {
                    if let Some(record) = left.take() {
                        writer.write_next(&record)?;
                    }
                    left = left_reader.read_next()?;
                }
                Ordering::Greater => {
                    if let Some(record) = right.take() {
                        writer.write_next(&record)?;
                    }
                    right = right_reader.read_next()?;
                }
            }
        }
        writer.finish()?;

        return Ok(result);
    }

    /// Rewrites chunk records into a new file using a different encoding.
    /// The source chunk file is removed afterwards.
    pub fn transcode(self, path: impl Into<PathBuf>, encoding: Encoding) -> Result<Chunk, SortError> {
        let result = Chunk::new(path, encoding).with_rw_buf_size(self.buf_size);
        log::debug!(
            "transcoding {} into {} ({:?})",
            self.path.display(),
            result.path.display(),
            encoding
        );

        let mut writer = ChunkWriter::create(&result.path, encoding, self.buf_size)?;
        for record in self.reader()? {
            writer.write_next(&record?)?;
        }
        writer.finish()?;
        self.remove()?;

        return Ok(result);
    }

    /// Deletes the chunk file.
    pub fn remove(self) -> Result<(), SortError> {
        fs::remove_file(&self.path)?;
        return Ok(());
    }

    /// Moves the chunk file to a new location.
    pub fn rename(&mut self, path: impl Into<PathBuf>) -> Result<(), SortError> {
        let path = path.into();
        fs::rename(&self.path, &path)?;
        self.path = path;

        return Ok(());
    }

    /// Result chunk path: `<first>+<last>.chunk` where `<first>` is the leading part of this chunk's
    /// name and `<last>` the trailing part of the other's, so adjacent ranges collapse into one.
    fn merged_path(&self, other: &Chunk) -> PathBuf {
        let first = stem(&self.path);
        let first = first.split(RANGE_SEPARATOR).next().unwrap_or(&first);
        let last = stem(&other.path);
        let last = last.rsplit(RANGE_SEPARATOR).next().unwrap_or(&last);

        let name = format!("{}{}{}.{}", first, RANGE_SEPARATOR, last, CHUNK_EXTENSION);
        match self.path.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::Chunk;
    use crate::error::SortError;
    use crate::record::Record;
    use crate::stream::{ChunkWriter, Encoding};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_chunk(path: PathBuf, encoding: Encoding, lines: &[String]) -> Chunk {
        let mut writer = ChunkWriter::create(&path, encoding, None).unwrap();
        for line in lines {
            writer.write_next(&Record::encode(line.as_bytes()).unwrap().unwrap()).unwrap();
        }
        writer.finish().unwrap();

        Chunk::new(path, encoding)
    }

    fn read_chunk(chunk: &Chunk) -> Vec<String> {
        chunk
            .reader()
            .unwrap()
            .map(|record| {
                let record = record.unwrap();
                let (key, payload) = record.decode();
                format!("{}{}", key, String::from_utf8_lossy(payload))
            })
            .collect()
    }

    fn lines(range: impl Iterator<Item = i32>) -> Vec<String> {
        range.map(|key| format!("{}.item {}", key, key % 7)).collect()
    }

    #[rstest]
    #[case(Encoding::Textual)]
    #[case(Encoding::Compact)]
    fn test_chunk_sort(tmp_dir: tempfile::TempDir, #[case] encoding: Encoding) {
        let sorted = lines(0..300);
        let mut shuffled = sorted.clone();
        shuffled.shuffle(&mut rand::thread_rng());

        let chunk = write_chunk(tmp_dir.path().join("1.chunk"), encoding, &shuffled);
        chunk.sort().unwrap();

        assert_eq!(chunk.path(), tmp_dir.path().join("1.chunk"));
        assert_eq!(chunk.encoding(), encoding);
        assert_eq!(read_chunk(&chunk), sorted);
    }

    #[rstest]
    fn test_chunk_sort_ties_by_payload(tmp_dir: tempfile::TempDir) {
        let input = vec!["2.b".to_string(), "1.zz".into(), "2.a".into(), "1.z".into(), "2.b".into()];
        let chunk = write_chunk(tmp_dir.path().join("1.chunk"), Encoding::Textual, &input);
        chunk.sort().unwrap();

        assert_eq!(fs::read_to_string(chunk.path()).unwrap(), "1.z\n1.zz\n2.a\n2.b\n2.b\n");
    }

    #[rstest]
    fn test_chunk_sort_invalid_key(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("1.chunk");
        fs::write(&path, "2.b\nbad.a\n").unwrap();

        let result = Chunk::new(path, Encoding::Textual).sort();
        assert!(matches!(result, Err(SortError::ParseError { .. })));
    }

    #[rstest]
    #[case(lines(0..10), lines(10..20))]
    #[case(lines((0..40).step_by(2)), lines((1..40).step_by(2)))]
    #[case(lines(0..5), vec![])]
    #[case(vec![], vec![])]
    #[case(lines(0..10), lines(5..15))]
    fn test_chunk_merge(tmp_dir: tempfile::TempDir, #[case] left: Vec<String>, #[case] right: Vec<String>) {
        let mut expected = [left.clone(), right.clone()].concat();
        expected.sort_by_key(|line| Record::encode(line.as_bytes()).unwrap().unwrap());

        for encoding in [Encoding::Textual, Encoding::Compact] {
            let left_chunk = write_chunk(tmp_dir.path().join("1.chunk"), Encoding::Compact, &left);
            let right_chunk = write_chunk(tmp_dir.path().join("2.chunk"), Encoding::Textual, &right);

            let merged = left_chunk.merge(&right_chunk, encoding).unwrap();

            assert_eq!(merged.path(), tmp_dir.path().join("1+2.chunk"));
            assert_eq!(merged.encoding(), encoding);
            assert_eq!(read_chunk(&merged), expected);
            assert!(left_chunk.path().exists());
            assert!(right_chunk.path().exists());
        }
    }

    #[rstest]
    #[case("1.chunk", "2.chunk", "1+2.chunk")]
    #[case("1+2.chunk", "3+4.chunk", "1+4.chunk")]
    #[case("1+4.chunk", "5.chunk", "1+5.chunk")]
    #[case("a.chunk", "b", "a+b.chunk")]
    fn test_merged_path(#[case] left: &str, #[case] right: &str, #[case] expected: &str) {
        let dir = Path::new("chunks");
        let left = Chunk::new(dir.join(left), Encoding::Compact);
        let right = Chunk::new(Path::new("elsewhere").join(right), Encoding::Compact);

        assert_eq!(left.merged_path(&right), dir.join(expected));
    }

    #[rstest]
    fn test_chunk_transcode(tmp_dir: tempfile::TempDir) {
        let chunk = write_chunk(tmp_dir.path().join("1.chunk"), Encoding::Compact, &lines(0..3));
        let source = chunk.path().to_path_buf();

        let result = chunk.transcode(tmp_dir.path().join("out.txt"), Encoding::Textual).unwrap();

        assert!(!source.exists());
        assert_eq!(
            fs::read_to_string(result.path()).unwrap(),
            "0.item 0\n1.item 1\n2.item 2\n"
        );
    }

    #[rstest]
    fn test_chunk_rename_and_remove(tmp_dir: tempfile::TempDir) {
        let mut chunk = write_chunk(tmp_dir.path().join("1.chunk"), Encoding::Textual, &lines(0..3));

        chunk.rename(tmp_dir.path().join("sorted.txt")).unwrap();
        assert_eq!(chunk.path(), tmp_dir.path().join("sorted.txt"));
        assert!(!tmp_dir.path().join("1.chunk").exists());
        assert_eq!(read_chunk(&chunk), lines(0..3));

        let path = chunk.path().to_path_buf();
        chunk.remove().unwrap();
        assert!(!path.exists());

        let missing = Chunk::new(tmp_dir.path().join("missing.chunk"), Encoding::Textual);
        assert!(matches!(missing.remove(), Err(SortError::IO(_))));
    }
}
