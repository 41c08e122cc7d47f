//! Chunk file readers and writers.
//!
//! A chunk file stores records in one of two encodings:
//!
//! * [`Encoding::Textual`] - one `<decimal-key><payload>\n` line per record, the same grammar as the input file.
//! * [`Encoding::Compact`] - a 4-byte big-endian length followed by that many bytes of the encoded record.

use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use crate::error::SortError;
use crate::record::Record;

/// Default chunk file read/write buffer size.
pub const DEFAULT_BUF_SIZE: usize = 1024 * 1024;

const LENGTH_LEN: usize = 4;

/// On-disk record encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// Human readable lines.
    Textual,
    /// Length-prefixed encoded records.
    Compact,
}

/// Sequential record reader.
pub struct ChunkReader<R = io::BufReader<fs::File>> {
    reader: R,
    encoding: Encoding,
    line: Vec<u8>,
    dropped_lines: u64,
}

impl ChunkReader {
    /// Opens a chunk file for reading.
    pub fn open(path: &Path, encoding: Encoding, buf_size: Option<usize>) -> Result<Self, SortError> {
        let file = fs::File::open(path)?;
        let reader = io::BufReader::with_capacity(buf_size.unwrap_or(DEFAULT_BUF_SIZE), file);

        return Ok(ChunkReader::new(reader, encoding));
    }
}

impl<R: BufRead> ChunkReader<R> {
    /// Creates a reader over an already buffered source.
    pub fn new(reader: R, encoding: Encoding) -> Self {
        ChunkReader {
            reader,
            encoding,
            line: Vec::new(),
            dropped_lines: 0,
        }
    }

    /// Reads the next record. Returns [`None`] when the stream is exhausted.
    pub fn read_next(&mut self) -> Result<Option<Record>, SortError> {
        match self.encoding {
            Encoding::Textual => self.read_textual(),
            Encoding::Compact => self.read_compact(),
        }
    }

    /// Number of lines skipped because they have no `.` separator.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    fn read_textual(&mut self) -> Result<Option<Record>, SortError> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }

            let line = match self.line.strip_suffix(b"\n") {
                Some(line) => line,
                None => &self.line[..],
            };

            match Record::encode(line)? {
                Some(record) => return Ok(Some(record)),
                None => {
                    log::trace!("dropping line without separator");
                    self.dropped_lines += 1;
                }
            }
        }
    }

    fn read_compact(&mut self) -> Result<Option<Record>, SortError> {
        let mut length = [0u8; LENGTH_LEN];
        let n = read_full(&mut self.reader, &mut length)?;
        if n == 0 {
            return Ok(None);
        }
        if n < LENGTH_LEN {
            return Err(SortError::FormatError(format!(
                "length prefix truncated to {} bytes",
                n
            )));
        }

        let length = u32::from_be_bytes(length) as usize;
        let mut bytes = Vec::new();
        let n = (&mut self.reader).take(length as u64).read_to_end(&mut bytes)?;
        if n < length {
            return Err(SortError::FormatError(format!(
                "record truncated to {} of {} bytes",
                n, length
            )));
        }

        return Record::from_encoded(bytes).map(Some);
    }
}

impl<R: BufRead> Iterator for ChunkReader<R> {
    type Item = Result<Record, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

/// Reads until `buf` is full or the stream ends, returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    return Ok(total);
}

/// Sequential record writer.
pub struct ChunkWriter<W: Write = fs::File> {
    writer: io::BufWriter<W>,
    encoding: Encoding,
}

impl ChunkWriter {
    /// Creates (or truncates) a chunk file for writing.
    pub fn create(path: &Path, encoding: Encoding, buf_size: Option<usize>) -> Result<Self, SortError> {
        let file = fs::File::create(path)?;

        return Ok(ChunkWriter::new(file, encoding, buf_size));
    }
}

impl<W: Write> ChunkWriter<W> {
    /// Creates a writer over an arbitrary sink.
    pub fn new(inner: W, encoding: Encoding, buf_size: Option<usize>) -> Self {
        ChunkWriter {
            writer: io::BufWriter::with_capacity(buf_size.unwrap_or(DEFAULT_BUF_SIZE), inner),
            encoding,
        }
    }

    /// Writes a record. Returns the number of bytes it occupies in the file.
    pub fn write_next(&mut self, record: &Record) -> Result<usize, SortError> {
        match self.encoding {
            Encoding::Textual => {
                let (key, payload) = record.decode();
                let key = key.to_string();
                self.writer.write_all(key.as_bytes())?;
                self.writer.write_all(payload)?;
                self.writer.write_all(b"\n")?;

                Ok(key.len() + payload.len() + 1)
            }
            Encoding::Compact => {
                let bytes = record.as_bytes();
                let length = u32::try_from(bytes.len()).map_err(|_| {
                    SortError::FormatError(format!("record of {} bytes does not fit a length prefix", bytes.len()))
                })?;
                self.writer.write_all(&length.to_be_bytes())?;
                self.writer.write_all(bytes)?;

                Ok(LENGTH_LEN + bytes.len())
            }
        }
    }

    /// Flushes buffered records and releases the sink.
    pub fn finish(self) -> Result<W, SortError> {
        self.writer.into_inner().map_err(|err| SortError::IO(err.into_error()))
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::{ChunkReader, ChunkWriter, Encoding};
    use crate::error::SortError;
    use crate::record::Record;

    fn records(lines: &[&str]) -> Vec<Record> {
        lines
            .iter()
            .map(|line| Record::encode(line.as_bytes()).unwrap().unwrap())
            .collect()
    }

    fn read_all(data: &[u8], encoding: Encoding) -> Result<Vec<Record>, SortError> {
        ChunkReader::new(io::Cursor::new(data), encoding).collect()
    }

    #[rstest]
    #[case(b"3.c\n1.a\n2.b\n", vec!["3.c", "1.a", "2.b"])]
    #[case(b"3.c\n1.a\n2.b", vec!["3.c", "1.a", "2.b"])]
    #[case(b"", vec![])]
    #[case(b"\n\n", vec![])]
    #[case(b"1.a\nmalformed\n2.b\n", vec!["1.a", "2.b"])]
    #[case(b"10. dots. everywhere.\n", vec!["10. dots. everywhere."])]
    fn test_textual_reader(#[case] data: &[u8], #[case] expected: Vec<&str>) {
        assert_eq!(read_all(data, Encoding::Textual).unwrap(), records(&expected));
    }

    #[test]
    fn test_textual_reader_counts_dropped_lines() {
        let mut reader = ChunkReader::new(io::Cursor::new(&b"nope\n1.a\n\nstill nope"[..]), Encoding::Textual);

        assert_eq!(reader.read_next().unwrap(), Some(records(&["1.a"]).remove(0)));
        assert_eq!(reader.read_next().unwrap(), None);
        assert_eq!(reader.dropped_lines(), 3);
    }

    #[test]
    fn test_textual_reader_invalid_key() {
        let result = read_all(b"1.a\nx.b\n", Encoding::Textual);
        assert!(matches!(result, Err(SortError::ParseError { .. })));
    }

    #[rstest]
    #[case(Encoding::Textual)]
    #[case(Encoding::Compact)]
    fn test_writer_reader(#[case] encoding: Encoding) {
        let saved = records(&["5.five", "0.", "123. spaced . payload", "5.five"]);

        let mut writer = ChunkWriter::new(Vec::new(), encoding, None);
        let mut written = 0;
        for record in &saved {
            written += writer.write_next(record).unwrap();
        }
        let data = writer.finish().unwrap();
        assert_eq!(written, data.len());

        assert_eq!(read_all(&data, encoding).unwrap(), saved);
    }

    #[test]
    fn test_writer_formats() {
        let saved = records(&["007.a"]);

        let mut writer = ChunkWriter::new(Vec::new(), Encoding::Textual, None);
        assert_eq!(writer.write_next(&saved[0]).unwrap(), 4);
        assert_eq!(writer.finish().unwrap(), b"7.a\n".to_vec());

        let mut writer = ChunkWriter::new(Vec::new(), Encoding::Compact, None);
        assert_eq!(writer.write_next(&saved[0]).unwrap(), 10);
        assert_eq!(writer.finish().unwrap(), vec![0, 0, 0, 6, 0, 0, 0, 7, b'.', b'a']);
    }

    #[test]
    fn test_compact_reader_oversized_length() {
        let mut data = u32::MAX.to_be_bytes().to_vec();
        data.extend_from_slice(&[0, 0, 0, 1, b'.']);

        let result = read_all(&data, Encoding::Compact);
        assert!(
            matches!(&result, Err(SortError::FormatError(msg)) if msg == "record truncated to 5 of 4294967295 bytes"),
            "{:?}",
            result
        );
    }

    #[rstest]
    #[case(vec![0, 0])]
    #[case(vec![0, 0, 0, 6, 0, 0, 0])]
    #[case(vec![0, 0, 0, 2, 0, 0])]
    fn test_compact_reader_truncated(#[case] data: Vec<u8>) {
        let result = read_all(&data, Encoding::Compact);
        assert!(matches!(result, Err(SortError::FormatError(_))), "{:?}", result);
    }
}
