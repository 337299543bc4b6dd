//! Line sources feeding the tokenizer
//!
//! A [`LineSource`] hands out successive chunks of Timemap text and can be
//! closed. Acquiring one (opening a file, fetching a URI-T) is the caller's
//! business; the tokenizer only pulls lines and releases the source.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Producer of successive lines of Timemap text
pub trait LineSource {
    /// Next line including its terminator, or `None` once exhausted.
    fn next_line(&mut self) -> std::io::Result<Option<String>>;

    /// Release the underlying handle. Called exactly once by the tokenizer.
    fn close(&mut self) {}
}

/// Line source over any buffered reader
///
/// Lines are decoded as UTF-8, falling back to Latin-1 for lines that are not
/// valid UTF-8. The reader is dropped on `close`.
pub struct ReaderSource<R: BufRead> {
    reader: Option<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        ReaderSource {
            reader: Some(reader),
            buf: Vec::new(),
        }
    }

    /// True while the reader is still held.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

impl ReaderSource<BufReader<File>> {
    /// Open a Timemap file for reading.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(ReaderSource::new(BufReader::new(file)))
    }
}

impl<'a> ReaderSource<&'a [u8]> {
    /// Line source over in-memory text.
    pub fn from_text(text: &'a str) -> Self {
        ReaderSource::new(text.as_bytes())
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        self.buf.clear();
        if reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(decode_line(&self.buf)))
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// UTF-8 with a byte-preserving Latin-1 fallback.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
