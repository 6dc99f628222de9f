/// Input sources for the sort engine: named files or stdin, streamed as
/// lines with the terminator removed.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::sort::{Line, SortError};

/// Read buffer for input sources and Run files.
pub const READ_BUF_SIZE: usize = 256 * 1024;

/// Display name used for standard input.
pub const STDIN_NAME: &str = "-";

/// A named, buffered line source.
pub struct InputSource {
    name: String,
    reader: Box<dyn BufRead + Send>,
}

impl InputSource {
    /// Open `name` for reading; `-` means standard input.
    pub fn open(name: &str) -> Result<Self, SortError> {
        if name == STDIN_NAME {
            return Ok(Self::stdin());
        }
        let file = File::open(Path::new(name)).map_err(|e| SortError::input(name, e))?;
        Ok(InputSource {
            name: name.to_string(),
            reader: Box::new(BufReader::with_capacity(READ_BUF_SIZE, file)),
        })
    }

    pub fn stdin() -> Self {
        InputSource {
            name: STDIN_NAME.to_string(),
            reader: Box::new(BufReader::with_capacity(READ_BUF_SIZE, io::stdin())),
        }
    }

    /// Wrap an arbitrary reader, e.g. an in-memory buffer.
    pub fn from_reader<R: BufRead + Send + 'static>(name: &str, reader: R) -> Self {
        InputSource {
            name: name.to_string(),
            reader: Box::new(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream the source's lines; read failures surface as `SortError::Input`.
    pub fn lines(self) -> SourceLines<Box<dyn BufRead + Send>> {
        SourceLines {
            name: self.name,
            reader: self.reader,
            done: false,
        }
    }
}

/// Iterator over the lines of one source.
pub struct SourceLines<R> {
    name: String,
    reader: R,
    done: bool,
}

impl<R: BufRead> Iterator for SourceLines<R> {
    type Item = Result<Line, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_line(&mut self.reader) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(SortError::input(&self.name, e)))
            }
        }
    }
}

/// Read one `\n`-terminated line, dropping the terminator and a trailing CR.
/// Returns `None` at end of input.
pub fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<Line>> {
    let mut buf = Vec::with_capacity(128);
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(buf))
}

/// Open every named source up front and chain their lines in order.
///
/// Opening eagerly reports a missing file before any Run is written.
pub fn open_all(names: &[String]) -> Result<Vec<InputSource>, SortError> {
    names.iter().map(|n| InputSource::open(n)).collect()
}

/// Chain the lines of several sources into one stream.
pub fn chain_lines(sources: Vec<InputSource>) -> impl Iterator<Item = Result<Line, SortError>> {
    sources.into_iter().flat_map(InputSource::lines)
}
