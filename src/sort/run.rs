/// Sorted runs: one batch of lines, sorted and persisted to a temporary file.
///
/// In key mode a run also records how many of its lines have a blank key.
/// The merge writes that many empty lines in place of those lines, ahead of
/// the rest of the output (or after it when reversed), so the total has to
/// be known before the first merged line goes out.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempPath;

use super::compare::SortConfig;
use super::error::{CleanupError, SortError};
use crate::common::io::READ_BUF_SIZE;

/// An input line without its terminator.
pub type Line = Vec<u8>;

/// Name prefix of every run file.
pub const RUN_PREFIX: &str = "chunk_";

const WRITE_BUF_SIZE: usize = 256 * 1024;

/// Handle to one persisted, sorted batch. The backing file is removed
/// exactly once: by [`Run::remove`], or on drop if the job unwinds.
#[derive(Debug)]
pub struct Run {
    path: TempPath,
    len: usize,
    deferred: usize,
}

impl Run {
    /// Stable-sort `batch` under `config` and write it to a new file in `dir`.
    ///
    /// If writing fails the partial file is deleted before returning.
    pub fn create(mut batch: Vec<Line>, config: &SortConfig, dir: &Path) -> io::Result<Run> {
        batch.sort_by(|a, b| config.compare(a, b));
        let deferred = if config.key_mode() {
            batch.iter().filter(|line| config.is_deferred(line)).count()
        } else {
            0
        };

        let (file, path) = tempfile::Builder::new()
            .prefix(RUN_PREFIX)
            .tempfile_in(dir)?
            .into_parts();

        let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, file);
        for line in &batch {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);

        Ok(Run {
            path,
            len: batch.len(),
            deferred,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of blank-key lines in this run (key mode only).
    pub fn deferred(&self) -> usize {
        self.deferred
    }

    /// Open the backing file for sequential reading.
    pub fn open(&self) -> Result<RunReader, SortError> {
        let file = File::open(&self.path).map_err(|source| SortError::MergeIo {
            path: self.path.to_path_buf(),
            source,
        })?;
        Ok(RunReader {
            path: self.path.to_path_buf(),
            reader: BufReader::with_capacity(READ_BUF_SIZE, file),
        })
    }

    /// Delete the backing file.
    pub fn remove(self) -> Result<(), CleanupError> {
        let path = self.path.to_path_buf();
        self.path
            .close()
            .map(|()| debug!("removed run {}", path.display()))
            .map_err(|source| CleanupError { path, source })
    }
}

/// Forward-only reader over a run file.
pub struct RunReader {
    path: PathBuf,
    reader: BufReader<File>,
}

impl RunReader {
    /// Next line, or `None` at end of file. Only the `\n` terminator is
    /// removed; run files store lines verbatim.
    pub fn next_line(&mut self) -> Result<Option<Line>, SortError> {
        let mut buf = Vec::with_capacity(128);
        let n = self
            .reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| SortError::MergeIo {
                path: self.path.clone(),
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(Some(buf))
    }
}
