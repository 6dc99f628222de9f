/// K-way merge of sorted runs into the final output stream.
///
/// The smallest current line wins; ties go to the lowest run index, which is
/// what a first-wins linear scan over the runs would pick. In key mode a
/// winning line with a blank key is not written in its merge position. An
/// empty line stands in for each of them, all written before the merged
/// output, or after it when reversed.
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io::Write;

use log::{info, warn};

use super::compare::SortConfig;
use super::error::SortError;
use super::run::{Line, Run};

/// 4MB buffer for output, reduces flush frequency for large inputs.
const OUTPUT_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Counters for one merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Lines written to the sink, empty stand-ins included.
    pub emitted: u64,
    /// Lines dropped by unique mode.
    pub suppressed: u64,
    /// Blank-key lines replaced by an empty line (key mode).
    pub deferred: u64,
}

/// Heap entry: the current line of run `cursor`. Ordered by the job's line
/// order, then by run index.
struct HeapEntry<'a> {
    line: Line,
    cursor: usize,
    config: &'a SortConfig,
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry<'_> {}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.config
            .compare(&self.line, &other.line)
            .then_with(|| self.cursor.cmp(&other.cursor))
    }
}

/// Buffered output with unique-mode suppression.
struct Emitter<'w, W: Write> {
    out: &'w mut W,
    buf: Vec<u8>,
    unique: bool,
    prev: Option<Line>,
    stats: MergeStats,
}

impl<'w, W: Write> Emitter<'w, W> {
    fn new(out: &'w mut W, unique: bool) -> Self {
        Emitter {
            out,
            buf: Vec::with_capacity(64 * 1024),
            unique,
            prev: None,
            stats: MergeStats::default(),
        }
    }

    fn flush_if_full(&mut self) -> Result<(), SortError> {
        if self.buf.len() >= OUTPUT_BUF_SIZE {
            self.out.write_all(&self.buf).map_err(SortError::Output)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Emit a merge winner, subject to unique suppression.
    fn emit(&mut self, line: Line) -> Result<(), SortError> {
        if self.unique && self.prev.as_deref() == Some(line.as_slice()) {
            self.stats.suppressed += 1;
            return Ok(());
        }
        self.buf.extend_from_slice(&line);
        self.buf.push(b'\n');
        self.stats.emitted += 1;
        self.flush_if_full()?;
        if self.unique {
            self.prev = Some(line);
        }
        Ok(())
    }

    /// Write `count` empty lines. Never suppressed and never remembered as
    /// the previous line.
    fn blank_lines(&mut self, count: u64) -> Result<(), SortError> {
        for _ in 0..count {
            self.buf.push(b'\n');
            self.stats.emitted += 1;
            self.flush_if_full()?;
        }
        Ok(())
    }

    fn finish(self) -> Result<MergeStats, SortError> {
        if !self.buf.is_empty() {
            self.out.write_all(&self.buf).map_err(SortError::Output)?;
        }
        self.out.flush().map_err(SortError::Output)?;
        Ok(self.stats)
    }
}

/// Merge all `runs` into `out` under `config`.
///
/// Every run must have been created under the same `config`. Output already
/// written stays written if a run read fails midway.
pub fn merge_runs<W: Write>(
    runs: &[Run],
    config: &SortConfig,
    out: &mut W,
) -> Result<MergeStats, SortError> {
    let mut readers = runs
        .iter()
        .map(Run::open)
        .collect::<Result<Vec<_>, _>>()?;

    let mut sink = Emitter::new(out, config.unique);
    let blanks: u64 = runs.iter().map(|r| r.deferred() as u64).sum();
    if !config.reverse {
        sink.blank_lines(blanks)?;
    }

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (i, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = reader.next_line()? {
            heap.push(Reverse(HeapEntry {
                line,
                cursor: i,
                config,
            }));
        }
    }

    let key_mode = config.key_mode();
    let mut deferred: u64 = 0;
    while let Some(Reverse(min)) = heap.pop() {
        let HeapEntry { line, cursor, .. } = min;
        if key_mode && config.is_deferred(&line) {
            deferred += 1;
        } else {
            sink.emit(line)?;
        }
        if let Some(next) = readers[cursor].next_line()? {
            heap.push(Reverse(HeapEntry {
                line: next,
                cursor,
                config,
            }));
        }
    }

    if deferred != blanks {
        warn!(
            "runs recorded {} blank-key lines but the merge saw {}",
            blanks, deferred
        );
    }
    if config.reverse {
        sink.blank_lines(deferred)?;
    }
    sink.stats.deferred = deferred;
    let stats = sink.finish()?;

    info!(
        "merged {} runs: {} lines written, {} suppressed, {} deferred",
        runs.len(),
        stats.emitted,
        stats.suppressed,
        stats.deferred
    );
    Ok(stats)
}
