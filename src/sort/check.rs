/// Check mode (`-c`): verify that a source is already ordered, holding only
/// the previous line.
use std::cmp::Ordering;
use std::fmt;

use super::compare::SortConfig;
use super::error::SortError;
use super::run::Line;

/// First out-of-order line of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disorder {
    pub source: String,
    /// 1-based.
    pub line_number: u64,
    pub line: Line,
}

impl fmt::Display for Disorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: disorder: {}",
            self.source,
            self.line_number,
            String::from_utf8_lossy(&self.line)
        )
    }
}

/// Scan `lines` and return the first disorder, or `None` if ordered.
///
/// With unique set, a line equal to its predecessor is a disorder too.
pub fn check_sorted<I>(
    lines: I,
    source: &str,
    config: &SortConfig,
) -> Result<Option<Disorder>, SortError>
where
    I: IntoIterator<Item = Result<Line, SortError>>,
{
    let mut prev: Option<Line> = None;
    let mut line_number: u64 = 0;

    for line in lines {
        let line = line?;
        line_number += 1;
        if let Some(p) = &prev {
            let bad = (config.unique && line == *p)
                || config.compare(&line, p) == Ordering::Less;
            if bad {
                return Ok(Some(Disorder {
                    source: source.to_string(),
                    line_number,
                    line,
                }));
            }
        }
        prev = Some(line);
    }
    Ok(None)
}
