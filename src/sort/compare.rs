/// Comparison functions for the ordering modes.
/// All comparison functions are allocation-free; they run inside every
/// batch sort and on every merge step.
use std::cmp::Ordering;

use super::key::extract_key;

/// Which ordering is applied to the (optionally trimmed, key-extracted) text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderMode {
    #[default]
    Lexical,
    Numeric,
    HumanNumeric,
    Month,
}

/// Mode flags as given on the command line, before validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeFlags {
    pub numeric: bool,
    pub human_numeric: bool,
    pub month: bool,
}

impl ModeFlags {
    /// Resolve the flags to exactly one mode.
    ///
    /// At most one of {h, M, n} may be set; the error names the first
    /// conflicting pair in GNU canonical order.
    pub fn resolve(&self) -> Result<OrderMode, String> {
        let mut active: Vec<(char, OrderMode)> = Vec::new();
        if self.human_numeric {
            active.push(('h', OrderMode::HumanNumeric));
        }
        if self.month {
            active.push(('M', OrderMode::Month));
        }
        if self.numeric {
            active.push(('n', OrderMode::Numeric));
        }
        match active.as_slice() {
            [] => Ok(OrderMode::Lexical),
            [(_, mode)] => Ok(*mode),
            [(a, _), (b, _), ..] => Err(format!("options '-{}{}' are incompatible", a, b)),
        }
    }
}

/// Immutable comparator configuration, built once before any I/O.
#[derive(Debug, Clone, Default)]
pub struct SortConfig {
    pub mode: OrderMode,
    pub reverse: bool,
    pub unique: bool,
    pub ignore_leading_blanks: bool,
    /// 0-based whitespace-delimited field to compare instead of the whole line.
    pub key: Option<usize>,
    /// Disable the last-resort whole-line comparison.
    pub stable: bool,
}

impl SortConfig {
    #[inline]
    pub fn key_mode(&self) -> bool {
        self.key.is_some()
    }

    /// Compare two lines under this configuration.
    #[inline]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        compare_lines(a, b, self)
    }

    /// True if `line` has an empty key in key mode. The merge writes an
    /// empty line for each of these instead of the line itself.
    pub fn is_deferred(&self, line: &[u8]) -> bool {
        match self.key {
            Some(index) => {
                let line = if self.ignore_leading_blanks {
                    skip_leading_blanks(line)
                } else {
                    line
                };
                extract_key(line, index).is_empty()
            }
            None => false,
        }
    }
}

/// Strip leading blanks (space and tab).
#[inline]
pub fn skip_leading_blanks(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && (s[i] == b' ' || s[i] == b'\t') {
        i += 1;
    }
    &s[i..]
}

#[inline]
fn skip_whitespace(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_whitespace() {
        i += 1;
    }
    &s[i..]
}

/// Compare two byte slices lexicographically (default sort).
#[inline]
pub fn compare_lexical(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Parse the leading run of ASCII digits, after optional whitespace.
/// Returns `None` if there are no digits or the value overflows.
pub fn leading_integer(s: &[u8]) -> Option<u64> {
    let s = skip_whitespace(s);
    let mut n: u64 = 0;
    let mut digits = 0;
    for &b in s.iter().take_while(|b| b.is_ascii_digit()) {
        n = n.checked_mul(10)?.checked_add((b - b'0') as u64)?;
        digits += 1;
    }
    if digits == 0 { None } else { Some(n) }
}

/// Numeric sort (-n): lines with a leading integer come first, ordered by
/// value; equal values and lines without a number compare lexically.
pub fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    match (leading_integer(a), leading_integer(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Unit multipliers for K, M, G, T, P, E (powers of 1024).
const BINARY_UNITS: [f64; 6] = [
    1024.0,
    1024.0 * 1024.0,
    1024.0 * 1024.0 * 1024.0,
    1024.0 * 1024.0 * 1024.0 * 1024.0,
    1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
    1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
];

/// Parse `DIGITS[.DIGITS][UNIT]` at the start of the line, after optional
/// whitespace, into a byte count.
pub fn parse_human_size(s: &[u8]) -> Option<f64> {
    let s = skip_whitespace(s);
    let int_end = s.iter().take_while(|b| b.is_ascii_digit()).count();
    if int_end == 0 {
        return None;
    }
    let mut end = int_end;
    if s.get(end) == Some(&b'.') {
        let frac = s[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if frac > 0 {
            end += 1 + frac;
        }
    }
    // The matched prefix is pure ASCII digits and at most one dot.
    let text = std::str::from_utf8(&s[..end]).ok()?;
    let value: f64 = text.parse().ok()?;
    let multiplier = match s.get(end).map(|b| b.to_ascii_uppercase()) {
        Some(b'K') => BINARY_UNITS[0],
        Some(b'M') => BINARY_UNITS[1],
        Some(b'G') => BINARY_UNITS[2],
        Some(b'T') => BINARY_UNITS[3],
        Some(b'P') => BINARY_UNITS[4],
        Some(b'E') => BINARY_UNITS[5],
        _ => 1.0,
    };
    Some(value * multiplier)
}

/// Human numeric sort (-h): handles suffixes K, M, G, T, P, E.
pub fn compare_human_numeric(a: &[u8], b: &[u8]) -> Ordering {
    match (parse_human_size(a), parse_human_size(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Month rank of the first three characters: 1..=12, or 0 when unknown.
pub fn parse_month(s: &[u8]) -> u8 {
    let s = skip_leading_blanks(s);
    if s.len() < 3 {
        return 0;
    }
    let m = [
        s[0].to_ascii_uppercase(),
        s[1].to_ascii_uppercase(),
        s[2].to_ascii_uppercase(),
    ];
    match &m {
        b"JAN" => 1,
        b"FEB" => 2,
        b"MAR" => 3,
        b"APR" => 4,
        b"MAY" => 5,
        b"JUN" => 6,
        b"JUL" => 7,
        b"AUG" => 8,
        b"SEP" => 9,
        b"OCT" => 10,
        b"NOV" => 11,
        b"DEC" => 12,
        _ => 0,
    }
}

/// Month sort (-M): (unknown) < JAN < ... < DEC.
pub fn compare_month(a: &[u8], b: &[u8]) -> Ordering {
    parse_month(a)
        .cmp(&parse_month(b))
        .then_with(|| a.cmp(b))
}

/// Dispatch to the mode's comparison, without reverse.
#[inline]
pub fn compare_by_mode(a: &[u8], b: &[u8], mode: OrderMode) -> Ordering {
    match mode {
        OrderMode::Lexical => compare_lexical(a, b),
        OrderMode::Numeric => compare_numeric(a, b),
        OrderMode::HumanNumeric => compare_human_numeric(a, b),
        OrderMode::Month => compare_month(a, b),
    }
}

/// Master comparison: blank-trim, key extraction, mode comparison, then the
/// last-resort whole-line comparison unless stable. Reverse is applied once,
/// here.
pub fn compare_lines(a: &[u8], b: &[u8], config: &SortConfig) -> Ordering {
    let (ta, tb) = if config.ignore_leading_blanks {
        (skip_leading_blanks(a), skip_leading_blanks(b))
    } else {
        (a, b)
    };
    let (ka, kb) = match config.key {
        Some(index) => (extract_key(ta, index), extract_key(tb, index)),
        None => (ta, tb),
    };

    let mut result = compare_by_mode(ka, kb, config.mode);
    if result == Ordering::Equal && !config.stable {
        result = a.cmp(b);
    }

    if config.reverse {
        result.reverse()
    } else {
        result
    }
}
