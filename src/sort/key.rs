/// Key definition parsing and field extraction for `sort -k`.
///
/// KEYDEF format accepted here: FIELD or FIELD,FIELD (a single field).
/// Fields are 1-indexed on the command line and stored 0-indexed.

/// Parse a KEYDEF string like "2" or "2,2" into a 0-based field index.
pub fn parse_key(spec: &str) -> Result<usize, String> {
    let mut parts = spec.splitn(2, ',');
    let start = parse_field(parts.next().unwrap_or(""), spec)?;
    if let Some(end) = parts.next() {
        let end = parse_field(end, spec)?;
        if end != start {
            return Err(format!(
                "invalid key specification '{}': only single-field keys are supported",
                spec
            ));
        }
    }
    Ok(start - 1)
}

fn parse_field(s: &str, spec: &str) -> Result<usize, String> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid number at field start: invalid count at start of '{}'", spec));
    }
    let field = s
        .parse::<usize>()
        .map_err(|_| format!("invalid field number in '{}'", spec))?;
    if field == 0 {
        return Err(format!("field number is zero: invalid field specification '{}'", spec));
    }
    Ok(field)
}

/// Blank for field splitting: space, tab, and the other ASCII whitespace.
#[inline]
fn is_field_blank(b: u8) -> bool {
    b.is_ascii_whitespace()
}

/// Extract the `index`-th (0-based) whitespace-delimited field.
/// Runs of whitespace separate fields; leading whitespace never starts an
/// empty field. An out-of-range index yields an empty key.
/// Allocation-free.
pub fn extract_key(line: &[u8], index: usize) -> &[u8] {
    line.split(|&b| is_field_blank(b))
        .filter(|f| !f.is_empty())
        .nth(index)
        .unwrap_or(&[])
}
