use std::ops::Range;

/// Splits off up to `n` whitespace-delimited fields from the left of `s`.
/// Returns the fields and the untouched remainder (leading whitespace
/// stripped, inner whitespace preserved). Only ASCII whitespace separates
/// fields.
pub fn split_left(s: &str, n: usize) -> (Vec<&str>, &str) {
    let (fields, rest) = left_ranges(s.as_bytes(), n);
    (fields.into_iter().map(|r| &s[r]).collect(), &s[rest..])
}

/// `split_left` over raw bytes, for input that need not be UTF-8.
pub fn split_left_bytes(s: &[u8], n: usize) -> (Vec<&[u8]>, &[u8]) {
    let (fields, rest) = left_ranges(s, n);
    (fields.into_iter().map(|r| &s[r]).collect(), &s[rest..])
}

/// Mirror of `split_left_bytes`: takes up to `n` fields from the right of
/// `s`. Fields are returned in left-to-right order.
pub fn split_right_bytes(s: &[u8], n: usize) -> (&[u8], Vec<&[u8]>) {
    let (rest, fields) = right_ranges(s, n);
    (&s[..rest], fields.into_iter().map(|r| &s[r]).collect())
}

// Field ranges plus the start of the remainder. Splitting only at ASCII
// bytes keeps every boundary on a UTF-8 char boundary.
fn left_ranges(s: &[u8], n: usize) -> (Vec<Range<usize>>, usize) {
    let mut fields = Vec::with_capacity(n);
    let mut pos = skip_ws(s, 0);
    while fields.len() < n && pos < s.len() {
        let end = s[pos..]
            .iter()
            .position(u8::is_ascii_whitespace)
            .map_or(s.len(), |i| pos + i);
        fields.push(pos..end);
        pos = skip_ws(s, end);
    }
    (fields, pos)
}

// End of the remainder plus field ranges, left to right.
fn right_ranges(s: &[u8], n: usize) -> (usize, Vec<Range<usize>>) {
    let mut fields = Vec::with_capacity(n);
    let mut end = trim_ws_end(s, s.len());
    while fields.len() < n && end > 0 {
        let start = s[..end]
            .iter()
            .rposition(u8::is_ascii_whitespace)
            .map_or(0, |i| i + 1);
        fields.push(start..end);
        end = trim_ws_end(s, start);
    }
    fields.reverse();
    (end, fields)
}

fn skip_ws(s: &[u8], mut pos: usize) -> usize {
    while pos < s.len() && s[pos].is_ascii_whitespace() { pos += 1; }
    pos
}

fn trim_ws_end(s: &[u8], mut end: usize) -> usize {
    while end > 0 && s[end - 1].is_ascii_whitespace() { end -= 1; }
    end
}
