#![forbid(unsafe_code)]

//! Indian registration plate checks.
//!
//! Accepted shapes once separators are stripped: `RRNNLLNNNN`,
//! `RRNNLNNNN` and `RRNNNNNN` (region letters, district digits, optional
//! series letters, serial digits).

/// Uppercase `raw` and drop everything that is not ASCII alphanumeric.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// The dash-separated form of `raw` if it is a valid plate.
pub fn validate(raw: &str) -> Option<String> {
    let text = normalize(raw);
    let bytes = text.as_bytes();
    let letters = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_uppercase);
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);

    if bytes.len() < 8 || bytes.len() > 10 || !letters(0..2) || !digits(2..4) {
        return None;
    }
    let series = bytes.len() - 8;
    if !letters(4..4 + series) || !digits(4 + series..bytes.len()) {
        return None;
    }

    let (region, rest) = text.split_at(2);
    let (district, rest) = rest.split_at(2);
    if series == 0 {
        Some(format!("{region}-{district}-{rest}"))
    } else {
        let (series, serial) = rest.split_at(series);
        Some(format!("{region}-{district}-{series}-{serial}"))
    }
}

pub fn is_valid(raw: &str) -> bool {
    validate(raw).is_some()
}
