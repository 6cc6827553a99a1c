//! Delimiter escaping for the edit corpus.
//!
//! Escaping doubles every delimiter byte, so escaped text only ever contains even-length runs
//! of that delimiter. A run of odd length therefore can't come from escaped content: its last
//! byte is a structural separator. This lets records be concatenated without length prefixes
//! and still be split unambiguously.

use std::iter::repeat_n;
use std::ops::Range;

use memchr::{memchr, memchr_iter};

use super::error::CounterError;

/// Separates records and values in the corpus.
pub const DELIM1: u8 = 0xff;
/// Used only inside the position key prefix.
pub const DELIM2: u8 = 0xfe;

/// Double every occurrence of `delim`.
pub fn escape(bytes: &[u8], delim: u8) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len() + bytes.len() / 8);
    let mut last = 0;
    for hit in memchr_iter(delim, bytes) {
        escaped.extend_from_slice(&bytes[last..=hit]);
        escaped.push(delim);
        last = hit + 1;
    }
    escaped.extend_from_slice(&bytes[last..]);
    escaped
}

/// Inverse of [`escape`]. A run of `2k` delimiters decodes to `k` literal delimiters, a run of
/// odd length is a separator and can't appear inside escaped content.
pub fn unescape(bytes: &[u8], delim: u8) -> Result<Vec<u8>, CounterError> {
    let mut unescaped = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while let Some(hit) = memchr(delim, &bytes[pos..]) {
        let start = pos + hit;
        unescaped.extend_from_slice(&bytes[pos..start]);

        let run = run_length(bytes, start, delim);
        if run % 2 != 0 {
            return Err(CounterError::Encoding(format!(
                "Unexpected separator (run of {} x {:#04x}) at offset {} of escaped text",
                run, delim, start
            )));
        }
        unescaped.extend(repeat_n(delim, run / 2));
        pos = start + run;
    }
    unescaped.extend_from_slice(&bytes[pos..]);
    Ok(unescaped)
}

/// Escape both delimiters. The two passes touch disjoint bytes, so their order is irrelevant.
pub fn escape_delims(bytes: &[u8]) -> Vec<u8> {
    escape(&escape(bytes, DELIM1), DELIM2)
}

/// Inverse of [`escape_delims`].
pub fn unescape_delims(bytes: &[u8]) -> Result<Vec<u8>, CounterError> {
    unescape(&unescape(bytes, DELIM2)?, DELIM1)
}

/// Locate the first odd-length run of `delim` in `bytes`.
///
/// A run touching the end of `bytes` may continue beyond it and is only reported when
/// `at_end` says that `bytes` reaches the end of the text. Returns `None` when more input is
/// needed to find the boundary (or, with `at_end`, when there is none).
pub fn find_boundary(bytes: &[u8], delim: u8, at_end: bool) -> Option<Range<usize>> {
    let mut pos = 0;
    while let Some(hit) = memchr(delim, &bytes[pos..]) {
        let start = pos + hit;
        let end = start + run_length(bytes, start, delim);
        if end == bytes.len() && !at_end {
            return None;
        }
        if (end - start) % 2 != 0 {
            return Some(start..end);
        }
        pos = end;
    }
    None
}

fn run_length(bytes: &[u8], start: usize, delim: u8) -> usize {
    bytes[start..].iter().take_while(|&&x| x == delim).count()
}
