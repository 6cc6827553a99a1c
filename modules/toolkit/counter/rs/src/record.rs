//! Framing of edit records inside a bin corpus.
//!
//! A record is a position key followed by one edit value:
//!
//! ```text
//! DELIM1 DELIM2 DELIM1 escaped(u64 LE of position + KEY_OFFSET)   <- key
//! DELIM1 escaped(bitcode(edit))                                   <- value
//! ```
//!
//! Escaped bytes only contain even runs of either delimiter, so `DELIM1 DELIM2 DELIM1` can
//! only occur at the start of a key, and the odd `DELIM1` run opening the next record (or the
//! trailing pad of the corpus) terminates a value.

use gracov_alignment_rs::Edit;

use super::error::CounterError;
use super::escape::{escape_delims, unescape_delims, DELIM1, DELIM2};

/// Added to the position before it is written, keeping keys away from the smallest integers.
pub const KEY_OFFSET: u64 = 2;

/// Structural prefix of every position key.
pub const KEY_PREFIX: [u8; 3] = [DELIM1, DELIM2, DELIM1];

pub fn position_key(position: usize) -> Vec<u8> {
    let mut key = KEY_PREFIX.to_vec();
    key.extend(escape_delims(
        &(position as u64 + KEY_OFFSET).to_le_bytes(),
    ));
    key
}

/// Escaped edit payload with its leading separator. Reverse strand edits are stored as their
/// forward strand equivalent.
pub fn edit_value(edit: &Edit, reverse: bool) -> Vec<u8> {
    let payload = if reverse {
        bitcode::encode(&edit.reverse_complement())
    } else {
        bitcode::encode(edit)
    };
    let mut value = vec![DELIM1];
    value.extend(escape_delims(&payload));
    value
}

pub fn record(position: usize, edit: &Edit, reverse: bool) -> Vec<u8> {
    let mut record = position_key(position);
    record.extend(edit_value(edit, reverse));
    record
}

/// Decode an escaped value body, i.e. the bytes between the leading separator and the next
/// odd delimiter run.
pub fn decode_value(body: &[u8]) -> Result<Edit, CounterError> {
    let payload = unescape_delims(body)?;
    bitcode::decode(&payload)
        .map_err(|err| CounterError::Encoding(format!("Can't decode edit payload: {}", err)))
}

/// Decode the position carried by an escaped key body (the bytes after [`KEY_PREFIX`]).
pub fn decode_key(body: &[u8]) -> Result<usize, CounterError> {
    let raw = unescape_delims(body)?;
    let raw: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
        CounterError::Encoding(format!("Position key has {} bytes instead of 8", raw.len()))
    })?;
    u64::from_le_bytes(raw)
        .checked_sub(KEY_OFFSET)
        .map(|x| x as usize)
        .ok_or_else(|| CounterError::Encoding("Position key below the key offset".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::find_boundary;

    #[test]
    fn test_position_key() -> Result<(), CounterError> {
        let key = position_key(12);
        assert_eq!(&key[..3], &KEY_PREFIX);
        assert_eq!(key[3..], [14, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_key(&key[3..])?, 12);

        // Positions whose bytes collide with the delimiters get escaped
        let position = 0xfffe - KEY_OFFSET as usize;
        let key = position_key(position);
        assert_eq!(key[3..], [DELIM2, DELIM2, DELIM1, DELIM1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_key(&key[3..])?, position);
        Ok(())
    }

    #[test]
    fn test_reverse_value_is_normalized() -> Result<(), CounterError> {
        let edit = Edit::substitution("AAC");
        let forward = edit_value(&edit.reverse_complement(), false);
        assert_eq!(edit_value(&edit, true), forward);
        assert_eq!(decode_value(&forward[1..])?, Edit::substitution("GTT"));
        Ok(())
    }

    #[test]
    fn test_record_is_self_delimiting() -> Result<(), CounterError> {
        let edits = [
            Edit::substitution("G"),
            Edit::insertion("ACGTACGT".repeat(40)),
            Edit::deletion(u32::MAX),
        ];
        let mut corpus = Vec::new();
        for (ind, edit) in edits.iter().enumerate() {
            corpus.extend(record(ind * 0xff, edit, false));
        }
        corpus.push(DELIM1);

        // Walk the corpus: key prefix, key body, value, repeat
        let mut cursor = 0;
        for (ind, edit) in edits.iter().enumerate() {
            assert_eq!(corpus[cursor..cursor + 3], KEY_PREFIX);
            let key_len = position_key(ind * 0xff).len();
            cursor += key_len;
            assert_eq!(corpus[cursor], DELIM1);

            let tail = &corpus[cursor + 1..];
            let boundary = find_boundary(tail, DELIM1, true).ok_or_else(|| {
                CounterError::Encoding("No value boundary".to_string())
            })?;
            let body = &tail[..boundary.end - 1];
            assert_eq!(&decode_value(body)?, edit);
            cursor += 1 + body.len();
        }
        assert_eq!(cursor, corpus.len() - 1);
        Ok(())
    }

    #[test]
    fn test_malformed_value() {
        assert!(matches!(
            decode_value(&[DELIM1]),
            Err(CounterError::Encoding(_))
        ));
        assert!(matches!(decode_value(&[]), Err(CounterError::Encoding(_))));
    }
}
