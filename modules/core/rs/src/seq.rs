//! Nucleotide helpers shared by the alignment model.

/// Complement of a single IUPAC nucleotide code. Case is preserved; unknown symbols are
/// returned unchanged.
pub fn complement(symbol: u8) -> u8 {
    match symbol {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'a' => b't',
        b't' | b'u' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'r' => b'y',
        b'y' => b'r',
        b'k' => b'm',
        b'm' => b'k',
        b'b' => b'v',
        b'v' => b'b',
        b'd' => b'h',
        b'h' => b'd',
        // S, W, N, gaps and anything else are their own complement
        other => other,
    }
}

/// Reverse complement of a nucleotide string. Non-ASCII input is never produced by the
/// complement table, so the result stays valid UTF-8 for ASCII input.
pub fn reverse_complement_str(seq: &str) -> String {
    if seq.is_ascii() {
        seq.bytes().rev().map(|x| complement(x) as char).collect()
    } else {
        seq.chars()
            .rev()
            .map(|x| {
                if x.is_ascii() {
                    complement(x as u8) as char
                } else {
                    x
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement() {
        assert_eq!(complement(b'A'), b'T');
        assert_eq!(complement(b'g'), b'c');
        assert_eq!(complement(b'N'), b'N');
        assert_eq!(complement(b'R'), b'Y');
        assert_eq!(complement(b'-'), b'-');
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement_str("ACCGTn"), "nACGGT");
        assert_eq!(reverse_complement_str(""), "");
        assert_eq!(reverse_complement_str("GATTACA"), "TGTAATC");
        assert_eq!(
            reverse_complement_str(&reverse_complement_str("AcgTRYkmN")),
            "AcgTRYkmN"
        );
    }
}
