use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::ops::Range;

use eyre::{ensure, eyre, Result};
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Rank, Vector};
use simple_sds::serialize::Serialize;
use simple_sds::sparse_vector::{SparseBuilder, SparseVector};

use super::wavelet_tree::WaveletTree;
use super::{invalid_data, read_u64, suffix_array, write_u64, FullTextIndex};

const SIGMA: usize = 256;
// The sentinel gets its own symbol past the bytes
const SENTINEL: usize = SIGMA;

fn bit_width(max: u64) -> usize {
    (64 - max.leading_zeros() as usize).max(1)
}

fn int_vector(len: usize, max: u64) -> Result<IntVector> {
    IntVector::with_len(len, bit_width(max), 0).map_err(|err| eyre!("{}", err))
}

// counts[c] = number of rows whose suffix starts with a symbol < c, the sentinel row included
fn cumulative(bwt: &WaveletTree) -> Vec<usize> {
    let mut counts = Vec::with_capacity(SIGMA + 1);
    let mut total = 1;
    for symbol in 0..SIGMA {
        counts.push(total);
        total += bwt.count(symbol);
    }
    counts.push(total);
    counts
}

/// FM-index over a byte text with an implicit sentinel.
///
/// The Burrows-Wheeler transform is kept in a Huffman-shaped wavelet tree, so the index takes
/// space close to the zero-order entropy of the text plus the suffix array samples. The text
/// itself is not stored: `extract` decodes it by walking LF-mappings from the nearest sample of
/// the inverse suffix array.
#[derive(Clone, Debug)]
pub struct FmIndex {
    // Text length, the BWT has one extra row for the sentinel suffix
    len: usize,
    // Row of the suffix starting at 0, its BWT slot holds the sentinel
    primary: usize,
    sample_rate: usize,
    bwt: WaveletTree,
    counts: Vec<usize>,
    // Rows whose suffix array value is divisible by the sample rate
    sampled: SparseVector,
    sa_samples: IntVector,
    // isa_samples[k] = row of the suffix starting at k * sample_rate
    isa_samples: IntVector,
}

impl FmIndex {
    fn rows(&self) -> usize {
        self.len + 1
    }

    fn n_samples(&self) -> usize {
        self.len / self.sample_rate + 1
    }

    /// Occurrences of `symbol` in bwt[0..row].
    fn rank(&self, symbol: u8, row: usize) -> usize {
        self.bwt.rank(symbol as usize, row)
    }

    /// Row of the suffix one position to the left. The primary row wraps around to row 0.
    fn lf(&self, row: usize) -> usize {
        match self.bwt.access_rank(row) {
            (SENTINEL, _) => 0,
            (symbol, rank) => self.counts[symbol] + rank,
        }
    }

    /// Range of rows whose suffixes start with the pattern.
    fn backward_search(&self, pattern: &[u8]) -> Range<usize> {
        let (mut sp, mut ep) = (0, self.rows());
        for &symbol in pattern.iter().rev() {
            let base = self.counts[symbol as usize];
            sp = base + self.rank(symbol, sp);
            ep = base + self.rank(symbol, ep);
            if sp >= ep {
                return 0..0;
            }
        }
        sp..ep
    }

    /// Text position of the suffix in the given row.
    fn sa_value(&self, mut row: usize) -> usize {
        let mut steps = 0;
        while !self.sampled.get(row) {
            row = self.lf(row);
            steps += 1;
        }
        self.sa_samples.get(self.sampled.rank(row)) as usize * self.sample_rate + steps
    }

    fn validate(&self) -> io::Result<()> {
        let rows = self.rows();
        let n_samples = self.n_samples();
        let checks = [
            (self.primary < rows, "primary row is out of bounds"),
            (self.bwt.len() == rows, "BWT length doesn't match the text"),
            (self.bwt.count(SENTINEL) == 1, "BWT must hold exactly one sentinel"),
            (
                self.sampled.len() == rows && self.sampled.count_ones() == n_samples,
                "malformed sample marks",
            ),
            (
                self.sa_samples.len() == n_samples && self.sa_samples.width() <= 64,
                "malformed suffix array samples",
            ),
            (
                self.isa_samples.len() == n_samples && self.isa_samples.width() <= 64,
                "malformed inverse suffix array samples",
            ),
        ];
        for (ok, msg) in checks {
            if !ok {
                return Err(invalid_data(format!("FM-index: {}", msg)));
            }
        }

        // Walk the text from its end to its start, which has to pass through every row once
        let (mut row, mut pos) = (0, self.len);
        loop {
            let sampled = self.sampled.get(row);
            if sampled != (pos % self.sample_rate == 0) {
                return Err(invalid_data(format!(
                    "FM-index: sample mark of row {} is wrong",
                    row
                )));
            }
            if sampled {
                let k = pos / self.sample_rate;
                if self.sa_samples.get(self.sampled.rank(row)) != k as u64
                    || self.isa_samples.get(k) != row as u64
                {
                    return Err(invalid_data(format!(
                        "FM-index: samples disagree with the BWT at text position {}",
                        pos
                    )));
                }
            }

            let (symbol, rank) = self.bwt.access_rank(row);
            if pos == 0 {
                if row != self.primary || symbol != SENTINEL {
                    return Err(invalid_data("FM-index: BWT doesn't start at the primary row"));
                }
                return Ok(());
            }
            if symbol == SENTINEL {
                return Err(invalid_data(format!(
                    "FM-index: sentinel found at text position {}",
                    pos
                )));
            }
            row = self.counts[symbol] + rank;
            pos -= 1;
        }
    }
}

impl FullTextIndex for FmIndex {
    fn build(text: &[u8], sample_rate: usize) -> Result<Self> {
        ensure!(sample_rate > 0, "Sample rate must be positive");

        let len = text.len();
        let rows = len + 1;
        let sa = suffix_array::build(text);

        let mut symbols = Vec::with_capacity(rows);
        let mut primary = 0;
        for (row, &pos) in sa.iter().enumerate() {
            if pos == 0 {
                primary = row;
                symbols.push(SENTINEL as u16);
            } else {
                symbols.push(text[pos - 1] as u16);
            }
        }
        let bwt = WaveletTree::build(&symbols, SIGMA + 1)?;
        let counts = cumulative(&bwt);

        let n_samples = len / sample_rate + 1;
        let mut marks = SparseBuilder::new(rows, n_samples).map_err(|err| eyre!("{}", err))?;
        let mut sa_samples = int_vector(n_samples, (len / sample_rate) as u64)?;
        let mut isa_samples = int_vector(n_samples, rows as u64)?;
        let mut next = 0;
        for (row, &pos) in sa.iter().enumerate() {
            if pos % sample_rate == 0 {
                marks.try_set(row).map_err(|err| eyre!("{}", err))?;
                sa_samples.set(next, (pos / sample_rate) as u64);
                isa_samples.set(pos / sample_rate, row as u64);
                next += 1;
            }
        }
        let sampled = SparseVector::try_from(marks).map_err(|err| eyre!("{}", err))?;

        Ok(Self {
            len,
            primary,
            sample_rate,
            bwt,
            counts,
            sampled,
            sa_samples,
            isa_samples,
        })
    }

    fn len(&self) -> usize {
        self.len
    }

    fn locate(&self, pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<usize> = self
            .backward_search(pattern)
            .map(|row| self.sa_value(row))
            .collect();
        hits.sort_unstable();
        hits
    }

    fn count(&self, pattern: &[u8]) -> usize {
        if pattern.is_empty() {
            return 0;
        }
        self.backward_search(pattern).len()
    }

    fn extract(&self, range: Range<usize>) -> Result<Vec<u8>> {
        ensure!(
            range.start <= range.end && range.end <= self.len,
            "Range {:?} is outside of the indexed text of length {}",
            range,
            self.len
        );
        if range.is_empty() {
            return Ok(Vec::new());
        }

        // Start from the closest sampled position at or after the end of the range
        let mut pos = range.end.div_ceil(self.sample_rate) * self.sample_rate;
        let mut row = if pos >= self.len {
            pos = self.len;
            0
        } else {
            self.isa_samples.get(pos / self.sample_rate) as usize
        };

        let mut result = Vec::with_capacity(range.len());
        while pos > range.start {
            // bwt[row] is the symbol preceding the suffix at `pos`
            if pos <= range.end {
                result.push(self.bwt.get(row) as u8);
            }
            pos -= 1;
            if pos > range.start {
                row = self.lf(row);
            }
        }
        result.reverse();
        Ok(result)
    }

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u64(writer, self.len as u64)?;
        write_u64(writer, self.primary as u64)?;
        write_u64(writer, self.sample_rate as u64)?;
        self.bwt.serialize(writer)?;
        self.sampled.serialize(writer)?;
        self.sa_samples.serialize(writer)?;
        self.isa_samples.serialize(writer)?;
        Ok(())
    }

    fn load<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut header = [0usize; 3];
        for field in header.iter_mut() {
            *field = usize::try_from(read_u64(reader)?)
                .map_err(|_| invalid_data("FM-index header doesn't fit in memory"))?;
        }
        let [len, primary, sample_rate] = header;
        if len == usize::MAX || sample_rate == 0 {
            return Err(invalid_data(format!(
                "FM-index: invalid text length {} or sample rate {}",
                len, sample_rate
            )));
        }
        let bwt = WaveletTree::load(reader, SIGMA + 1)?;
        let sampled = SparseVector::load(reader)?;
        let sa_samples = IntVector::load(reader)?;
        let isa_samples = IntVector::load(reader)?;

        let index = Self {
            len,
            primary,
            sample_rate,
            counts: cumulative(&bwt),
            bwt,
            sampled,
            sa_samples,
            isa_samples,
        };
        index.validate()?;
        Ok(index)
    }

    fn size_in_bytes(&self) -> usize {
        3 * 8
            + self.bwt.size_in_bytes()
            + self.sampled.size_in_bytes()
            + self.sa_samples.size_in_bytes()
            + self.isa_samples.size_in_bytes()
    }

    fn structure(&self) -> String {
        let mut out = format!(
            "FmIndex len={} primary={} sample_rate={} samples={} bwt=",
            self.len,
            self.primary,
            self.sample_rate,
            self.sa_samples.len()
        );
        for row in 0..self.rows() {
            match self.bwt.get(row) {
                SENTINEL => out.push('$'),
                symbol => {
                    let _ = write!(out, "{:02x}", symbol);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_and_count() -> Result<()> {
        let text = b"abracadabra";
        for sample_rate in [1, 2, 3, 32] {
            let index = FmIndex::build(text, sample_rate)?;
            assert_eq!(index.len(), text.len());
            assert_eq!(index.locate(b"abra"), vec![0, 7]);
            assert_eq!(index.locate(b"a"), vec![0, 3, 5, 7, 10]);
            assert_eq!(index.locate(b"cad"), vec![4]);
            assert_eq!(index.count(b"bra"), 2);
            assert!(index.locate(b"abrac!").is_empty());
            assert!(index.locate(b"").is_empty());
            assert_eq!(index.count(b"z"), 0);
        }
        Ok(())
    }

    #[test]
    fn test_overlapping_occurrences() -> Result<()> {
        let index = FmIndex::build(b"aaaaa", 2)?;
        assert_eq!(index.locate(b"aa"), vec![0, 1, 2, 3]);
        assert_eq!(index.count(b"aaaaaa"), 0);
        Ok(())
    }

    #[test]
    fn test_extract() -> Result<()> {
        let text = b"\xff\xfe\xff\x08\x00\x00\x00\x00\x00\x00\x00\x0e\xff\x01\x02\xff";
        for sample_rate in [1, 4, 5, 64] {
            let index = FmIndex::build(text, sample_rate)?;
            assert_eq!(index.extract(0..text.len())?, text.to_vec());
            for start in 0..text.len() {
                for end in start..=text.len() {
                    assert_eq!(index.extract(start..end)?, text[start..end].to_vec());
                }
            }
            assert!(index.extract(3..text.len() + 1).is_err());
        }
        Ok(())
    }

    #[test]
    fn test_empty_text() -> Result<()> {
        let index = FmIndex::build(b"", 4)?;
        assert!(index.is_empty());
        assert!(index.locate(b"a").is_empty());
        assert_eq!(index.extract(0..0)?, Vec::<u8>::new());
        Ok(())
    }

    #[test]
    fn test_large_text_crosses_checkpoints() -> Result<()> {
        let text: Vec<u8> = (0..1000u32).map(|x| (x * 7 % 13) as u8).collect();
        let index = FmIndex::build(&text, 16)?;
        let pattern = &text[500..506];
        let expected: Vec<usize> = (0..=text.len() - pattern.len())
            .filter(|&i| &text[i..i + pattern.len()] == pattern)
            .collect();
        assert_eq!(index.locate(pattern), expected);
        assert_eq!(index.extract(123..777)?, text[123..777].to_vec());
        Ok(())
    }

    #[test]
    fn test_serialization_roundtrip() -> Result<()> {
        let text = b"mississippi\xffmississippi";
        let index = FmIndex::build(text, 3)?;

        let mut buffer = Vec::new();
        index.serialize(&mut buffer)?;
        assert_eq!(buffer.len(), index.size_in_bytes());

        let loaded = FmIndex::load(&mut buffer.as_slice())?;
        assert_eq!(loaded.len(), text.len());
        assert_eq!(loaded.locate(b"ssi"), index.locate(b"ssi"));
        assert_eq!(loaded.extract(0..text.len())?, text.to_vec());
        assert_eq!(loaded.structure(), index.structure());

        // Truncated streams are rejected
        let truncated = &buffer[..buffer.len() - 5];
        assert!(FmIndex::load(&mut &truncated[..]).is_err());
        Ok(())
    }

    fn rejects(buffer: &[u8]) -> bool {
        matches!(
            FmIndex::load(&mut &buffer[..]),
            Err(err) if err.kind() == io::ErrorKind::InvalidData
        )
    }

    #[test]
    fn test_inconsistent_streams_are_rejected() -> Result<()> {
        let text = b"\xff\xfe\xff\x05\x00\xff\x01\x02\xff\xfe\xff\x05\x00\xff\x03\xff";
        let index = FmIndex::build(text, 2)?;
        let mut buffer = Vec::new();
        index.serialize(&mut buffer)?;

        let header = |field: usize, value: u64| {
            let mut tampered = buffer.clone();
            tampered[field * 8..field * 8 + 8].copy_from_slice(&value.to_le_bytes());
            tampered
        };
        assert!(rejects(&header(0, u64::MAX)));
        assert!(rejects(&header(0, text.len() as u64 + 1)));
        assert!(rejects(&header(1, (index.primary as u64 + 1) % (text.len() as u64 + 1))));
        assert!(rejects(&header(1, u64::MAX)));
        assert!(rejects(&header(2, 0)));
        assert!(rejects(&header(2, 3)));

        // The stream ends with the last word of the inverse suffix array samples
        let mut tampered = buffer.clone();
        let end = tampered.len();
        for byte in &mut tampered[end - 8..] {
            *byte ^= 0xff;
        }
        assert!(rejects(&tampered));
        Ok(())
    }

    #[test]
    fn test_size_follows_entropy() -> Result<()> {
        let mut state = 17u64;
        let text: Vec<u8> = (0..100_000)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                b"ACGT"[(state >> 62) as usize]
            })
            .collect();
        let index = FmIndex::build(&text, 32)?;
        assert!(
            index.size_in_bytes() * 5 < index.len() * 3,
            "{} bytes for a text of {}",
            index.size_in_bytes(),
            index.len()
        );
        assert_eq!(index.extract(5000..5100)?, text[5000..5100].to_vec());
        Ok(())
    }
}
