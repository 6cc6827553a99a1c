use std::io::{self, Read, Write};
use std::ops::Range;

use eyre::Result;

use gracov_alignment_rs::Edit;
use gracov_collections_rs::text_index::{FmIndex, FullTextIndex};

use super::error::CounterError;
use super::escape::{find_boundary, DELIM1};
use super::record::decode_value;

// Initial size of the window scanned for the end of a value, doubled until a boundary shows up
const SCAN_WINDOW: usize = 64;

/// Read-only full-text index over the corpus of one bin.
#[derive(Clone, Debug)]
pub struct BinIndex<T: FullTextIndex = FmIndex> {
    index: T,
}

impl<T: FullTextIndex> BinIndex<T> {
    /// Index a sealed corpus, i.e. records followed by the trailing separator.
    pub fn build(corpus: &[u8], sample_rate: usize) -> Result<Self> {
        if corpus.last() != Some(&DELIM1) {
            return Err(CounterError::Encoding(
                "Bin corpus must end with the record separator".to_string(),
            )
            .into());
        }
        Ok(Self {
            index: T::build(corpus, sample_rate)?,
        })
    }

    /// Corpus length in bytes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn locate(&self, pattern: &[u8]) -> Vec<usize> {
        self.index.locate(pattern)
    }

    pub fn extract(&self, range: Range<usize>) -> Result<Vec<u8>> {
        self.index.extract(range)
    }

    pub fn occurrence_count(&self, pattern: &[u8]) -> usize {
        self.index.count(pattern)
    }

    /// Decode the value following every occurrence of `key`, in corpus order.
    pub fn values_after(&self, key: &[u8]) -> Result<Vec<Edit>> {
        self.locate(key)
            .into_iter()
            .map(|offset| self.value_at(offset + key.len()))
            .collect()
    }

    /// Decode the value whose leading separator sits at `cursor`.
    fn value_at(&self, cursor: usize) -> Result<Edit> {
        let len = self.len();
        if cursor >= len || self.extract(cursor..cursor + 1)?.first() != Some(&DELIM1) {
            return Err(CounterError::Encoding(format!(
                "No value separator after the key ending at {}",
                cursor
            ))
            .into());
        }

        let start = cursor + 1;
        let mut window = SCAN_WINDOW;
        loop {
            let end = (start + window).min(len);
            let bytes = self.extract(start..end)?;
            let at_end = end == len;
            // The last byte of the odd run separates this value from what follows
            if let Some(run) = find_boundary(&bytes, DELIM1, at_end) {
                return Ok(decode_value(&bytes[..run.end - 1])?);
            }
            if at_end {
                return Err(CounterError::Encoding(format!(
                    "Value starting at {} is not terminated",
                    start
                ))
                .into());
            }
            window *= 2;
        }
    }

    /// Raw records of the bin without the trailing separator, ready to be appended to an edit log.
    pub fn records(&self) -> Result<Vec<u8>> {
        match self.len() {
            0 => Ok(Vec::new()),
            len => self.extract(0..len - 1),
        }
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.index.serialize(writer)
    }

    pub fn load<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            index: T::load(reader)?,
        })
    }

    pub fn size_in_bytes(&self) -> usize {
        self.index.size_in_bytes()
    }

    pub fn structure(&self) -> String {
        self.index.structure()
    }
}
