use std::io::{self, Read, Write};
use std::ops::Range;

use eyre::Result;

pub use fm_index::FmIndex;
pub use plain::PlainText;

mod fm_index;
mod plain;
pub mod suffix_array;
mod wavelet_tree;

/// Read-only index over a byte text supporting exact pattern search and random access.
///
/// Implementations are built once from the full text and never modified afterwards.
pub trait FullTextIndex: Sized + Send + Sync {
    /// Index the text. `sample_rate` trades locate/extract speed for space in sampled
    /// implementations and is ignored by the others.
    fn build(text: &[u8], sample_rate: usize) -> Result<Self>;

    /// Length of the indexed text in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offsets of all (possibly overlapping) occurrences of the pattern, in ascending order.
    /// The empty pattern has no occurrences.
    fn locate(&self, pattern: &[u8]) -> Vec<usize>;

    /// Number of occurrences of the pattern, equal to `locate(pattern).len()`.
    fn count(&self, pattern: &[u8]) -> usize;

    /// Bytes of the text in the given range.
    fn extract(&self, range: Range<usize>) -> Result<Vec<u8>>;

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn load<R: Read>(reader: &mut R) -> io::Result<Self>;

    /// Size of the serialized representation in bytes.
    fn size_in_bytes(&self) -> usize;

    /// Human readable dump of the internal structure, for debugging.
    fn structure(&self) -> String;
}

pub(crate) fn write_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}
