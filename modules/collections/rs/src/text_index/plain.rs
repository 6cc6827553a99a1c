use std::io::{self, Read, Write};
use std::ops::Range;

use eyre::{ensure, Result};
use itertools::Itertools;
use memchr::memmem;

use super::{read_u64, write_u64, FullTextIndex};

/// Uncompressed text scanned on every query. Serves as the reference implementation of
/// [`FullTextIndex`] and as a backend for small texts.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PlainText {
    text: Vec<u8>,
}

impl FullTextIndex for PlainText {
    fn build(text: &[u8], _sample_rate: usize) -> Result<Self> {
        Ok(Self {
            text: text.to_vec(),
        })
    }

    fn len(&self) -> usize {
        self.text.len()
    }

    fn locate(&self, pattern: &[u8]) -> Vec<usize> {
        let mut hits = Vec::new();
        if pattern.is_empty() {
            return hits;
        }
        let finder = memmem::Finder::new(pattern);
        let mut start = 0;
        while let Some(hit) = finder.find(&self.text[start..]) {
            hits.push(start + hit);
            start += hit + 1;
        }
        hits
    }

    fn count(&self, pattern: &[u8]) -> usize {
        self.locate(pattern).len()
    }

    fn extract(&self, range: Range<usize>) -> Result<Vec<u8>> {
        ensure!(
            range.start <= range.end && range.end <= self.text.len(),
            "Range {:?} is outside of the indexed text of length {}",
            range,
            self.text.len()
        );
        Ok(self.text[range].to_vec())
    }

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u64(writer, self.text.len() as u64)?;
        writer.write_all(&self.text)
    }

    fn load<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = read_u64(reader)? as usize;
        let mut text = Vec::new();
        reader.take(len as u64).read_to_end(&mut text)?;
        if text.len() != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("PlainText: expected {} bytes, got {}", len, text.len()),
            ));
        }
        Ok(Self { text })
    }

    fn size_in_bytes(&self) -> usize {
        8 + self.text.len()
    }

    fn structure(&self) -> String {
        format!(
            "PlainText len={} text={}",
            self.text.len(),
            self.text.iter().map(|x| format!("{:02x}", x)).join("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() -> Result<()> {
        let index = PlainText::build(b"aaab", 0)?;
        assert_eq!(index.locate(b"aa"), vec![0, 1]);
        assert_eq!(index.count(b"b"), 1);
        assert_eq!(index.extract(1..3)?, b"aa".to_vec());
        assert!(index.extract(2..5).is_err());

        let mut buffer = Vec::new();
        index.serialize(&mut buffer)?;
        assert_eq!(PlainText::load(&mut buffer.as_slice())?, index);
        assert!(PlainText::load(&mut &buffer[..6]).is_err());
        Ok(())
    }
}
