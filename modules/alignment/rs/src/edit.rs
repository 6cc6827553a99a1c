use std::fmt::Display;

use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;

use gracov_core_rs::seq;

#[cfg(feature = "bitcode")]
use bitcode::{Decode, Encode};

use super::op::Op;

/// A single edit of a read against the node it is mapped to.
///
/// `from_length` bases of the node are replaced by `to_length` bases of the read. Matches
/// carry no sequence, every other edit carries the read bases it introduces.
#[cfg_attr(feature = "bitcode", derive(Encode, Decode))]
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Constructor, Dissolve, Getters,
)]
pub struct Edit {
    from_length: u32,
    to_length: u32,
    sequence: String,
}

impl Edit {
    /// A run of `len` matching bases.
    pub fn matching(len: u32) -> Self {
        Self::new(len, len, String::new())
    }

    /// Replace as many node bases as there are bases in `sequence`.
    pub fn substitution(sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        let len = sequence.len() as u32;
        Self::new(len, len, sequence)
    }

    /// Bases present in the read only.
    pub fn insertion(sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        Self::new(0, sequence.len() as u32, sequence)
    }

    /// `len` node bases missing from the read.
    pub fn deletion(len: u32) -> Self {
        Self::new(len, 0, String::new())
    }

    pub fn is_match(&self) -> bool {
        self.from_length == self.to_length && self.sequence.is_empty()
    }

    pub fn op(&self) -> Op {
        if self.is_match() {
            Op::Match
        } else if self.from_length == 0 {
            Op::Insertion
        } else if self.to_length == 0 {
            Op::Deletion
        } else {
            Op::Substitution
        }
    }

    /// The same edit as seen from the opposite strand. Lengths are strand-independent, the
    /// introduced sequence is reverse complemented.
    pub fn reverse_complement(&self) -> Self {
        Self {
            from_length: self.from_length,
            to_length: self.to_length,
            sequence: seq::reverse_complement_str(&self.sequence),
        }
    }
}

impl Display for Edit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}->{}", self.op().symbol(), self.from_length, self.to_length)?;
        if !self.sequence.is_empty() {
            write!(f, ":{}", self.sequence)?;
        }
        Ok(())
    }
}
