use std::fmt::Display;

/// Direction in which an oriented node visit walks the graph basis.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(i8)]
pub enum Strand {
    /// Left to right, in the order the node sequence is stored in the basis.
    Forward = 1,
    /// Right to left, reading the reverse complement of the stored sequence.
    Reverse = -1,
}

impl Strand {
    /// Strand matching the `is_reverse` flag carried by graph positions.
    pub fn from_reverse_flag(is_reverse: bool) -> Self {
        if is_reverse {
            Self::Reverse
        } else {
            Self::Forward
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Self::Reverse)
    }

    /// Signed increment of a basis coordinate when walking one base along this strand.
    pub fn step(&self) -> i64 {
        *self as i8 as i64
    }

    /// Move a basis coordinate `len` bases along this strand.
    pub fn advance(&self, coordinate: i64, len: u64) -> i64 {
        coordinate + self.step() * len as i64
    }

    pub fn symbol(&self) -> char {
        match self {
            Self::Forward => '+',
            Self::Reverse => '-',
        }
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
