/// Kind of a single edit of a read against a graph node.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Op {
    /// Read bases identical to the node bases they cover
    Match,
    /// Node bases replaced by read bases, possibly of a different length
    Substitution,
    /// Read bases absent from the node
    Insertion,
    /// Node bases absent from the read
    Deletion,
}

impl Op {
    /// CIGAR-like symbol of the operation.
    pub fn symbol(&self) -> char {
        match self {
            Op::Match => '=',
            Op::Substitution => 'X',
            Op::Insertion => 'I',
            Op::Deletion => 'D',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol() {
        let symbols = [Op::Match, Op::Substitution, Op::Insertion, Op::Deletion].map(|x| x.symbol());
        assert_eq!(symbols, ['=', 'X', 'I', 'D']);
    }
}
