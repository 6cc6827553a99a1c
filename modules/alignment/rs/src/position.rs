use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;

use gracov_core_rs::graph::NodeId;
use gracov_core_rs::loc::Strand;

/// A position on an oriented node: `offset` bases from the start of the node as read on the
/// given strand.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Constructor, Dissolve, Getters)]
pub struct Position {
    node_id: NodeId,
    offset: u64,
    is_reverse: bool,
}

impl Position {
    pub fn forward(node_id: NodeId, offset: u64) -> Self {
        Self::new(node_id, offset, false)
    }

    pub fn reverse(node_id: NodeId, offset: u64) -> Self {
        Self::new(node_id, offset, true)
    }

    pub fn strand(&self) -> Strand {
        Strand::from_reverse_flag(self.is_reverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_strand() {
        assert_eq!(Position::forward(3, 1).strand(), Strand::Forward);
        assert_eq!(Position::reverse(3, 1).strand(), Strand::Reverse);
        assert_eq!(*Position::reverse(3, 1).node_id(), 3);
        assert_eq!(Position::new(3, 1, true), Position::reverse(3, 1));
    }
}
