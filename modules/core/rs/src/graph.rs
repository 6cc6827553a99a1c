use std::sync::Arc;

use ahash::AHashMap;
use eyre::{ensure, Result};

/// Identifier of a node in a variation graph.
pub type NodeId = u64;

/// Node-to-coordinate lookups over a linearized variation graph.
///
/// The basis is the concatenation of the forward-strand sequence of every node, laid out
/// end to end. A node occupies `[node_start, node_start + node_length)` in the basis.
pub trait GraphIndex {
    /// Total length of the basis, i.e. the sum of all node lengths.
    fn basis_length(&self) -> usize;

    /// Offset of the first base of the node in the basis.
    fn node_start(&self, node: NodeId) -> Option<usize>;

    /// Number of bases in the node.
    fn node_length(&self, node: NodeId) -> Option<usize>;

    /// Reflect an offset measured on the reverse strand of a node onto its forward strand.
    /// The offset must not exceed `node_length`.
    fn reverse_offset(&self, offset: usize, node_length: usize) -> usize {
        node_length - offset
    }
}

impl<T: GraphIndex + ?Sized> GraphIndex for &T {
    fn basis_length(&self) -> usize {
        (**self).basis_length()
    }

    fn node_start(&self, node: NodeId) -> Option<usize> {
        (**self).node_start(node)
    }

    fn node_length(&self, node: NodeId) -> Option<usize> {
        (**self).node_length(node)
    }

    fn reverse_offset(&self, offset: usize, node_length: usize) -> usize {
        (**self).reverse_offset(offset, node_length)
    }
}

impl<T: GraphIndex + ?Sized> GraphIndex for Arc<T> {
    fn basis_length(&self) -> usize {
        (**self).basis_length()
    }

    fn node_start(&self, node: NodeId) -> Option<usize> {
        (**self).node_start(node)
    }

    fn node_length(&self, node: NodeId) -> Option<usize> {
        (**self).node_length(node)
    }

    fn reverse_offset(&self, offset: usize, node_length: usize) -> usize {
        (**self).reverse_offset(offset, node_length)
    }
}

/// In-memory node table: nodes are placed in the basis in insertion order.
#[derive(Clone, Debug, Default)]
pub struct NodeTable {
    lookup: AHashMap<NodeId, usize>,
    starts: Vec<usize>,
    lengths: Vec<usize>,
    total: usize,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from `(node, length)` pairs given in basis order.
    pub fn from_nodes(nodes: impl IntoIterator<Item = (NodeId, usize)>) -> Result<Self> {
        let mut table = Self::new();
        for (node, length) in nodes {
            table.push(node, length)?;
        }
        Ok(table)
    }

    /// Append a node at the end of the basis.
    pub fn push(&mut self, node: NodeId, length: usize) -> Result<()> {
        ensure!(
            !self.lookup.contains_key(&node),
            "Node {} is already part of the basis",
            node
        );
        self.lookup.insert(node, self.starts.len());
        self.starts.push(self.total);
        self.lengths.push(length);
        self.total += length;
        Ok(())
    }

    /// Number of nodes in the table.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

impl GraphIndex for NodeTable {
    fn basis_length(&self) -> usize {
        self.total
    }

    fn node_start(&self, node: NodeId) -> Option<usize> {
        self.lookup.get(&node).map(|&ind| self.starts[ind])
    }

    fn node_length(&self, node: NodeId) -> Option<usize> {
        self.lookup.get(&node).map(|&ind| self.lengths[ind])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_table_layout() -> Result<()> {
        let table = NodeTable::from_nodes([(5, 3), (1, 10), (9, 0), (2, 4)])?;
        assert_eq!(table.len(), 4);
        assert_eq!(table.basis_length(), 17);

        assert_eq!(table.node_start(5), Some(0));
        assert_eq!(table.node_start(1), Some(3));
        assert_eq!(table.node_start(9), Some(13));
        assert_eq!(table.node_start(2), Some(13));
        assert_eq!(table.node_length(1), Some(10));
        assert_eq!(table.node_length(9), Some(0));

        assert_eq!(table.node_start(3), None);
        assert_eq!(table.node_length(3), None);
        Ok(())
    }

    #[test]
    fn test_node_table_rejects_duplicates() {
        let mut table = NodeTable::new();
        assert!(table.push(1, 3).is_ok());
        assert!(table.push(1, 3).is_err());
        assert_eq!(table.basis_length(), 3);
    }

    #[test]
    fn test_reverse_offset() -> Result<()> {
        let table = NodeTable::from_nodes([(1, 8)])?;
        assert_eq!(table.reverse_offset(0, 8), 8);
        assert_eq!(table.reverse_offset(3, 8), 5);

        let shared = Arc::new(table);
        assert_eq!(shared.reverse_offset(3, 8), 5);
        assert_eq!((&shared).node_length(1), Some(8));
        Ok(())
    }
}
