use derive_more::{Display, Error};

use gracov_core_rs::graph::NodeId;

/// Domain failures of the counter. They travel inside `eyre::Report`s and can be recovered
/// with `report.downcast_ref::<CounterError>()`. I/O failures are reported as `io::Error`.
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
pub enum CounterError {
    /// Operation is not allowed in the current phase of the counter.
    #[display("Precondition violated: {_0}")]
    Precondition(#[error(not(source))] String),
    /// Persisted or indexed data can't be decoded.
    #[display("Malformed counter data: {_0}")]
    Encoding(#[error(not(source))] String),
    /// Position outside of the graph basis.
    #[display("Position {position} is outside of the basis of length {length}")]
    Range { position: usize, length: usize },
    /// Node absent from the graph index, or a node offset outside of the node.
    #[display("Node {node} is not part of the graph basis or the offset {offset} is out of its bounds")]
    UnknownNode { node: NodeId, offset: u64 },
}
