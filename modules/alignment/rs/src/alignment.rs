use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use itertools::Itertools;

use super::edit::Edit;
use super::position::Position;

/// A run of edits anchored at a single graph position. Unmapped segments of a read carry no
/// position.
#[derive(Clone, Eq, PartialEq, Debug, Default, Constructor, Dissolve, Getters)]
pub struct Mapping {
    position: Option<Position>,
    edits: Vec<Edit>,
}

impl Mapping {
    pub fn mapped(position: Position, edits: Vec<Edit>) -> Self {
        Self::new(Some(position), edits)
    }

    pub fn unmapped(edits: Vec<Edit>) -> Self {
        Self::new(None, edits)
    }

    /// Number of node bases covered by the mapping.
    pub fn from_length(&self) -> u64 {
        self.edits.iter().map(|x| *x.from_length() as u64).sum()
    }

    /// Number of read bases covered by the mapping.
    pub fn to_length(&self) -> u64 {
        self.edits.iter().map(|x| *x.to_length() as u64).sum()
    }

    /// Add an edit to the end of the mapping.
    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }
}

/// A read aligned to the graph as an ordered walk of mappings.
#[derive(Clone, Eq, PartialEq, Debug, Default, Constructor, Dissolve, Getters)]
pub struct Alignment {
    name: String,
    mappings: Vec<Mapping>,
}

impl Alignment {
    /// Add a mapping to the end of the walk.
    pub fn push(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    /// Checks if the alignment has no mappings.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Positioned mappings in walk order; unmapped ones are skipped.
    pub fn mapped(&self) -> impl Iterator<Item = (&Position, &[Edit])> + '_ {
        self.mappings
            .iter()
            .filter_map(|x| x.position.as_ref().map(|pos| (pos, x.edits.as_slice())))
    }

    /// Compact textual representation of the walk, e.g. `1+0[=3->3,X1->1:A];2-4[=2->2]`.
    pub fn summary(&self) -> String {
        self.mappings
            .iter()
            .map(|mapping| {
                let anchor = match mapping.position {
                    Some(pos) => format!("{}{}{}", pos.node_id(), pos.strand(), pos.offset()),
                    None => "*".to_string(),
                };
                format!("{}[{}]", anchor, mapping.edits.iter().join(","))
            })
            .join(";")
    }
}
