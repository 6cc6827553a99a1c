use std::io::Write;

use eyre::{Result, WrapErr};
use itertools::Itertools;

use gracov_collections_rs::text_index::FullTextIndex;
use gracov_core_rs::graph::GraphIndex;

use super::counter::Counter;
use super::error::CounterError;

impl<G: GraphIndex, T: FullTextIndex> Counter<G, T> {
    /// Write one tab separated line per position: the position and its coverage, followed by
    /// the number of stored records and the rendered edits when `show_edits` is set.
    ///
    /// Coverage alone can be rendered in either phase, edits need a compact counter.
    pub fn as_table<W: Write>(&self, out: &mut W, show_edits: bool) -> Result<()> {
        if show_edits && !self.is_compact() {
            return Err(CounterError::Precondition(
                "Edits can only be rendered for a compact counter".to_string(),
            )
            .into());
        }
        for (position, coverage) in self.coverage().values().enumerate() {
            write!(out, "{}\t{}", position, coverage)?;
            if show_edits {
                let edits = self.edits_at_position(position)?;
                write!(out, "\t{}", self.occurrence_count(position)?)?;
                for edit in edits {
                    write!(out, " {}", edit)?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Dump the raw coverage values and the internal structure of every bin index.
    pub fn dump_structure<W: Write>(&self, out: &mut W) -> Result<()> {
        if !self.is_compact() {
            return Err(CounterError::Precondition(
                "Only a compact counter has a structure to dump".to_string(),
            )
            .into());
        }
        writeln!(out, "{}", self.coverage().values().join(" "))
            .wrap_err("Failed to write the coverage vector")?;
        for bin in 0..self.n_bins() {
            writeln!(out, "{}", self.bin_index(bin)?.structure())
                .wrap_err_with(|| format!("Failed to write the index of bin {}", bin))?;
        }
        Ok(())
    }
}
