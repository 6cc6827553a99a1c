use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use eyre::{Report, Result, WrapErr};
use rayon::prelude::*;

use gracov_alignment_rs::{Alignment, Edit};
use gracov_collections_rs::text_index::{FmIndex, FullTextIndex};
use gracov_core_rs::graph::{GraphIndex, NodeTable};
use gracov_core_rs::loc::Strand;

use super::bin_index::BinIndex;
use super::config::Config;
use super::coverage::CoverageStore;
use super::edit_log::EditLog;
use super::error::CounterError;
use super::record::{position_key, record};

enum Phase<T: FullTextIndex> {
    Mutable { log: EditLog },
    Compact { indexes: Vec<BinIndex<T>> },
}

// Mutations of a single alignment, validated before anything is applied
enum Step<'a> {
    Cover {
        first: i64,
        strand: Strand,
        len: u64,
    },
    Record {
        position: usize,
        edit: &'a Edit,
        reverse: bool,
    },
}

/// Coverage and edit index over the basis of a variation graph.
///
/// A counter starts out mutable: alignments are added one by one, match runs bump per-position
/// coverage and the remaining edits are spilled to a per-bin edit log. [`Counter::compact`]
/// freezes the coverage and indexes every bin; from then on the counter can be queried and
/// serialized but no longer modified. Loaded counters are always compact.
pub struct Counter<G = NodeTable, T: FullTextIndex = FmIndex> {
    // Absent for counters restored from a stream
    graph: Option<G>,
    config: Config,
    n_bins: usize,
    coverage: CoverageStore,
    phase: Phase<T>,
}

impl<G: GraphIndex, T: FullTextIndex> Counter<G, T> {
    pub fn new(graph: G, bin_size: usize) -> Result<Self> {
        Self::with_config(graph, Config::new(bin_size))
    }

    pub fn with_config(graph: G, config: Config) -> Result<Self> {
        config.validate()?;
        let length = graph.basis_length();
        let n_bins = config.n_bins(length);
        Ok(Self {
            coverage: CoverageStore::new(length),
            phase: Phase::Mutable {
                log: EditLog::new(n_bins, config.tmpdir().clone()),
            },
            graph: Some(graph),
            config,
            n_bins,
        })
    }

    pub fn bin_size(&self) -> usize {
        *self.config.bin_size()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> Option<&G> {
        self.graph.as_ref()
    }

    pub fn is_compact(&self) -> bool {
        matches!(self.phase, Phase::Compact { .. })
    }

    pub fn bin_for(&self, position: usize) -> usize {
        match self.bin_size() {
            0 => 0,
            size => position / size,
        }
    }

    /// Number of positions in the basis.
    pub fn graph_length(&self) -> usize {
        self.coverage.len()
    }

    pub fn coverage_at(&self, position: usize) -> Result<u64> {
        Ok(self.coverage.at(position)?)
    }

    pub fn coverage(&self) -> &CoverageStore {
        &self.coverage
    }

    fn check_position(&self, position: i64) -> Result<usize, CounterError> {
        let length = self.graph_length();
        match usize::try_from(position) {
            Ok(position) if position < length => Ok(position),
            Ok(position) => Err(CounterError::Range { position, length }),
            // Walked off the left end of the basis
            Err(_) => Err(CounterError::Range {
                position: 0,
                length,
            }),
        }
    }

    fn plan<'a>(&self, alignment: &'a Alignment, record_edits: bool) -> Result<Vec<Step<'a>>> {
        let graph = self.graph.as_ref().ok_or_else(|| {
            CounterError::Precondition("Counter has no graph to place alignments on".to_string())
        })?;

        let mut steps = Vec::new();
        for (pos, edits) in alignment.mapped() {
            let node = *pos.node_id();
            let offset = *pos.offset();
            let unknown = CounterError::UnknownNode { node, offset };

            let (start, length) = match (graph.node_start(node), graph.node_length(node)) {
                (Some(start), Some(length)) => (start as i64, length),
                _ => return Err(unknown.into()),
            };
            // The offset must name a base of the node unless the mapping only inserts
            let covers_bases = edits.iter().any(|edit| *edit.from_length() > 0);
            if offset > length as u64 || (offset == length as u64 && covers_bases) {
                return Err(unknown.into());
            }

            // Forward strand coordinate of the first base covered by the mapping
            let strand = pos.strand();
            let mut coord = match strand {
                Strand::Forward => start + offset as i64,
                Strand::Reverse => start + graph.reverse_offset(offset as usize, length) as i64 - 1,
            };

            for edit in edits {
                let len = *edit.from_length() as u64;
                if edit.is_match() {
                    if len > 0 {
                        self.check_position(coord)?;
                        self.check_position(strand.advance(coord, len - 1))?;
                        steps.push(Step::Cover {
                            first: coord,
                            strand,
                            len,
                        });
                    }
                } else if record_edits {
                    let position = self.check_position(coord)?;
                    // Position 0 is the sentinel and never holds edits
                    if position > 0 {
                        steps.push(Step::Record {
                            position,
                            edit,
                            reverse: strand.is_reverse(),
                        });
                    }
                }
                coord = strand.advance(coord, len);
            }
        }
        Ok(steps)
    }

    /// Count the alignment. Match runs increment the coverage of every base they cover, other
    /// edits are stored (as seen on the forward strand) when `record_edits` is set. Unmapped
    /// segments are skipped.
    ///
    /// Either the whole alignment is counted or, on error, nothing is.
    pub fn add(&mut self, alignment: &Alignment, record_edits: bool) -> Result<()> {
        if self.is_compact() {
            return Err(CounterError::Precondition(
                "Alignments can't be added to a compact counter".to_string(),
            )
            .into());
        }
        let steps = self.plan(alignment, record_edits)?;

        let Phase::Mutable { log } = &mut self.phase else {
            return Ok(());
        };
        for step in steps {
            match step {
                Step::Cover { first, strand, len } => {
                    for ind in 0..len {
                        self.coverage
                            .increment(strand.advance(first, ind) as usize, 1)?;
                    }
                }
                Step::Record {
                    position,
                    edit,
                    reverse,
                } => {
                    let bin = match *self.config.bin_size() {
                        0 => 0,
                        size => position / size,
                    };
                    log.append(bin, &record(position, edit, reverse))?;
                }
            }
        }
        Ok(())
    }

    /// Seal the edit log, index every bin and freeze the coverage. No-op once compact.
    pub fn compact(&mut self) -> Result<()> {
        let Phase::Mutable { log } = &mut self.phase else {
            return Ok(());
        };
        if !log.is_sealed() {
            log.close()?;
        }
        let corpora = (0..self.n_bins)
            .map(|bin| log.corpus(bin))
            .collect::<Result<Vec<_>>>()?;

        let rate = *self.config.sa_sample_rate();
        let pool = self.config.thread_pool()?;
        let indexes = pool.install(|| {
            corpora
                .par_iter()
                .enumerate()
                .map(|(bin, corpus)| {
                    log::debug!("Indexing bin {} ({} bytes)", bin, corpus.len());
                    BinIndex::<T>::build(corpus, rate)
                        .wrap_err_with(|| format!("Failed to index bin {}", bin))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        self.coverage.compact()?;
        log.discard();
        self.phase = Phase::Compact { indexes };

        log::info!(
            "Compacted counter: {} positions, {} bins, {} bytes of edit records",
            self.graph_length(),
            self.n_bins,
            corpora.iter().map(Vec::len).sum::<usize>()
        );
        Ok(())
    }

    /// Revert to the mutable phase. Always fails: a compact counter can't be modified again.
    pub fn make_mutable(&mut self) -> Result<()> {
        if self.is_compact() {
            return Err(CounterError::Precondition(
                "A compact counter can't be converted back to the mutable form".to_string(),
            )
            .into());
        }
        Ok(())
    }

    fn indexes(&self) -> Result<&[BinIndex<T>], CounterError> {
        match &self.phase {
            Phase::Compact { indexes } => Ok(indexes),
            Phase::Mutable { .. } => Err(CounterError::Precondition(
                "Counter must be compacted before its edits can be queried".to_string(),
            )),
        }
    }

    pub fn bin_index(&self, bin: usize) -> Result<&BinIndex<T>> {
        let indexes = self.indexes()?;
        indexes.get(bin).ok_or_else(|| {
            CounterError::Range {
                position: bin,
                length: indexes.len(),
            }
            .into()
        })
    }

    /// Edits recorded at the position, in the order they appear in the bin corpus. Position 0
    /// never holds edits.
    pub fn edits_at_position(&self, position: usize) -> Result<Vec<Edit>> {
        if position == 0 {
            return Ok(Vec::new());
        }
        let indexes = self.indexes()?;
        let length = self.graph_length();
        if position >= length {
            return Err(CounterError::Range { position, length }.into());
        }
        let bin = self.bin_for(position);
        let index = indexes.get(bin).ok_or(CounterError::Range {
            position: bin,
            length: indexes.len(),
        })?;
        index.values_after(&position_key(position))
    }

    /// Number of records stored for the position, always 0 for the sentinel.
    pub fn occurrence_count(&self, position: usize) -> Result<usize> {
        let index = self.bin_index(self.bin_for(position))?;
        if position == 0 {
            return Ok(0);
        }
        Ok(index.occurrence_count(&position_key(position)))
    }

    /// Compact the counter and write it to the stream. Returns the number of bytes written.
    pub fn serialize<W: Write>(&mut self, writer: &mut W) -> Result<usize> {
        self.compact()?;
        let mut writer = Tally::new(writer);
        self.write_to(&mut writer)
            .wrap_err("Failed to serialize the counter")?;
        Ok(writer.written)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&(self.bin_size() as u64).to_le_bytes())?;
        writer.write_all(&(self.n_bins as u64).to_le_bytes())?;
        self.coverage.serialize(writer)?;
        for index in self.indexes().map_err(io::Error::other)? {
            index.serialize(writer)?;
        }
        Ok(())
    }

    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let written = self.serialize(&mut writer)?;
        writer
            .flush()
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        Ok(written)
    }

    /// Restore a compact counter from the stream. The result has no graph and can only be
    /// queried, serialized or merged into another counter.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let bin_size = read_u64(reader).map_err(|err| decoding(err, "bin size"))? as usize;
        let n_bins = read_u64(reader).map_err(|err| decoding(err, "bin count"))? as usize;
        let coverage =
            CoverageStore::load(reader).map_err(|err| decoding(err, "coverage vector"))?;

        let config = Config::new(bin_size);
        let expected = config.n_bins(coverage.len());
        if n_bins != expected {
            return Err(CounterError::Encoding(format!(
                "Stream declares {} bins, but {} positions in bins of {} need {}",
                n_bins,
                coverage.len(),
                bin_size,
                expected
            ))
            .into());
        }

        let indexes = (0..n_bins)
            .map(|bin| {
                BinIndex::<T>::load(reader)
                    .map_err(|err| decoding(err, &format!("index of bin {}", bin)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            graph: None,
            config,
            n_bins,
            coverage,
            phase: Phase::Compact { indexes },
        })
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
        Self::load(&mut BufReader::new(file))
            .wrap_err_with(|| format!("Failed to load a counter from {}", path.display()))
    }

    /// Add the coverage and re-emit the edit records of a compact counter into this one.
    ///
    /// Both counters must use the same bins and `other` can't be longer than this basis.
    /// Whether they share the same basis is up to the caller.
    pub fn absorb<H>(&mut self, other: &Counter<H, T>) -> Result<()> {
        let Phase::Mutable { log } = &mut self.phase else {
            return Err(CounterError::Precondition(
                "Counters can only be merged into a mutable counter".to_string(),
            )
            .into());
        };
        let indexes = match &other.phase {
            Phase::Compact { indexes } => indexes,
            Phase::Mutable { .. } => {
                return Err(CounterError::Precondition(
                    "Only compact counters can be merged".to_string(),
                )
                .into())
            }
        };

        let (bin_size, other_bin_size) = (*self.config.bin_size(), *other.config.bin_size());
        if bin_size != other_bin_size
            || self.n_bins != other.n_bins
            || other.coverage.len() > self.coverage.len()
        {
            return Err(CounterError::Precondition(format!(
                "Can't merge a counter with {} positions in {} bins of {} into one with {} \
                 positions in {} bins of {}",
                other.coverage.len(),
                other.n_bins,
                other_bin_size,
                self.coverage.len(),
                self.n_bins,
                bin_size
            ))
            .into());
        }

        for (bin, index) in indexes.iter().enumerate() {
            let records = index.records()?;
            if !records.is_empty() {
                log.append(bin, &records)?;
            }
        }
        self.coverage.add_from(&other.coverage)?;
        Ok(())
    }

    /// Load every stream and absorb it into this counter, one after another.
    pub fn merge_from<R: Read>(&mut self, sources: impl IntoIterator<Item = R>) -> Result<()> {
        for (ind, mut source) in sources.into_iter().enumerate() {
            let other = Counter::<G, T>::load(&mut source)
                .wrap_err_with(|| format!("Failed to load merge source #{}", ind))?;
            log::debug!(
                "Merging source #{} with {} positions in {} bins",
                ind,
                other.graph_length(),
                other.n_bins
            );
            self.absorb(&other)?;
        }
        Ok(())
    }

    pub fn merge_from_files<P: AsRef<Path>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<()> {
        for path in paths {
            let path = path.as_ref();
            let other = Counter::<G, T>::load_from_file(path)?;
            log::debug!("Merging {}", path.display());
            self.absorb(&other)?;
        }
        Ok(())
    }
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

// Truncated or inconsistent streams are encoding failures, anything else stays an I/O error
fn decoding(err: io::Error, what: &str) -> Report {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            CounterError::Encoding(format!("Can't read the {}: {}", what, err)).into()
        }
        _ => Report::new(err).wrap_err(format!("Failed to read the {}", what)),
    }
}

struct Tally<W> {
    inner: W,
    written: usize,
}

impl<W> Tally<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for Tally<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.written += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
