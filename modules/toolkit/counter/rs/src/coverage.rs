use std::io::{self, Read, Write};

use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, Vector};
use simple_sds::serialize::Serialize;

use super::error::CounterError;

fn bit_width(max: u64) -> usize {
    (64 - max.leading_zeros() as usize).max(1)
}

/// Per-position coverage counters over the graph basis.
///
/// Counters are plain `u32` cells while the store is live. They saturate at `u32::MAX` and
/// the first saturation is logged. Freezing packs them into an `IntVector` whose width fits the
/// largest observed value; a frozen store is read-only.
#[derive(Clone, Debug)]
pub enum CoverageStore {
    Live { counts: Vec<u32>, saturated: bool },
    Frozen(IntVector),
}

impl CoverageStore {
    pub fn new(len: usize) -> Self {
        Self::Live {
            counts: vec![0; len],
            saturated: false,
        }
    }

    /// Number of tracked positions.
    pub fn len(&self) -> usize {
        match self {
            Self::Live { counts, .. } => counts.len(),
            Self::Frozen(vector) => vector.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compact(&self) -> bool {
        matches!(self, Self::Frozen(_))
    }

    pub fn increment(&mut self, position: usize, delta: u32) -> Result<(), CounterError> {
        let length = self.len();
        match self {
            Self::Frozen(_) => Err(CounterError::Precondition(
                "Coverage can't be incremented once compacted".to_string(),
            )),
            Self::Live { counts, saturated } => {
                let cell = counts
                    .get_mut(position)
                    .ok_or(CounterError::Range { position, length })?;
                let (sum, overflow) = cell.overflowing_add(delta);
                *cell = if overflow { u32::MAX } else { sum };
                if overflow && !*saturated {
                    *saturated = true;
                    log::warn!(
                        "Coverage at position {} saturated at {}, further counts are clamped",
                        position,
                        u32::MAX
                    );
                }
                Ok(())
            }
        }
    }

    /// Add every value of `other` to the same position of this store. `other` may be shorter.
    pub fn add_from(&mut self, other: &CoverageStore) -> Result<(), CounterError> {
        for position in 0..other.len() {
            let value = other.at(position)?;
            if value > 0 {
                self.increment(position, value.min(u32::MAX as u64) as u32)?;
            }
        }
        Ok(())
    }

    pub fn at(&self, position: usize) -> Result<u64, CounterError> {
        let length = self.len();
        if position >= length {
            return Err(CounterError::Range { position, length });
        }
        Ok(match self {
            Self::Live { counts, .. } => counts[position] as u64,
            Self::Frozen(vector) => vector.get(position),
        })
    }

    /// Freeze the counters. Idempotent.
    pub fn compact(&mut self) -> Result<(), CounterError> {
        let Self::Live { counts, .. } = self else {
            return Ok(());
        };

        let max = counts.iter().copied().max().unwrap_or(0);
        let mut frozen = IntVector::with_len(counts.len(), bit_width(max as u64), 0)
            .map_err(CounterError::Encoding)?;
        for (ind, &value) in counts.iter().enumerate() {
            frozen.set(ind, value as u64);
        }
        *self = Self::Frozen(frozen);
        Ok(())
    }

    /// Bit width of the frozen values, `None` while live.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::Live { .. } => None,
            Self::Frozen(vector) => Some(vector.width()),
        }
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Self::Frozen(vector) => vector.serialize(writer),
            Self::Live { .. } => Err(io::Error::other(CounterError::Precondition(
                "Live coverage must be compacted before serialization".to_string(),
            ))),
        }
    }

    pub fn load<R: Read>(reader: &mut R) -> io::Result<Self> {
        IntVector::load(reader).map(Self::Frozen)
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Live { counts, .. } => counts.len() * size_of::<u32>(),
            Self::Frozen(vector) => vector.size_in_bytes(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len()).map(move |ind| match self {
            Self::Live { counts, .. } => counts[ind] as u64,
            Self::Frozen(vector) => vector.get(ind),
        })
    }
}
