use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use tempfile::TempDir;

use super::error::CounterError;
use super::escape::DELIM1;

enum State {
    Unopened,
    Open { dir: TempDir, sinks: Vec<BufWriter<File>> },
    // No directory if the log was sealed without ever being written to
    Sealed { dir: Option<TempDir> },
    Discarded,
}

/// Append-only, per-bin spill buffer of encoded edit records.
///
/// Bin files live in a private temporary directory that is created on the first write and
/// removed by [`EditLog::discard`] or when the log is dropped, whichever comes first.
pub struct EditLog {
    n_bins: usize,
    tmpdir: Option<PathBuf>,
    state: State,
}

impl EditLog {
    pub fn new(n_bins: usize, tmpdir: Option<PathBuf>) -> Self {
        Self {
            n_bins,
            tmpdir,
            state: State::Unopened,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    fn bin_path(dir: &Path, bin: usize) -> PathBuf {
        dir.join(format!("bin_{}", bin))
    }

    /// Allocate one append target per bin. Idempotent while the log is open.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            State::Open { .. } => return Ok(()),
            State::Sealed { .. } | State::Discarded => {
                return Err(CounterError::Precondition(
                    "Edit log can't be reopened once sealed".to_string(),
                )
                .into())
            }
            State::Unopened => {}
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(".gracov-counter-");
        let dir = match &self.tmpdir {
            Some(tmpdir) => builder.tempdir_in(tmpdir),
            None => builder.tempdir(),
        }
        .wrap_err("Failed to create the edit log directory")?;

        // The directory is dropped (and removed) if any bin file fails to open
        let sinks = (0..self.n_bins)
            .map(|bin| {
                let path = Self::bin_path(dir.path(), bin);
                File::create(&path)
                    .map(BufWriter::new)
                    .wrap_err_with(|| format!("Failed to create edit log file {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Opened edit log with {} bins at {}",
            self.n_bins,
            dir.path().display()
        );
        self.state = State::Open { dir, sinks };
        Ok(())
    }

    /// Append raw record bytes to the bin, opening the log on first use.
    pub fn append(&mut self, bin: usize, bytes: &[u8]) -> Result<()> {
        if bin >= self.n_bins {
            return Err(CounterError::Precondition(format!(
                "Bin {} is out of bounds for the edit log with {} bins",
                bin, self.n_bins
            ))
            .into());
        }
        self.open()?;
        match &mut self.state {
            State::Open { sinks, .. } => sinks[bin]
                .write_all(bytes)
                .wrap_err_with(|| format!("Failed to append to edit log bin {}", bin)),
            _ => Err(CounterError::Precondition("Edit log is not open".to_string()).into()),
        }
    }

    /// Terminate every bin with a trailing separator and flush it to disk. Must run exactly once.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Discarded) {
            State::Unopened => {
                self.state = State::Sealed { dir: None };
                Ok(())
            }
            State::Open { dir, sinks } => {
                // Keep the directory owned by the log even if a flush fails
                self.state = State::Sealed { dir: Some(dir) };
                for (bin, mut sink) in sinks.into_iter().enumerate() {
                    sink.write_all(&[DELIM1])
                        .and_then(|_| sink.flush())
                        .wrap_err_with(|| format!("Failed to flush edit log bin {}", bin))?;
                }
                Ok(())
            }
            state @ (State::Sealed { .. } | State::Discarded) => {
                self.state = state;
                Err(CounterError::Precondition("Edit log is already closed".to_string()).into())
            }
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.state, State::Sealed { .. })
    }

    /// Full corpus of a sealed bin, trailing separator included.
    pub fn corpus(&self, bin: usize) -> Result<Vec<u8>> {
        if bin >= self.n_bins {
            return Err(CounterError::Precondition(format!(
                "Bin {} is out of bounds for the edit log with {} bins",
                bin, self.n_bins
            ))
            .into());
        }
        match &self.state {
            State::Sealed { dir: None } => Ok(vec![DELIM1]),
            State::Sealed { dir: Some(dir) } => {
                let path = Self::bin_path(dir.path(), bin);
                fs::read(&path)
                    .wrap_err_with(|| format!("Failed to read edit log file {}", path.display()))
            }
            _ => Err(CounterError::Precondition(
                "Edit log corpus is only available once sealed".to_string(),
            )
            .into()),
        }
    }

    /// Remove all backing files. Failures are logged and otherwise ignored.
    pub fn discard(&mut self) {
        let dir = match std::mem::replace(&mut self.state, State::Discarded) {
            State::Open { dir, sinks } => {
                drop(sinks);
                Some(dir)
            }
            State::Sealed { dir } => dir,
            State::Unopened | State::Discarded => None,
        };
        if let Some(dir) = dir {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                log::warn!("Failed to remove edit log at {}: {}", path.display(), err);
            }
        }
    }
}

impl Drop for EditLog {
    fn drop(&mut self) {
        self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() -> Result<()> {
        let scratch = tempfile::tempdir()?;
        let mut log = EditLog::new(2, Some(scratch.path().to_path_buf()));
        log.append(1, b"ab")?;
        log.append(1, b"cd")?;
        log.append(0, b"x")?;
        assert!(log.append(2, b"x").is_err());
        assert_eq!(fs::read_dir(scratch.path())?.count(), 1);

        log.close()?;
        assert!(log.is_sealed());
        assert_eq!(log.corpus(0)?, vec![b'x', DELIM1]);
        assert_eq!(log.corpus(1)?, vec![b'a', b'b', b'c', b'd', DELIM1]);
        assert!(log.close().is_err());
        assert!(log.append(0, b"y").is_err());

        log.discard();
        assert_eq!(fs::read_dir(scratch.path())?.count(), 0);
        assert!(log.corpus(0).is_err());
        // Tolerant of repeated cleanup
        log.discard();
        Ok(())
    }

    #[test]
    fn test_never_opened() -> Result<()> {
        let mut log = EditLog::new(3, None);
        assert!(log.corpus(0).is_err());
        log.close()?;
        for bin in 0..3 {
            assert_eq!(log.corpus(bin)?, vec![DELIM1]);
        }
        Ok(())
    }

    #[test]
    fn test_removed_on_drop() -> Result<()> {
        let scratch = tempfile::tempdir()?;
        {
            let mut log = EditLog::new(1, Some(scratch.path().to_path_buf()));
            log.open()?;
            log.open()?;
            log.append(0, b"z")?;
            assert_eq!(fs::read_dir(scratch.path())?.count(), 1);
        }
        assert_eq!(fs::read_dir(scratch.path())?.count(), 0);
        Ok(())
    }
}
