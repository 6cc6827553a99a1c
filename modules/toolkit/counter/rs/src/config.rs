use std::path::PathBuf;

use derive_getters::Getters;
use eyre::{ensure, eyre, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};

use gracov_core_rs::parallelism;

/// Construction-time settings of a [`crate::Counter`].
#[derive(Clone, PartialEq, Eq, Debug, Getters)]
pub struct Config {
    // Width of a position bin, 0 keeps every position in a single bin
    bin_size: usize,
    // Threads used to build bin indexes; negative values count back from the available maximum
    threads: isize,
    // Parent directory of the edit log, the system temp directory if unset
    tmpdir: Option<PathBuf>,
    // Suffix array sampling rate of the bin indexes
    sa_sample_rate: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin_size: 0,
            threads: -1,
            tmpdir: None,
            sa_sample_rate: 32,
        }
    }
}

impl Config {
    pub fn new(bin_size: usize) -> Self {
        Self::default().set_bin_size(bin_size)
    }

    pub fn set_bin_size(mut self, bin_size: usize) -> Self {
        self.bin_size = bin_size;
        self
    }

    pub fn set_threads(mut self, threads: isize) -> Self {
        self.threads = threads;
        self
    }

    pub fn set_tmpdir(mut self, tmpdir: impl Into<PathBuf>) -> Self {
        self.tmpdir = Some(tmpdir.into());
        self
    }

    pub fn set_sa_sample_rate(mut self, rate: usize) -> Self {
        self.sa_sample_rate = rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.sa_sample_rate > 0, "Suffix array sample rate must be positive");
        if let Some(tmpdir) = &self.tmpdir {
            ensure!(
                tmpdir.is_dir(),
                "Edit log directory {} doesn't exist",
                tmpdir.display()
            );
        }
        Ok(())
    }

    /// Number of bins covering a basis of the given length. Never zero.
    pub fn n_bins(&self, basis_length: usize) -> usize {
        if self.bin_size == 0 {
            1
        } else {
            basis_length.div_ceil(self.bin_size).max(1)
        }
    }

    pub fn thread_pool(&self) -> Result<ThreadPool> {
        let threads = parallelism::threads(self.threads)?;
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|ind| format!("gracov-counter-{}", ind))
            .build()
            .map_err(|err| eyre!("Failed to start a pool of {} threads: {}", threads, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_bins() {
        for (bin_size, length, expected) in [
            (0, 0, 1),
            (0, 1000, 1),
            (10, 25, 3),
            (10, 30, 3),
            (10, 31, 4),
            (10, 0, 1),
            (1, 5, 5),
            (100, 5, 1),
        ] {
            assert_eq!(Config::new(bin_size).n_bins(length), expected);
        }
    }

    #[test]
    fn test_builder() -> Result<()> {
        let scratch = tempfile::tempdir()?;
        let config = Config::new(10)
            .set_threads(2)
            .set_sa_sample_rate(4)
            .set_tmpdir(scratch.path());
        assert_eq!(*config.bin_size(), 10);
        assert_eq!(*config.threads(), 2);
        assert_eq!(config.tmpdir().as_deref(), Some(scratch.path()));
        config.validate()?;
        assert!(config.thread_pool()?.current_num_threads() <= 2);

        assert!(Config::default().set_sa_sample_rate(0).validate().is_err());
        assert!(Config::default()
            .set_tmpdir(scratch.path().join("missing"))
            .validate()
            .is_err());
        Ok(())
    }
}
