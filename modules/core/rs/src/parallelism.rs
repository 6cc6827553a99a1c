use std::cmp::Ordering;
use std::thread::available_parallelism;

use eyre::{Result, WrapErr};

/// Resolve a requested thread count against `max` available threads.
///
/// Positive requests are capped at `max`, zero means a single thread and negative requests
/// count back from `max` (-1 is every available thread).
pub fn normalize(requested: isize, max: usize) -> usize {
    let max = max.max(1) as isize;
    match requested.cmp(&0) {
        Ordering::Less => (max + requested + 1).max(1) as usize,
        Ordering::Equal => 1,
        Ordering::Greater => requested.min(max) as usize,
    }
}

/// Number of worker threads to use on this machine for the requested count.
pub fn threads(requested: isize) -> Result<usize> {
    let max = available_parallelism()
        .wrap_err("Failed to query the available parallelism")?
        .get();
    Ok(normalize(requested, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        for (requested, max, expected) in [
            (0, 4, 1),
            (1, 4, 1),
            (3, 4, 3),
            (5, 4, 4),
            (1231, 4, 4),
            (-1, 4, 4),
            (-2, 4, 3),
            (-4, 4, 1),
            (-5, 4, 1),
            (-1, 0, 1),
        ] {
            assert_eq!(normalize(requested, max), expected, "{} of {}", requested, max);
        }
    }

    #[test]
    fn test_threads() -> Result<()> {
        assert!(threads(-1)? >= 1);
        assert_eq!(threads(1)?, 1);
        Ok(())
    }
}
