//! Suffix array construction by prefix doubling.

use std::iter::once;

/// Suffix array of `text` terminated by an implicit sentinel that is smaller than any byte.
///
/// The result has `text.len() + 1` entries and always starts with `text.len()`, the position
/// of the sentinel. Runs in O(n log^2 n).
pub fn build(text: &[u8]) -> Vec<usize> {
    let n = text.len() + 1;
    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<usize> = text
        .iter()
        .map(|&x| x as usize + 1)
        .chain(once(0))
        .collect();
    let mut next = vec![0usize; n];

    let mut k = 1;
    loop {
        {
            let key = |i: usize| (rank[i], if i + k < n { rank[i + k] + 1 } else { 0 });
            sa.sort_unstable_by_key(|&i| key(i));

            next[sa[0]] = 0;
            for w in 1..n {
                let fresh = key(sa[w - 1]) != key(sa[w]);
                next[sa[w]] = next[sa[w - 1]] + fresh as usize;
            }
        }
        std::mem::swap(&mut rank, &mut next);

        if rank[sa[n - 1]] == n - 1 {
            break;
        }
        k <<= 1;
    }
    sa
}
