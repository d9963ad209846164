//! Psi array construction for small inputs.
//!
//! The suffix array is built by prefix doubling with comparison sorts, which
//! is fine for tests, benches and the command line tool but is not meant for
//! large texts.

/// Computes `Psi[i] = ISA[SA[i] + 1]` for `text` followed by a unique sentinel
/// that sorts before every byte. The result has `text.len() + 1` entries, and
/// the entry of the suffix starting at the sentinel wraps around to `ISA[0]`.
pub fn psi_from_text(text: &[u8]) -> Vec<u64> {
    let sa = suffix_array(text);
    let n = sa.len();

    let mut isa = vec![0; n];
    for (i, &pos) in sa.iter().enumerate() {
        isa[pos] = i;
    }
    sa.iter().map(|&pos| isa[(pos + 1) % n] as u64).collect()
}

// Suffix array of text + sentinel.
fn suffix_array(text: &[u8]) -> Vec<usize> {
    let n = text.len() + 1;
    let mut sa: Vec<usize> = (0..n).collect();
    // Shift bytes up by one so that 0 is free for the sentinel.
    let mut rank: Vec<usize> = text
        .iter()
        .map(|&c| c as usize + 1)
        .chain(std::iter::once(0))
        .collect();
    let mut next = vec![0; n];

    let mut k = 1;
    loop {
        {
            // Suffixes that run out of characters sort first.
            let key = |i: usize| (rank[i], if i + k < n { rank[i + k] + 1 } else { 0 });
            sa.sort_unstable_by_key(|&i| key(i));
            next[sa[0]] = 0;
            for w in 1..n {
                let step = (key(sa[w - 1]) != key(sa[w])) as usize;
                next[sa[w]] = next[sa[w - 1]] + step;
            }
        }
        std::mem::swap(&mut rank, &mut next);
        if rank[sa[n - 1]] == n - 1 || k >= n {
            break;
        }
        k *= 2;
    }
    sa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_suffix_array(text: &[u8]) -> Vec<usize> {
        let symbols: Vec<u16> = text.iter().map(|&c| c as u16 + 1).chain([0]).collect();
        let mut sa: Vec<usize> = (0..symbols.len()).collect();
        sa.sort_by(|&a, &b| symbols[a..].cmp(&symbols[b..]));
        sa
    }

    #[test]
    fn test_banana() {
        assert_eq!(suffix_array(b"banana"), vec![6, 5, 3, 1, 0, 4, 2]);
        assert_eq!(psi_from_text(b"banana"), vec![4, 0, 5, 6, 3, 1, 2]);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(psi_from_text(b""), vec![0]);
    }

    #[test]
    fn test_matches_naive_suffix_sort() {
        for text in [
            &b"mississippi"[..],
            b"aaaaaaaaaaaaaaaa",
            b"abababababababab",
            b"the quick brown fox jumps over the lazy dog",
            b"\x00\x00\x01\x00\xff",
        ] {
            assert_eq!(suffix_array(text), naive_suffix_array(text), "{:?}", text);
        }
    }

    #[test]
    fn test_psi_is_increasing_per_symbol() {
        let text = b"abracadabra alakazam";
        let psi = psi_from_text(text);
        let sa = suffix_array(text);

        let mut seen = vec![false; psi.len()];
        for &p in &psi {
            assert!(!seen[p as usize]);
            seen[p as usize] = true;
        }
        // Neighbouring suffixes with the same first symbol keep their order after one step.
        for i in 1..psi.len() {
            let a = text.get(sa[i - 1]);
            let b = text.get(sa[i]);
            if a.is_some() && a == b {
                assert!(psi[i - 1] < psi[i], "at {}", i);
            }
        }
    }
}
