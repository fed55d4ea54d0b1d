//! Match Randomness
//!
//! Every random draw in a match (deck shuffles, AI timers, lane rolls) comes
//! from one `MatchRng` stored on the match state. Pinning the seed pins the
//! whole match.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Xorshift128+ generator.
///
/// ```
/// use gold_mine::core::rng::MatchRng;
///
/// let mut a = MatchRng::new(7);
/// let mut b = MatchRng::new(7);
/// assert_eq!(a.next_f32(), b.next_f32());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRng {
    s: [u64; 2],
}

impl MatchRng {
    /// Expand a 64-bit seed into generator state.
    pub fn new(seed: u64) -> Self {
        let mut mix = seed;
        let s = [splitmix64(&mut mix), splitmix64(&mut mix)];
        // All-zero state would stick at zero forever
        if s == [0, 0] {
            return Self { s: [1, 1] };
        }
        Self { s }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let [a, b] = self.s;
        let out = a.wrapping_add(b);
        let b = b ^ a;
        self.s = [a.rotate_left(24) ^ b ^ (b << 16), b.rotate_left(37)];
        out
    }

    /// Uniform index below `len`; 0 for an empty range.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        match len {
            0 => 0,
            n => (self.next_u64() % n as u64) as usize,
        }
    }

    /// Uniform in `[0, 1)` from the top 24 bits.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u32 << 24) as f32;
        (self.next_u64() >> 40) as f32 * SCALE
    }

    /// Uniform in `[lo, hi)`. Returns `lo` when the range is empty.
    pub fn next_f32_range(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.next_f32()
    }

    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }

    /// Fisher-Yates, back to front.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

fn splitmix64(x: &mut u64) -> u64 {
    *x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for one match: sha256 over a domain tag, the match id and the
/// configured base seed, truncated to the first eight bytes.
pub fn derive_match_seed(match_id: &[u8; 16], base_seed: u64) -> u64 {
    let digest = Sha256::new()
        .chain_update(b"GOLD_MINE_SEED_V1")
        .chain_update(match_id)
        .chain_update(base_seed.to_le_bytes())
        .finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = MatchRng::new(2024);
        let mut b = MatchRng::new(2024);
        let xs: Vec<u64> = (0..256).map(|_| a.next_u64()).collect();
        let ys: Vec<u64> = (0..256).map(|_| b.next_u64()).collect();
        assert_eq!(xs, ys);

        assert_ne!(MatchRng::new(1).next_u64(), MatchRng::new(2).next_u64());
    }

    #[test]
    fn test_index_stays_in_range() {
        let mut rng = MatchRng::new(31);
        assert_eq!(rng.next_index(0), 0);
        assert_eq!(rng.next_index(1), 0);
        assert!((0..500).all(|_| rng.next_index(4) < 4));
    }

    #[test]
    fn test_ai_interval_range() {
        let mut rng = MatchRng::new(9);
        for _ in 0..500 {
            let t = rng.next_f32_range(1.35, 2.10);
            assert!((1.35..2.10).contains(&t), "{t}");
        }
        assert_eq!(rng.next_f32_range(4.0, 1.0), 4.0);
    }

    #[test]
    fn test_chance_bounds() {
        let mut rng = MatchRng::new(77);
        assert!((0..100).all(|_| !rng.chance(0.0)));
        assert!((0..100).all(|_| rng.chance(1.0)));
    }

    #[test]
    fn test_shuffle_keeps_every_card() {
        let ids = ["archer", "knight", "giant", "pump", "goblin", "wizard", "bomber", "golem"];
        let mut deck = ids.to_vec();
        MatchRng::new(3).shuffle(&mut deck);

        let mut again = ids.to_vec();
        MatchRng::new(3).shuffle(&mut again);
        assert_eq!(deck, again);

        deck.sort_unstable();
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        assert_eq!(deck, sorted);
    }

    #[test]
    fn test_match_seed_depends_on_id_and_base() {
        let id = [4u8; 16];
        let seed = derive_match_seed(&id, 10);
        assert_eq!(seed, derive_match_seed(&id, 10));
        assert_ne!(seed, derive_match_seed(&id, 11));
        assert_ne!(seed, derive_match_seed(&[5u8; 16], 10));
    }
}
