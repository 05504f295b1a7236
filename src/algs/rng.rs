//! Counter-based random state with explicit domain separation.
//!
//! The caller owns an [`RngState`] `{seed, counter}`. A sampling call derives
//! one [`RngSubstream`] per `(rank, hop)`: a ChaCha8 keystream keyed by
//! `seed`, whose 64-bit stream id is `rank << 32 | hop`, starting at word
//! position `counter`. Inside a substream every draw consumes exactly one
//! 64-bit word, and each frontier vertex starts at a precomputed draw offset,
//! so the draws a vertex sees do not depend on how work is scheduled.
//!
//! At the end of a call every rank advances `counter` by the largest number
//! of draws any substream consumed across the whole group, so the next call
//! continues without repeating values.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Caller-owned random state; reuse it verbatim to continue a stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    /// Position, in draws, where the next call starts.
    pub counter: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Move the counter past `draws` consumed values.
    pub fn advance(&mut self, draws: u64) {
        self.counter = self.counter.wrapping_add(draws);
    }

    /// Substream for `(rank, hop)` of the current call.
    pub fn substream(&self, rank: usize, hop: usize) -> RngSubstream {
        RngSubstream {
            seed: self.seed,
            stream: ((rank as u64) << 32) | (hop as u64 & 0xFFFF_FFFF),
            base: self.counter,
        }
    }
}

/// Deterministic keystream owned by one `(rank, hop)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RngSubstream {
    seed: u64,
    stream: u64,
    base: u64,
}

impl RngSubstream {
    /// Generator positioned `offset` draws into this substream.
    pub fn draws_at(&self, offset: u64) -> Draws {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(self.stream);
        // ChaCha positions are counted in 32-bit words; one draw is two words.
        rng.set_word_pos(u128::from(self.base.wrapping_add(offset)) * 2);
        Draws { rng }
    }
}

/// A run of draws from a substream.
#[derive(Clone, Debug)]
pub struct Draws {
    rng: ChaCha8Rng,
}

impl Draws {
    /// Uniform index in `0..n` from exactly one 64-bit draw (`n > 0`).
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let x = self.rng.next_u64();
        ((u128::from(x) * n as u128) >> 64) as usize
    }
}

/// Draws a vertex with `degree` out-edges consumes for one sampling request.
///
/// `fanout < 0` (take all) and `degree == 0` draw nothing. With replacement
/// every one of the `fanout` picks is a draw; without replacement Floyd's
/// algorithm draws `fanout` times only when it must choose (`fanout < degree`).
pub fn draws_for(degree: usize, fanout: i32, with_replacement: bool) -> u64 {
    if fanout < 0 || degree == 0 {
        return 0;
    }
    let k = fanout as usize;
    if with_replacement || k < degree {
        k as u64
    } else {
        0
    }
}
