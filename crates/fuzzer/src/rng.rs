// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Random sources for the fuzzer

use std::{collections::VecDeque, fmt};

use rand::{RngCore, SeedableRng};
use thiserror::Error;
use tracing::trace;

/// Errors produced by a [`FuzzRng`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RngError {
    /// A fixed sequence ran out of numbers
    #[error("fixed random sequence exhausted after {drawn} draws")]
    Exhausted {
        /// Numbers produced before the sequence ran out
        drawn: usize,
    },
}

/// Callback invoked with every number a [`FuzzRng`] produces
pub type DrawObserver = Box<dyn FnMut(u32) + Send>;

/// Where the numbers come from
#[derive(Debug)]
pub enum RngSource {
    /// Replay of a recorded sequence, front first
    Fixed(VecDeque<u32>),
    /// Seeded Mersenne Twister
    Seeded(Mt19937),
}

const MT_N: usize = 624;
const MT_M: usize = 397;
const MT_MATRIX_A: u32 = 0x9908_b0df;
const MT_UPPER_MASK: u32 = 0x8000_0000;
const MT_LOWER_MASK: u32 = 0x7fff_ffff;

/// The 32-bit Mersenne Twister with the standard MT19937 parameters.
///
/// A given seed yields the same sequence as `std::mt19937`, so seeds recorded
/// by other MT19937-based fuzzers replay here.
#[derive(Clone)]
pub struct Mt19937 {
    state: [u32; MT_N],
    index: usize,
}

impl Mt19937 {
    /// Default seed of `std::mt19937`
    pub const DEFAULT_SEED: u32 = 5489;

    /// Generator initialized from `seed`
    pub fn new(seed: u32) -> Self {
        let mut state = [0u32; MT_N];
        state[0] = seed;
        for i in 1..MT_N {
            let prev = state[i - 1];
            state[i] = 1_812_433_253u32.wrapping_mul(prev ^ (prev >> 30)).wrapping_add(i as u32);
        }
        Self { state, index: MT_N }
    }

    fn twist(&mut self) {
        for i in 0..MT_N {
            let y = (self.state[i] & MT_UPPER_MASK) | (self.state[(i + 1) % MT_N] & MT_LOWER_MASK);
            let mut next = self.state[(i + MT_M) % MT_N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MT_MATRIX_A;
            }
            self.state[i] = next;
        }
        self.index = 0;
    }
}

impl fmt::Debug for Mt19937 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mt19937").field("index", &self.index).finish_non_exhaustive()
    }
}

impl RngCore for Mt19937 {
    fn next_u32(&mut self) -> u32 {
        if self.index >= MT_N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.next_u32() as u64;
        let high = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl SeedableRng for Mt19937 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

/// The fuzzer's random source.
pub struct FuzzRng {
    source: RngSource,
    observer: Option<DrawObserver>,
    drawn: usize,
}

impl fmt::Debug for FuzzRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzRng")
            .field("source", &self.source)
            .field("observed", &self.observer.is_some())
            .field("drawn", &self.drawn)
            .finish()
    }
}

impl FuzzRng {
    /// Build from an explicit source
    pub fn new(source: RngSource) -> Self {
        Self { source, observer: None, drawn: 0 }
    }

    /// Replay `values` in order
    pub fn fixed(values: impl IntoIterator<Item = u32>) -> Self {
        Self::new(RngSource::Fixed(values.into_iter().collect()))
    }

    /// Deterministic MT19937 generator for `seed`
    pub fn seeded(seed: u32) -> Self {
        Self::new(RngSource::Seeded(Mt19937::new(seed)))
    }

    /// Report every future draw to `observer`, replacing any previous one
    pub fn set_observer(&mut self, observer: impl FnMut(u32) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Stop reporting draws
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Numbers produced so far
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Next number of the sequence
    pub fn next_u32(&mut self) -> Result<u32, RngError> {
        let value = match &mut self.source {
            RngSource::Fixed(queue) => {
                queue.pop_front().ok_or(RngError::Exhausted { drawn: self.drawn })?
            }
            RngSource::Seeded(rng) => rng.next_u32(),
        };
        self.drawn += 1;
        trace!(value, drawn = self.drawn, "rng draw");
        if let Some(observer) = &mut self.observer {
            observer(value);
        }
        Ok(value)
    }

    /// A number in `0..bound`. `bound` of zero is treated as one.
    pub fn below(&mut self, bound: u32) -> Result<u32, RngError> {
        Ok(self.next_u32()? % bound.max(1))
    }

    /// Pick one element of a non-empty slice
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Result<Option<&'a T>, RngError> {
        if items.is_empty() {
            return Ok(None);
        }
        let index = self.below(items.len() as u32)? as usize;
        Ok(items.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_wraps_into_range() {
        let mut rng = FuzzRng::fixed([7, 3, 10]);
        assert_eq!(rng.below(5).unwrap(), 2);
        assert_eq!(rng.below(0).unwrap(), 0);
        assert_eq!(rng.below(10).unwrap(), 0);
        assert_eq!(rng.drawn(), 3);
    }

    #[test]
    fn test_choose() {
        let mut rng = FuzzRng::fixed([4]);
        assert_eq!(rng.choose(&["a", "b", "c"]).unwrap(), Some(&"b"));
        assert_eq!(rng.choose::<u8>(&[]).unwrap(), None);
        assert_eq!(rng.drawn(), 1);
    }

    #[test]
    fn test_mt19937_reference_outputs() {
        let mut mt = Mt19937::new(Mt19937::DEFAULT_SEED);
        assert_eq!(mt.next_u32(), 3_499_211_612);
        assert_eq!(mt.next_u32(), 581_869_302);
        // std::mt19937 must yield 4123659995 as its 10000th output
        let mut mt = Mt19937::from_seed(Mt19937::DEFAULT_SEED.to_le_bytes());
        let tenth_thousand = (0..10_000).map(|_| mt.next_u32()).last();
        assert_eq!(tenth_thousand, Some(4_123_659_995));
    }

    #[test]
    fn test_seeded_source_replays_mt19937() {
        let mut rng = FuzzRng::seeded(Mt19937::DEFAULT_SEED);
        assert_eq!(rng.next_u32().unwrap(), 3_499_211_612);
        assert_eq!(rng.next_u32().unwrap(), 581_869_302);
        assert_eq!(rng.drawn(), 2);
    }
}
