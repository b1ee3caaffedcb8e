// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Source of uniformly distributed 64-bit values.
///
/// Encoders and hash families draw all of their randomness through this trait so that a seed
/// fully determines their output.
pub trait RandomSource {
    /// Returns the next random 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Returns a uniform float in `[0, 1)` with 53 bits of precision.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Returns `true` with probability `p`.
    ///
    /// `p >= 1.0` always yields `true` and `p <= 0.0` always yields `false`.
    fn next_bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Returns a uniform integer in `[0, bound)`.
    ///
    /// Uses rejection sampling, so every value is exactly equally likely.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    fn next_below(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "bound must be positive");
        // 2^64 mod bound; values below this threshold would bias the modulo.
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let x = self.next_u64();
            if x >= threshold {
                return x % bound;
            }
        }
    }
}

/// One step of the SplitMix64 output function.
pub(crate) fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Xorshift generator. Fast and statistically adequate; not cryptographically secure.
#[derive(Debug, Clone, Copy)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Creates a new generator using the provided seed.
    ///
    /// The seed is scrambled first so that nearby seeds give unrelated streams.
    pub fn seeded(seed: u64) -> Self {
        let state = mix64(seed.wrapping_add(GOLDEN_GAMMA));
        let state = if state == 0 { GOLDEN_GAMMA } else { state };
        Self { state }
    }

    /// Creates a generator for stream `stream` of the seed `seed`.
    ///
    /// Distinct streams of one seed are independent of each other, which lets every client of a
    /// sketch run its own generator.
    pub fn for_stream(seed: u64, stream: u64) -> Self {
        Self::seeded(seed ^ mix64(stream.wrapping_mul(GOLDEN_GAMMA).wrapping_add(1)))
    }
}

impl RandomSource for XorShift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = XorShift64::seeded(42);
        let mut b = XorShift64::seeded(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_streams_diverge() {
        let mut a = XorShift64::for_stream(42, 0);
        let mut b = XorShift64::for_stream(42, 1);
        let same = (0..100).filter(|_| a.next_u64() == b.next_u64()).count();
        assert_eq!(same, 0);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = XorShift64::seeded(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn test_next_below_stays_in_range() {
        let mut rng = XorShift64::seeded(7);
        let mut seen = [false; 30];
        for _ in 0..10_000 {
            let x = rng.next_below(30) as usize;
            seen[x] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(rng.next_below(1), 0);
    }

    #[test]
    fn test_next_f64_in_unit_interval() {
        let mut rng = XorShift64::seeded(11);
        for _ in 0..10_000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_bernoulli_extremes_and_rate() {
        let mut rng = XorShift64::seeded(3);
        assert!((0..1000).all(|_| rng.next_bernoulli(1.0)));
        assert!((0..1000).all(|_| !rng.next_bernoulli(0.0)));

        let hits = (0..100_000).filter(|_| rng.next_bernoulli(0.25)).count();
        let rate = hits as f64 / 100_000.0;
        assert!((rate - 0.25).abs() < 0.01, "rate {rate}");
    }
}
