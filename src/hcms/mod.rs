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

//! Hadamard Count-Mean Sketch (HCMS) for frequency estimation under local differential privacy.
//!
//! Each client hashes its value with one of `k` hash functions chosen at random, takes the
//! Hadamard transform of the one-hot bucket indicator, and releases a single coordinate of it
//! after flipping its sign with probability `1 / (1 + e^epsilon)`. The aggregator scales and
//! accumulates the released bits into a `k x m` matrix, and a single inverse transform turns
//! that matrix into a count-mean sketch from which per-value frequencies are estimated.
//!
//! All shared state (hash coefficients, the Hadamard matrix, epsilon) lives in an immutable
//! [`HcmsFamily`], built once per collection epoch and shared by reference between every
//! encoder, the aggregator and the estimator.
//!
//! # Usage
//!
//! ```rust
//! # use hcms::hcms::HcmsFamily;
//! let family = HcmsFamily::builder(1024, 64, 4.0).seed(7).build().unwrap();
//!
//! let mut reports = Vec::new();
//! for client in 0..500u64 {
//!     let mut encoder = family.encoder(client);
//!     reports.push(encoder.encode("ken").unwrap());
//! }
//!
//! let aggregation = family.aggregate(&reports);
//! assert!(aggregation.rejected.is_empty());
//! let sketch = aggregation.sketch;
//!
//! let estimate = family.estimate(&sketch, "ken", sketch.num_reports()).unwrap();
//! assert!((estimate - 500.0).abs() < 5.0 * family.standard_error(500));
//! ```

mod aggregator;
mod encoder;
mod family;
mod report;
mod serialization;
mod sketch;

pub use self::aggregator::Aggregation;
pub use self::aggregator::HcmsAggregator;
pub use self::aggregator::RejectedReport;
pub use self::encoder::HcmsEncoder;
pub use self::family::HcmsFamily;
pub use self::family::HcmsFamilyBuilder;
pub use self::report::PrivatizedReport;
pub use self::sketch::HcmsSketch;
use crate::common::RandomSource;

/// Default number of coefficients per hash function (3-wise independence).
pub const DEFAULT_DEGREE: usize = 3;
/// Minimum number of buckets `m`.
pub const MIN_NUM_BUCKETS: u32 = 4;
/// Maximum number of buckets `m`. The Hadamard matrix holds `m^2` bytes.
pub const MAX_NUM_BUCKETS: u32 = 1 << 13;
/// Maximum number of hash functions `k`.
pub const MAX_NUM_HASHES: u32 = 1 << 16;
/// Maximum number of sketch cells `k * m`.
///
/// An aggregator holds `k * m` `f64` cells (32 MiB at the cap) and finalizing costs
/// `O(k * m^2)`.
pub const MAX_NUM_CELLS: u64 = 1 << 22;
/// Maximum number of coefficients per hash function.
pub const MAX_DEGREE: usize = 16;

/// Returns the probability `e^epsilon / (1 + e^epsilon)` that a client keeps the sign of its
/// released coordinate.
///
/// Evaluated as `1 / (1 + e^-epsilon)`: `epsilon = 0` gives exactly `0.5` and
/// `epsilon = +inf` gives exactly `1.0`.
///
/// # Examples
///
/// ```
/// # use hcms::hcms::bias_probability;
/// assert_eq!(bias_probability(0.0), 0.5);
/// assert_eq!(bias_probability(f64::INFINITY), 1.0);
/// ```
pub fn bias_probability(epsilon: f64) -> f64 {
    1.0 / (1.0 + (-epsilon).exp())
}

/// Returns the randomized-response correction `c = (e^epsilon + 1) / (e^epsilon - 1)`.
///
/// Evaluated as `1 / tanh(epsilon / 2)`, which is exactly `1.0` at `epsilon = +inf`.
pub fn bias_correction(epsilon: f64) -> f64 {
    1.0 / (epsilon / 2.0).tanh()
}

/// Which coordinates of the transformed indicator a client may release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinateSampling {
    /// Release coordinate `s^2` for `s` uniform in `[2, floor(sqrt(m - 1))]`.
    ///
    /// Restricting releases to a small fixed set of positions keeps the aggregated matrix
    /// sparse. For `m = 4` the range is empty and coordinate `1` is used.
    #[default]
    PerfectSquares,
    /// Release a coordinate uniform in `[0, m)`.
    Uniform,
}

impl CoordinateSampling {
    /// Draws a coordinate in `[0, num_buckets)`.
    pub fn sample<R: RandomSource>(self, num_buckets: usize, rng: &mut R) -> usize {
        match self {
            CoordinateSampling::PerfectSquares => {
                let max_root = (num_buckets - 1).isqrt();
                if max_root < 2 {
                    return 1;
                }
                let root = 2 + rng.next_below((max_root - 1) as u64) as usize;
                root * root
            }
            CoordinateSampling::Uniform => rng.next_below(num_buckets as u64) as usize,
        }
    }

    /// Returns how many distinct coordinates [`sample`](Self::sample) can draw.
    pub fn num_coordinates(self, num_buckets: usize) -> usize {
        match self {
            CoordinateSampling::PerfectSquares => {
                let max_root = (num_buckets.max(1) - 1).isqrt();
                max_root.saturating_sub(1).max(1)
            }
            CoordinateSampling::Uniform => num_buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::XorShift64;

    #[test]
    fn test_bias_probability() {
        assert_eq!(bias_probability(0.0), 0.5);
        assert_eq!(bias_probability(f64::INFINITY), 1.0);
        let e2 = 2.0f64.exp();
        assert!((bias_probability(2.0) - e2 / (1.0 + e2)).abs() < 1e-12);
    }

    #[test]
    fn test_bias_correction() {
        assert_eq!(bias_correction(f64::INFINITY), 1.0);
        let e2 = 2.0f64.exp();
        assert!((bias_correction(2.0) - (e2 + 1.0) / (e2 - 1.0)).abs() < 1e-12);
        assert!(bias_correction(0.0).is_infinite());
    }

    #[test]
    fn test_perfect_squares_cover_range() {
        let mut rng = XorShift64::seeded(1);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..10_000 {
            seen.insert(CoordinateSampling::PerfectSquares.sample(1024, &mut rng));
        }
        let expected: std::collections::BTreeSet<usize> = (2..=31).map(|s| s * s).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_perfect_squares_small_orders() {
        let mut rng = XorShift64::seeded(1);
        for _ in 0..100 {
            assert_eq!(CoordinateSampling::PerfectSquares.sample(4, &mut rng), 1);
            assert_eq!(CoordinateSampling::PerfectSquares.sample(8, &mut rng), 4);
            let l = CoordinateSampling::PerfectSquares.sample(16, &mut rng);
            assert!(l == 4 || l == 9);
        }
    }

    #[test]
    fn test_num_coordinates() {
        let squares = CoordinateSampling::PerfectSquares;
        assert_eq!(squares.num_coordinates(4), 1);
        assert_eq!(squares.num_coordinates(8), 1);
        assert_eq!(squares.num_coordinates(16), 2);
        assert_eq!(squares.num_coordinates(1024), 30);
        assert_eq!(CoordinateSampling::Uniform.num_coordinates(1024), 1024);
    }

    #[test]
    fn test_uniform_stays_in_range() {
        let mut rng = XorShift64::seeded(2);
        for _ in 0..1000 {
            assert!(CoordinateSampling::Uniform.sample(32, &mut rng) < 32);
        }
    }
}
