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

use std::borrow::Borrow;

use super::CoordinateSampling;
use super::DEFAULT_DEGREE;
use super::MAX_DEGREE;
use super::MAX_NUM_BUCKETS;
use super::MAX_NUM_CELLS;
use super::MAX_NUM_HASHES;
use super::MIN_NUM_BUCKETS;
use super::aggregator::Aggregation;
use super::aggregator::HcmsAggregator;
use super::aggregator::RejectedReport;
use super::bias_correction;
use super::bias_probability;
use super::encoder::HcmsEncoder;
use super::report::PrivatizedReport;
use super::sketch::HcmsSketch;
use crate::common::NumStdDev;
use crate::common::XorShift64;
use crate::error::Error;
use crate::hadamard::HadamardMatrix;
use crate::hash::DEFAULT_SEED;
use crate::hash::HashFamily;
use crate::hash::compute_seed_hash;

/// The parameters that must agree between the components of one sketch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Fingerprint {
    pub num_hashes: usize,
    pub num_buckets: usize,
    pub degree: usize,
    pub seed_hash: u16,
    pub epsilon: f64,
}

impl Fingerprint {
    pub fn ensure_matches(&self, other: &Fingerprint) -> Result<(), Error> {
        // Compare epsilon bitwise so that +inf matches itself.
        let same = self.num_hashes == other.num_hashes
            && self.num_buckets == other.num_buckets
            && self.degree == other.degree
            && self.seed_hash == other.seed_hash
            && self.epsilon.to_bits() == other.epsilon.to_bits();
        if same {
            Ok(())
        } else {
            Err(
                Error::invalid_parameter("sketch components belong to different families")
                    .with_context("expected", format!("{self:?}"))
                    .with_context("actual", format!("{other:?}")),
            )
        }
    }
}

/// The shared, immutable state of one HCMS collection epoch.
///
/// A family owns the `k` hash functions, the order-`m` Hadamard matrix and the privacy budget.
/// It is built once, then shared by reference with every client encoder, the aggregator and
/// the estimator. It is `Send + Sync`; wrap it in an `Arc` to share it across threads that
/// outlive the builder's scope.
///
/// See the [hcms module level documentation](crate::hcms) for a full example.
#[derive(Debug, Clone)]
pub struct HcmsFamily {
    num_buckets: usize,
    num_hashes: usize,
    epsilon: f64,
    seed: u64,
    coordinate_sampling: CoordinateSampling,
    bias_probability: f64,
    bias_correction: f64,
    hashes: HashFamily,
    hadamard: HadamardMatrix,
}

impl HcmsFamily {
    /// Returns a builder for a family with `num_buckets` buckets (`m`), `num_hashes` hash
    /// functions (`k`) and privacy budget `epsilon`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::hcms::HcmsFamily;
    /// let family = HcmsFamily::builder(1024, 64, 2.0).seed(42).build().unwrap();
    /// assert_eq!(family.num_buckets(), 1024);
    /// assert_eq!(family.num_hashes(), 64);
    /// ```
    pub fn builder(num_buckets: u32, num_hashes: u32, epsilon: f64) -> HcmsFamilyBuilder {
        HcmsFamilyBuilder {
            num_buckets,
            num_hashes,
            epsilon,
            degree: DEFAULT_DEGREE,
            seed: DEFAULT_SEED,
            coordinate_sampling: CoordinateSampling::default(),
        }
    }

    /// Returns the number of buckets `m`.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Returns the number of hash functions `k`.
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Returns the privacy budget.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the seed the hash coefficients and client streams derive from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of coefficients per hash function.
    pub fn degree(&self) -> usize {
        self.hashes.degree()
    }

    /// Returns the coordinate sampling policy of the encoders.
    pub fn coordinate_sampling(&self) -> CoordinateSampling {
        self.coordinate_sampling
    }

    /// Returns the probability that an encoder keeps the sign of its released coordinate.
    pub fn bias_probability(&self) -> f64 {
        self.bias_probability
    }

    /// Returns the randomized-response correction factor applied during aggregation.
    pub fn bias_correction(&self) -> f64 {
        self.bias_correction
    }

    /// Returns the shared hash functions.
    pub fn hashes(&self) -> &HashFamily {
        &self.hashes
    }

    /// Returns the shared Hadamard matrix.
    pub fn hadamard(&self) -> &HadamardMatrix {
        &self.hadamard
    }

    /// Hashes `value` with function `hash_index` (1-based) into `[0, m)`.
    pub fn hash(&self, value: &str, hash_index: usize) -> Result<usize, Error> {
        self.hashes.hash(value, hash_index, self.num_buckets)
    }

    /// Returns an encoder for client stream `stream`.
    ///
    /// The encoder's randomness is derived from the family seed and the stream id, so the
    /// same `(seed, stream)` pair always produces the same reports. Give every client its own
    /// stream.
    pub fn encoder(&self, stream: u64) -> HcmsEncoder<'_, XorShift64> {
        HcmsEncoder::with_random(self, XorShift64::for_stream(self.seed, stream))
    }

    /// Returns an empty aggregator for reports of this family.
    pub fn aggregator(&self) -> HcmsAggregator<'_> {
        HcmsAggregator::new(self)
    }

    /// Aggregates a batch of reports into a finalized sketch.
    ///
    /// Corrupt reports are skipped and returned in [`Aggregation::rejected`] together with
    /// their position in the batch; they never abort the batch.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::hcms::HcmsFamily;
    /// # use hcms::hcms::PrivatizedReport;
    /// let family = HcmsFamily::builder(16, 4, 1.0).build().unwrap();
    /// let reports = vec![
    ///     PrivatizedReport::new(1, 1, 4),
    ///     PrivatizedReport::new(1, 0, 4), // hash index is 1-based
    ///     PrivatizedReport::new(-1, 4, 9),
    /// ];
    /// let aggregation = family.aggregate(&reports);
    /// assert_eq!(aggregation.sketch.num_reports(), 2);
    /// assert_eq!(aggregation.rejected.len(), 1);
    /// assert_eq!(aggregation.rejected[0].position, 1);
    /// ```
    pub fn aggregate<I>(&self, reports: I) -> Aggregation
    where
        I: IntoIterator,
        I::Item: Borrow<PrivatizedReport>,
    {
        let mut aggregator = self.aggregator();
        let mut rejected = Vec::new();
        for (position, report) in reports.into_iter().enumerate() {
            let report = *report.borrow();
            if let Err(error) = aggregator.update(&report) {
                tracing::warn!(position, %error, "rejected corrupt report");
                rejected.push(RejectedReport {
                    position,
                    report,
                    error,
                });
            }
        }
        Aggregation {
            sketch: aggregator.finalize(),
            rejected,
        }
    }

    /// Estimates how many of the `total_reports` reports folded into `sketch` carry `value`.
    ///
    /// The result is unbiased but noisy: it may be negative or exceed `total_reports`, and
    /// callers may clamp it to `[0, total_reports]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for values outside the alphabet and `InvalidParameter` if the
    /// sketch was built by a different family.
    pub fn estimate(
        &self,
        sketch: &HcmsSketch,
        value: &str,
        total_reports: u64,
    ) -> Result<f64, Error> {
        self.fingerprint().ensure_matches(sketch.fingerprint())?;

        let code = HashFamily::encode_value(value)?;
        let mut sum = 0.0;
        for hash_index in 1..=self.num_hashes {
            let bucket = self
                .hashes
                .hash_code(code, hash_index, self.num_buckets)?;
            sum += sketch.cell(hash_index, bucket);
        }
        let average = sum / self.num_hashes as f64;
        debias(average, total_reports, self.num_buckets)
    }

    /// Estimates every value in `values`, in order.
    pub fn estimate_all<I>(
        &self,
        sketch: &HcmsSketch,
        values: I,
        total_reports: u64,
    ) -> Result<Vec<(String, f64)>, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| {
                let value = value.as_ref();
                let estimate = self.estimate(sketch, value, total_reports)?;
                Ok((value.to_string(), estimate))
            })
            .collect()
    }

    /// Returns the standard deviation of an estimate over `total_reports` reports.
    ///
    /// With `Uniform` sampling this is `m / (m - 1) * c * sqrt(n)`, where `c` is the
    /// randomized-response correction. `PerfectSquares` releases only `|S|` distinct
    /// coordinates, so the Hadamard cross terms between different buckets no longer cancel
    /// within a row. Their residue adds a variance of up to `n^2 / (|S| * k)`, bounded using
    /// all `n` reports as the interfering mass.
    pub fn standard_error(&self, total_reports: u64) -> f64 {
        let m = self.num_buckets as f64;
        let n = total_reports as f64;
        let mut variance = self.bias_correction * self.bias_correction * n;
        if self.coordinate_sampling == CoordinateSampling::PerfectSquares {
            let coordinates = self.coordinate_sampling.num_coordinates(self.num_buckets) as f64;
            variance += n * n / (coordinates * self.num_hashes as f64);
        }
        m / (m - 1.0) * variance.sqrt()
    }

    /// Returns the estimate minus `num_std_dev` standard errors.
    pub fn lower_bound(
        &self,
        sketch: &HcmsSketch,
        value: &str,
        total_reports: u64,
        num_std_dev: NumStdDev,
    ) -> Result<f64, Error> {
        let estimate = self.estimate(sketch, value, total_reports)?;
        Ok(estimate - num_std_dev.as_f64() * self.standard_error(total_reports))
    }

    /// Returns the estimate plus `num_std_dev` standard errors.
    pub fn upper_bound(
        &self,
        sketch: &HcmsSketch,
        value: &str,
        total_reports: u64,
        num_std_dev: NumStdDev,
    ) -> Result<f64, Error> {
        let estimate = self.estimate(sketch, value, total_reports)?;
        Ok(estimate + num_std_dev.as_f64() * self.standard_error(total_reports))
    }

    pub(super) fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            num_hashes: self.num_hashes,
            num_buckets: self.num_buckets,
            degree: self.hashes.degree(),
            seed_hash: compute_seed_hash(self.seed),
            epsilon: self.epsilon,
        }
    }
}

/// Turns the mean sketch cell of a value into a frequency estimate:
/// `m / (m - 1) * (average - n / m)`.
fn debias(average: f64, total_reports: u64, num_buckets: usize) -> Result<f64, Error> {
    if num_buckets <= 1 {
        return Err(
            Error::numeric_degeneracy("cannot debias an estimate with fewer than two buckets")
                .with_context("num_buckets", num_buckets),
        );
    }
    let m = num_buckets as f64;
    Ok(m / (m - 1.0) * (average - total_reports as f64 / m))
}

/// Builder for [`HcmsFamily`].
#[derive(Debug, Clone)]
pub struct HcmsFamilyBuilder {
    num_buckets: u32,
    num_hashes: u32,
    epsilon: f64,
    degree: usize,
    seed: u64,
    coordinate_sampling: CoordinateSampling,
}

impl HcmsFamilyBuilder {
    /// Set the number of coefficients per hash function (default 3).
    pub fn degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    /// Set the seed (default 9001).
    ///
    /// Clients and the aggregator agree on hash functions only if they use the same seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the coordinate sampling policy of the encoders.
    pub fn coordinate_sampling(mut self, sampling: CoordinateSampling) -> Self {
        self.coordinate_sampling = sampling;
        self
    }

    /// Validate the parameters, draw the hash coefficients and build the Hadamard matrix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if:
    /// - the number of buckets is not a power of two in `[4, 8192]`
    /// - the number of hashes is not in `[1, 65536]`
    /// - the sketch would hold more than [`MAX_NUM_CELLS`](super::MAX_NUM_CELLS) cells
    /// - epsilon is NaN, not positive, or so small that the correction factor overflows
    ///   (`+inf` is accepted and disables the noise)
    /// - the degree is not in `[1, 16]`
    pub fn build(self) -> Result<HcmsFamily, Error> {
        if !self.num_buckets.is_power_of_two()
            || !(MIN_NUM_BUCKETS..=MAX_NUM_BUCKETS).contains(&self.num_buckets)
        {
            return Err(Error::invalid_parameter(format!(
                "number of buckets must be a power of two in [{MIN_NUM_BUCKETS}, {MAX_NUM_BUCKETS}]"
            ))
            .with_context("num_buckets", self.num_buckets));
        }
        if !(1..=MAX_NUM_HASHES).contains(&self.num_hashes) {
            return Err(Error::invalid_parameter(format!(
                "number of hashes must be in [1, {MAX_NUM_HASHES}]"
            ))
            .with_context("num_hashes", self.num_hashes));
        }
        let num_cells = self.num_buckets as u64 * self.num_hashes as u64;
        if num_cells > MAX_NUM_CELLS {
            return Err(Error::invalid_parameter(format!(
                "number of sketch cells must not exceed {MAX_NUM_CELLS}"
            ))
            .with_context("num_buckets", self.num_buckets)
            .with_context("num_hashes", self.num_hashes));
        }
        if self.epsilon.is_nan() || self.epsilon <= 0.0 {
            return Err(Error::invalid_parameter("epsilon must be positive")
                .with_context("epsilon", self.epsilon));
        }
        let correction = bias_correction(self.epsilon);
        if !correction.is_finite() {
            return Err(Error::invalid_parameter(
                "epsilon is too small: the bias correction overflows",
            )
            .with_context("epsilon", self.epsilon));
        }
        if !(1..=MAX_DEGREE).contains(&self.degree) {
            return Err(Error::invalid_parameter(format!(
                "degree must be in [1, {MAX_DEGREE}]"
            ))
            .with_context("degree", self.degree));
        }

        let num_buckets = self.num_buckets as usize;
        let num_hashes = self.num_hashes as usize;
        let mut rng = XorShift64::seeded(self.seed);
        let hashes = HashFamily::new(num_hashes, self.degree, &mut rng);
        let hadamard = HadamardMatrix::new(num_buckets)?;

        tracing::debug!(
            num_buckets,
            num_hashes,
            epsilon = self.epsilon,
            degree = self.degree,
            "built HCMS family"
        );

        Ok(HcmsFamily {
            num_buckets,
            num_hashes,
            epsilon: self.epsilon,
            seed: self.seed,
            coordinate_sampling: self.coordinate_sampling,
            bias_probability: bias_probability(self.epsilon),
            bias_correction: correction,
            hashes,
            hadamard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_build_validates_buckets() {
        for m in [0, 1, 2, 3, 6, 100, 1 << 14] {
            let err = HcmsFamily::builder(m, 4, 1.0).build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "m = {m}");
        }
        for m in [4, 8, 1024] {
            assert!(HcmsFamily::builder(m, 4, 1.0).build().is_ok(), "m = {m}");
        }
    }

    #[test]
    fn test_build_validates_hashes_epsilon_degree() {
        let err = HcmsFamily::builder(16, 0, 1.0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        for epsilon in [0.0, -1.0, f64::NAN, f64::NEG_INFINITY] {
            let err = HcmsFamily::builder(16, 4, epsilon).build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }
        assert!(HcmsFamily::builder(16, 4, f64::INFINITY).build().is_ok());

        let err = HcmsFamily::builder(16, 4, 1.0).degree(0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        let err = HcmsFamily::builder(16, 4, 1.0).degree(17).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_build_rejects_overflowing_correction() {
        for epsilon in [1e-309, f64::MIN_POSITIVE / 4.0, 5e-324] {
            let err = HcmsFamily::builder(64, 8, epsilon).build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "epsilon = {epsilon}");
            assert_eq!(err.message(), "epsilon is too small: the bias correction overflows");
        }

        let family = HcmsFamily::builder(64, 8, 1e-300).build().unwrap();
        assert!(family.bias_correction().is_finite());
        let reports: Vec<_> = (0..200)
            .map(|client| family.encoder(client).encode("ken").unwrap())
            .collect();
        let sketch = family.aggregate(&reports).sketch;
        assert!(family.estimate(&sketch, "ken", 200).unwrap().is_finite());
    }

    #[test]
    fn test_build_caps_sketch_cells() {
        let err = HcmsFamily::builder(8192, 65536, 1.0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.context_value("num_hashes"), Some("65536"));

        let err = HcmsFamily::builder(1024, 8192, 1.0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let family = HcmsFamily::builder(1024, 4096, 1.0).build().unwrap();
        assert_eq!(
            (family.num_buckets() * family.num_hashes()) as u64,
            MAX_NUM_CELLS
        );
    }

    #[test]
    fn test_standard_error_by_sampling() {
        let uniform = HcmsFamily::builder(1024, 64, f64::INFINITY)
            .coordinate_sampling(CoordinateSampling::Uniform)
            .build()
            .unwrap();
        let squares = HcmsFamily::builder(1024, 64, f64::INFINITY).build().unwrap();
        let scale = 1024.0 / 1023.0;

        assert!((uniform.standard_error(10_000) - scale * 100.0).abs() < 1e-9);
        let cross_talk = 10_000.0 / (30.0f64 * 64.0).sqrt();
        let expected = scale * (100.0f64 * 100.0 + cross_talk * cross_talk).sqrt();
        assert!((squares.standard_error(10_000) - expected).abs() < 1e-9);
        assert_eq!(squares.standard_error(0), 0.0);
    }

    #[test]
    fn test_debias() {
        assert_eq!(debias(10.0, 40, 4).unwrap(), 4.0 / 3.0 * (10.0 - 10.0));
        assert_eq!(debias(100.0, 0, 2).unwrap(), 200.0);
        for m in [0, 1] {
            let err = debias(1.0, 1, m).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NumericDegeneracy);
        }
    }

    #[test]
    fn test_family_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HcmsFamily>();
    }

    #[test]
    fn test_same_seed_same_hashes() {
        let a = HcmsFamily::builder(64, 8, 1.0).seed(3).build().unwrap();
        let b = HcmsFamily::builder(64, 8, 1.0).seed(3).build().unwrap();
        assert_eq!(a.hashes(), b.hashes());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
