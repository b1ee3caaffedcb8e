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

use super::family::HcmsFamily;
use super::report::PrivatizedReport;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;
use crate::hash::HashFamily;

/// Client-side encoder: turns one raw value into one privatized report.
///
/// An encoder borrows the shared [`HcmsFamily`] and owns its random source, so any number of
/// encoders can run in parallel over the same family.
#[derive(Debug, Clone)]
pub struct HcmsEncoder<'a, R = XorShift64> {
    family: &'a HcmsFamily,
    rng: R,
}

impl<'a, R: RandomSource> HcmsEncoder<'a, R> {
    /// Creates an encoder drawing its randomness from `rng`.
    pub fn with_random(family: &'a HcmsFamily, rng: R) -> Self {
        HcmsEncoder { family, rng }
    }

    /// Returns the family this encoder reports into.
    pub fn family(&self) -> &'a HcmsFamily {
        self.family
    }

    /// Privatizes `value`.
    ///
    /// Picks a hash function `j` uniformly from `[1, k]`, takes the Hadamard transform of the
    /// one-hot indicator of `h_j(value)`, samples one coordinate `l` of it, and keeps the
    /// coordinate's sign with probability `e^epsilon / (1 + e^epsilon)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if `value` contains characters outside `[A-Za-z]`. No randomness
    /// is consumed in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::hcms::HcmsFamily;
    /// let family = HcmsFamily::builder(64, 8, 1.0).build().unwrap();
    /// let mut encoder = family.encoder(0);
    /// let report = encoder.encode("sam").unwrap();
    /// assert!(report.value() == 1 || report.value() == -1);
    /// assert!((1..=8).contains(&report.hash_index()));
    /// assert!(encoder.encode("s4m").is_err());
    /// ```
    pub fn encode(&mut self, value: &str) -> Result<PrivatizedReport, Error> {
        let family = self.family;
        let code = HashFamily::encode_value(value)?;

        let num_buckets = family.num_buckets();
        let hash_index = 1 + self.rng.next_below(family.num_hashes() as u64) as usize;
        let bucket = family
            .hashes()
            .hash_code(code, hash_index, num_buckets)?;
        let transformed = family.hadamard().forward_one_hot(bucket);

        let coord_index = family.coordinate_sampling().sample(num_buckets, &mut self.rng);
        let sign = if self.rng.next_bernoulli(family.bias_probability()) {
            1
        } else {
            -1
        };

        Ok(PrivatizedReport::new(
            sign * transformed[coord_index],
            hash_index as u32,
            coord_index as u32,
        ))
    }
}
