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

use super::family::Fingerprint;

/// A finalized, read-only Hadamard count-mean sketch.
///
/// Produced by [`HcmsAggregator::finalize`](super::HcmsAggregator::finalize) after the single
/// inverse transform; query it through
/// [`HcmsFamily::estimate`](super::HcmsFamily::estimate) with the family that built it.
#[derive(Debug, Clone, PartialEq)]
pub struct HcmsSketch {
    fingerprint: Fingerprint,
    /// Row-major `k x m`.
    cells: Vec<f64>,
    num_reports: u64,
    num_rejected: u64,
}

impl HcmsSketch {
    pub(super) fn new(
        fingerprint: Fingerprint,
        cells: Vec<f64>,
        num_reports: u64,
        num_rejected: u64,
    ) -> Self {
        debug_assert_eq!(
            cells.len(),
            fingerprint.num_hashes * fingerprint.num_buckets
        );
        HcmsSketch {
            fingerprint,
            cells,
            num_reports,
            num_rejected,
        }
    }

    pub(super) fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the number of hash functions `k` (rows).
    pub fn num_hashes(&self) -> usize {
        self.fingerprint.num_hashes
    }

    /// Returns the number of buckets `m` (columns).
    pub fn num_buckets(&self) -> usize {
        self.fingerprint.num_buckets
    }

    /// Returns the privacy budget the reports were generated under.
    pub fn epsilon(&self) -> f64 {
        self.fingerprint.epsilon
    }

    /// Returns the number of reports folded into the sketch.
    pub fn num_reports(&self) -> u64 {
        self.num_reports
    }

    /// Returns the number of reports rejected while building the sketch.
    pub fn num_rejected(&self) -> u64 {
        self.num_rejected
    }

    /// Returns true if no report was folded into the sketch.
    pub fn is_empty(&self) -> bool {
        self.num_reports == 0
    }

    /// Returns cell `(hash_index, bucket)`, with `hash_index` 1-based like report indices.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn cell(&self, hash_index: usize, bucket: usize) -> f64 {
        self.row(hash_index)[bucket]
    }

    /// Returns the row of hash function `hash_index` (1-based).
    ///
    /// # Panics
    ///
    /// Panics if `hash_index` is not in `[1, k]`.
    pub fn row(&self, hash_index: usize) -> &[f64] {
        assert!(
            (1..=self.num_hashes()).contains(&hash_index),
            "hash index must be in [1, {}], got {hash_index}",
            self.num_hashes()
        );
        let width = self.num_buckets();
        let start = (hash_index - 1) * width;
        &self.cells[start..start + width]
    }
}
