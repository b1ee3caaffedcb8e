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
use super::serialization::AGGREGATOR_FAMILY_ID;
use super::serialization::FLAGS_IS_EMPTY;
use super::serialization::LONG_SIZE_BYTES;
use super::serialization::PREAMBLE_LONGS;
use super::serialization::SERIAL_VERSION;
use super::sketch::HcmsSketch;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hash::compute_seed_hash;

/// A report the aggregator refused, with its position in the submitted batch.
#[derive(Debug)]
pub struct RejectedReport {
    /// Zero-based position of the report in the batch.
    pub position: usize,
    /// The report as received.
    pub report: PrivatizedReport,
    /// Why it was rejected; always of kind `CorruptReport`.
    pub error: Error,
}

/// Result of aggregating one batch of reports.
#[derive(Debug)]
pub struct Aggregation {
    /// The finalized sketch built from every valid report.
    pub sketch: HcmsSketch,
    /// Every report that was excluded from the sketch.
    pub rejected: Vec<RejectedReport>,
}

/// Server-side accumulator of privatized reports.
///
/// Each valid report adds `k * c * value` to cell `(j, l)` of a `k x m` matrix, where `c` is
/// the randomized-response correction. Accumulation is a plain sum, so partial aggregators
/// built on different threads or machines can be [merged](Self::merge) in any order.
/// [`finalize`](Self::finalize) applies the inverse Hadamard transform once and consumes the
/// aggregator.
#[derive(Debug, Clone)]
pub struct HcmsAggregator<'a> {
    family: &'a HcmsFamily,
    scale: f64,
    /// Row-major `k x m`.
    cells: Vec<f64>,
    num_reports: u64,
    num_rejected: u64,
}

impl<'a> HcmsAggregator<'a> {
    pub(super) fn new(family: &'a HcmsFamily) -> Self {
        let num_hashes = family.num_hashes();
        HcmsAggregator {
            family,
            scale: num_hashes as f64 * family.bias_correction(),
            cells: vec![0.0; num_hashes * family.num_buckets()],
            num_reports: 0,
            num_rejected: 0,
        }
    }

    /// Returns the family this aggregator accepts reports for.
    pub fn family(&self) -> &'a HcmsFamily {
        self.family
    }

    /// Returns the number of reports folded into the matrix.
    pub fn num_reports(&self) -> u64 {
        self.num_reports
    }

    /// Returns the number of reports rejected so far.
    pub fn num_rejected(&self) -> u64 {
        self.num_rejected
    }

    /// Returns true if no report has been folded in.
    pub fn is_empty(&self) -> bool {
        self.num_reports == 0
    }

    /// Folds one report into the matrix.
    ///
    /// # Errors
    ///
    /// Returns `CorruptReport` if the hash index is not in `[1, k]`, the coordinate index is
    /// not in `[0, m)` or the value is neither `+1` nor `-1`. The matrix is left untouched and
    /// the rejection is counted; the aggregator stays usable.
    pub fn update(&mut self, report: &PrivatizedReport) -> Result<(), Error> {
        if let Err(err) = self.validate(report) {
            self.num_rejected += 1;
            return Err(err);
        }

        let num_buckets = self.family.num_buckets();
        let row = report.hash_index() as usize - 1;
        let col = report.coord_index() as usize;
        self.cells[row * num_buckets + col] += self.scale * report.value() as f64;
        self.num_reports += 1;
        Ok(())
    }

    fn validate(&self, report: &PrivatizedReport) -> Result<(), Error> {
        let num_hashes = self.family.num_hashes();
        let num_buckets = self.family.num_buckets();
        let hash_index = report.hash_index() as usize;
        let coord_index = report.coord_index() as usize;

        let problem = if hash_index == 0 || hash_index > num_hashes {
            "hash index out of range"
        } else if coord_index >= num_buckets {
            "coordinate index out of range"
        } else if report.value() != 1 && report.value() != -1 {
            "report value must be +1 or -1"
        } else {
            return Ok(());
        };

        Err(Error::corrupt_report(problem)
            .with_context("hash_index", hash_index)
            .with_context("coord_index", coord_index)
            .with_context("value", report.value())
            .with_context("num_hashes", num_hashes)
            .with_context("num_buckets", num_buckets))
    }

    /// Adds the reports of `other` into this aggregator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the two aggregators were built by different families.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::hcms::HcmsFamily;
    /// let family = HcmsFamily::builder(64, 8, 2.0).build().unwrap();
    /// let mut left = family.aggregator();
    /// let mut right = family.aggregator();
    /// left.update(&family.encoder(0).encode("ken").unwrap()).unwrap();
    /// right.update(&family.encoder(1).encode("sam").unwrap()).unwrap();
    ///
    /// left.merge(&right).unwrap();
    /// assert_eq!(left.num_reports(), 2);
    /// ```
    pub fn merge(&mut self, other: &HcmsAggregator<'_>) -> Result<(), Error> {
        self.family
            .fingerprint()
            .ensure_matches(&other.family.fingerprint())?;

        for (cell, other_cell) in self.cells.iter_mut().zip(&other.cells) {
            *cell += *other_cell;
        }
        self.num_reports += other.num_reports;
        self.num_rejected += other.num_rejected;
        Ok(())
    }

    /// Applies the inverse Hadamard transform to every row and freezes the result.
    pub fn finalize(mut self) -> HcmsSketch {
        self.family.hadamard().inverse_rows(&mut self.cells);
        tracing::debug!(
            num_reports = self.num_reports,
            num_rejected = self.num_rejected,
            "finalized HCMS sketch"
        );
        HcmsSketch::new(
            self.family.fingerprint(),
            self.cells,
            self.num_reports,
            self.num_rejected,
        )
    }

    /// Serializes the partial (not yet finalized) matrix for transport to another aggregator.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        let mut capacity = PREAMBLE_LONGS as usize * LONG_SIZE_BYTES;
        if !is_empty {
            capacity += self.cells.len() * LONG_SIZE_BYTES;
        }
        let mut bytes = SketchBytes::with_capacity(capacity);

        bytes.write_u8(PREAMBLE_LONGS);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(AGGREGATOR_FAMILY_ID);
        bytes.write_u8(if is_empty { FLAGS_IS_EMPTY } else { 0 });
        bytes.write_u16_le(compute_seed_hash(self.family.seed()));
        bytes.write_u8(self.family.degree() as u8);
        bytes.write_u8(0); // reserved

        bytes.write_u32_le(self.family.num_hashes() as u32);
        bytes.write_u32_le(self.family.num_buckets() as u32);
        bytes.write_f64_le(self.family.epsilon());
        bytes.write_u64_le(self.num_reports);
        bytes.write_u64_le(self.num_rejected);

        if !is_empty {
            for &cell in &self.cells {
                bytes.write_f64_le(cell);
            }
        }
        bytes.into_bytes()
    }

    /// Deserializes a partial matrix produced by [`serialize`](Self::serialize) for `family`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDeserializeData` if the bytes are truncated, were not produced by an
    /// HCMS aggregator, or were produced by a family with different parameters or seed.
    pub fn deserialize(bytes: &[u8], family: &'a HcmsFamily) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);

        let preamble_longs = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble_longs").set_source(e))?;
        let serial_version = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("serial_version").set_source(e))?;
        let family_id = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("family_id").set_source(e))?;

        if family_id != AGGREGATOR_FAMILY_ID {
            return Err(Error::invalid_family(
                AGGREGATOR_FAMILY_ID,
                family_id,
                "HcmsAggregator",
            ));
        }
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        if preamble_longs != PREAMBLE_LONGS {
            return Err(Error::deserial(format!(
                "invalid preamble longs: expected {PREAMBLE_LONGS}, got {preamble_longs}"
            )));
        }

        let flags = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("flags").set_source(e))?;
        let seed_hash = cursor
            .read_u16_le()
            .map_err(|e| Error::insufficient_data("seed_hash").set_source(e))?;
        let degree = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("degree").set_source(e))?;
        cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("reserved").set_source(e))?;
        let num_hashes = cursor
            .read_u32_le()
            .map_err(|e| Error::insufficient_data("num_hashes").set_source(e))?;
        let num_buckets = cursor
            .read_u32_le()
            .map_err(|e| Error::insufficient_data("num_buckets").set_source(e))?;
        let epsilon = cursor
            .read_f64_le()
            .map_err(|e| Error::insufficient_data("epsilon").set_source(e))?;
        let num_reports = cursor
            .read_u64_le()
            .map_err(|e| Error::insufficient_data("num_reports").set_source(e))?;
        let num_rejected = cursor
            .read_u64_le()
            .map_err(|e| Error::insufficient_data("num_rejected").set_source(e))?;

        let expected_seed_hash = compute_seed_hash(family.seed());
        if seed_hash != expected_seed_hash {
            return Err(Error::deserial(format!(
                "incompatible seed hash: expected {expected_seed_hash}, got {seed_hash}"
            )));
        }
        if num_hashes as usize != family.num_hashes()
            || num_buckets as usize != family.num_buckets()
            || degree as usize != family.degree()
            || epsilon.to_bits() != family.epsilon().to_bits()
        {
            return Err(Error::deserial("incompatible sketch parameters")
                .with_context("num_hashes", num_hashes)
                .with_context("num_buckets", num_buckets)
                .with_context("degree", degree)
                .with_context("epsilon", epsilon));
        }

        let mut aggregator = HcmsAggregator::new(family);
        aggregator.num_reports = num_reports;
        aggregator.num_rejected = num_rejected;
        if flags & FLAGS_IS_EMPTY == 0 {
            let expected_bytes = aggregator.cells.len() * LONG_SIZE_BYTES;
            if cursor.remaining() < expected_bytes {
                return Err(Error::insufficient_data("cells"));
            }
            for cell in aggregator.cells.iter_mut() {
                *cell = cursor
                    .read_f64_le()
                    .map_err(|e| Error::insufficient_data("cells").set_source(e))?;
            }
        }
        Ok(aggregator)
    }
}
