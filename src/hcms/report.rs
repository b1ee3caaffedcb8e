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

use super::serialization::REPORT_FAMILY_ID;
use super::serialization::REPORT_SIZE_BYTES;
use super::serialization::SERIAL_VERSION;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;

/// The single privatized bit a client releases.
///
/// A report carries the released coordinate value (`+1` or `-1`), the 1-based index of the
/// hash function the client picked and the index of the released coordinate. The aggregator
/// validates all three; reports received from a transport may be corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivatizedReport {
    value: i8,
    hash_index: u32,
    coord_index: u32,
}

impl PrivatizedReport {
    /// Creates a report from its raw parts. No validation happens here.
    pub fn new(value: i8, hash_index: u32, coord_index: u32) -> Self {
        PrivatizedReport {
            value,
            hash_index,
            coord_index,
        }
    }

    /// Returns the released value, `+1` or `-1` for a well-formed report.
    pub fn value(&self) -> i8 {
        self.value
    }

    /// Returns the 1-based hash function index `j`.
    pub fn hash_index(&self) -> u32 {
        self.hash_index
    }

    /// Returns the released coordinate index `l`.
    pub fn coord_index(&self) -> u32 {
        self.coord_index
    }

    /// Serializes the report into its 12-byte wire form.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::hcms::PrivatizedReport;
    /// let report = PrivatizedReport::new(-1, 3, 16);
    /// let bytes = report.serialize();
    /// assert_eq!(bytes.len(), 12);
    /// assert_eq!(PrivatizedReport::deserialize(&bytes).unwrap(), report);
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(REPORT_SIZE_BYTES);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(REPORT_FAMILY_ID);
        bytes.write_i8(self.value);
        bytes.write_u8(0); // reserved
        bytes.write_u32_le(self.hash_index);
        bytes.write_u32_le(self.coord_index);
        bytes.into_bytes()
    }

    /// Deserializes a report from its wire form.
    ///
    /// Only the framing is checked; index and value ranges are checked by the aggregator.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let serial_version = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("serial_version").set_source(e))?;
        let family_id = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("family_id").set_source(e))?;
        if family_id != REPORT_FAMILY_ID {
            return Err(Error::invalid_family(
                REPORT_FAMILY_ID,
                family_id,
                "PrivatizedReport",
            ));
        }
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }

        let value = cursor
            .read_i8()
            .map_err(|e| Error::insufficient_data("value").set_source(e))?;
        cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("reserved").set_source(e))?;
        let hash_index = cursor
            .read_u32_le()
            .map_err(|e| Error::insufficient_data("hash_index").set_source(e))?;
        let coord_index = cursor
            .read_u32_le()
            .map_err(|e| Error::insufficient_data("coord_index").set_source(e))?;

        Ok(PrivatizedReport {
            value,
            hash_index,
            coord_index,
        })
    }
}
