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

//! Hashing for HCMS.
//!
//! [`HashFamily`] holds the `k` polynomial hash functions shared by clients and the aggregator.
//! The seed hash identifies a family in serialized data so that partial sketches from different
//! epochs are never combined.

mod polynomial;

pub use self::polynomial::HashFamily;
pub use self::polynomial::MERSENNE_PRIME;

/// Default seed used when the caller does not provide one.
pub const DEFAULT_SEED: u64 = 9001;

/// Computes the 16-bit fingerprint of a seed written into serialized partial sketches.
pub(crate) fn compute_seed_hash(seed: u64) -> u16 {
    let (h1, _) = mur3::murmurhash3_x64_128(&seed.to_le_bytes(), 0);
    (h1 & 0xffff) as u16
}
