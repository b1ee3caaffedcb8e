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

use crate::common::RandomSource;
use crate::error::Error;

/// The Mersenne prime 2^61 - 1. All hash arithmetic is carried out modulo this prime.
pub const MERSENNE_PRIME: u64 = (1 << 61) - 1;

const ALPHABET_SIZE: u64 = 26;

/// A family of `k` polynomial hash functions over the prime field `GF(2^61 - 1)`.
///
/// Hash function `j` (1-based) evaluates the polynomial
/// `a[j][0] + a[j][1] * v + ... + a[j][d-1] * v^(d-1)` at the encoded value `v` and reduces
/// the result into `[0, m)`. With coefficients drawn uniformly from the field, a polynomial
/// with `d` coefficients is `d`-wise independent.
///
/// The coefficients are drawn once, when the family is created, and never change. Every
/// client and the aggregator must hash through the same family instance (or one rebuilt from
/// the same seed) for their buckets to agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFamily {
    num_hashes: usize,
    degree: usize,
    /// Row-major `num_hashes x degree`, lowest-order coefficient first.
    coefficients: Vec<u64>,
}

impl HashFamily {
    /// Draws a new family of `num_hashes` functions, each `degree`-wise independent.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::common::XorShift64;
    /// # use hcms::hash::HashFamily;
    /// let family = HashFamily::new(4, 3, &mut XorShift64::seeded(1));
    /// let bucket = family.hash("ken", 1, 1024).unwrap();
    /// assert!(bucket < 1024);
    /// assert_eq!(family.hash("KEN", 1, 1024).unwrap(), bucket);
    /// ```
    pub fn new<R: RandomSource>(num_hashes: usize, degree: usize, rng: &mut R) -> Self {
        let coefficients = (0..num_hashes * degree)
            .map(|_| rng.next_below(MERSENNE_PRIME))
            .collect();
        HashFamily {
            num_hashes,
            degree,
            coefficients,
        }
    }

    /// Returns the number of hash functions `k`.
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Returns the number of coefficients per hash function.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Encodes a value as a field element.
    ///
    /// Letters are read case-insensitively as the digits `a=1 ... z=26` of a bijective base-26
    /// number, accumulated modulo [`MERSENNE_PRIME`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`](crate::error::ErrorKind::InvalidValue) if the value contains
    /// anything other than ASCII letters.
    pub fn encode_value(value: &str) -> Result<u64, Error> {
        let mut code = 0u64;
        for (position, ch) in value.chars().enumerate() {
            if !ch.is_ascii_alphabetic() {
                return Err(Error::invalid_value(value, position));
            }
            let digit = (ch.to_ascii_lowercase() as u8 - b'a') as u64 + 1;
            code = mod_add(mod_mul(code, ALPHABET_SIZE), digit);
        }
        Ok(code)
    }

    /// Hashes `value` with function `hash_index` (1-based) into `[0, num_buckets)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for values outside the alphabet, and `InvalidParameter` if
    /// `hash_index` is not in `[1, k]` or `num_buckets` is zero.
    pub fn hash(&self, value: &str, hash_index: usize, num_buckets: usize) -> Result<usize, Error> {
        let code = Self::encode_value(value)?;
        self.hash_code(code, hash_index, num_buckets)
    }

    /// Hashes an already encoded value. See [`HashFamily::encode_value`].
    pub fn hash_code(
        &self,
        code: u64,
        hash_index: usize,
        num_buckets: usize,
    ) -> Result<usize, Error> {
        if hash_index == 0 || hash_index > self.num_hashes {
            return Err(Error::invalid_parameter("hash index out of range")
                .with_context("hash_index", hash_index)
                .with_context("num_hashes", self.num_hashes));
        }
        if num_buckets == 0 {
            return Err(Error::invalid_parameter("number of buckets must be positive"));
        }

        let start = (hash_index - 1) * self.degree;
        let row = &self.coefficients[start..start + self.degree];
        // Horner's rule over the monomials (1, v, v^2, ...).
        let field_value = row
            .iter()
            .rev()
            .fold(0u64, |acc, &coef| mod_add(mod_mul(acc, code), coef));
        Ok((field_value % num_buckets as u64) as usize)
    }
}

fn mod_mul(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) % MERSENNE_PRIME as u128) as u64
}

fn mod_add(a: u64, b: u64) -> u64 {
    // Both operands are below 2^61, so the sum cannot overflow.
    (a + b) % MERSENNE_PRIME
}
