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

//! Sylvester-Hadamard matrices and the transforms built on them.
//!
//! The order-`m` matrix is built by the doubling recursion
//!
//! ```text
//! H_1 = [1]            H_2n = | H_n   H_n |
//!                             | H_n  -H_n |
//! ```
//!
//! Every entry is `+1` or `-1`, the matrix is symmetric and `H * H^T = m * I`, so the transform
//! is its own inverse up to a factor of `m`.

use crate::error::Error;

/// A Sylvester-Hadamard matrix of order `m`, stored row-major as `i8`.
///
/// Construction costs `O(m^2)`; build it once per sketch and share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HadamardMatrix {
    order: usize,
    entries: Vec<i8>,
}

impl HadamardMatrix {
    /// Builds the matrix of order `order`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `order` is a power of two.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hcms::hadamard::HadamardMatrix;
    /// let h = HadamardMatrix::new(4).unwrap();
    /// assert_eq!(h.row(3), &[1, -1, -1, 1]);
    /// ```
    pub fn new(order: usize) -> Result<Self, Error> {
        if !order.is_power_of_two() {
            return Err(Error::invalid_parameter("Hadamard order must be a power of two")
                .with_context("order", order));
        }

        let mut entries = vec![0i8; order * order];
        entries[0] = 1;
        let mut size = 1;
        while size < order {
            // Expand the top-left `size x size` block into `2size x 2size`.
            for row in 0..size {
                for col in 0..size {
                    let value = entries[row * order + col];
                    entries[row * order + col + size] = value;
                    entries[(row + size) * order + col] = value;
                    entries[(row + size) * order + col + size] = -value;
                }
            }
            size *= 2;
        }

        Ok(HadamardMatrix { order, entries })
    }

    /// Returns the order `m`.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns the entry at (`row`, `col`).
    pub fn get(&self, row: usize, col: usize) -> i8 {
        self.entries[row * self.order + col]
    }

    /// Returns row `index`. Since the matrix is symmetric this is also column `index`.
    pub fn row(&self, index: usize) -> &[i8] {
        &self.entries[index * self.order..(index + 1) * self.order]
    }

    /// Computes `y = H x`.
    ///
    /// # Panics
    ///
    /// Panics if `x.len()` differs from the order.
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.order, "vector length must equal the order");
        (0..self.order)
            .map(|i| dot(self.row(i), x))
            .collect()
    }

    /// Computes `H e_index` for the one-hot indicator `e_index`.
    ///
    /// The product is column `index` of `H`, so no arithmetic is needed.
    pub fn forward_one_hot(&self, index: usize) -> &[i8] {
        self.row(index)
    }

    /// Replaces every row `r` of the row-major `rows x m` matrix `cells` with `H r`, that is
    /// `M <- M H^T`.
    ///
    /// # Panics
    ///
    /// Panics if `cells.len()` is not a multiple of the order.
    pub fn inverse_rows(&self, cells: &mut [f64]) {
        assert_eq!(
            cells.len() % self.order,
            0,
            "matrix width must equal the order"
        );
        let mut scratch = vec![0.0; self.order];
        for row in cells.chunks_exact_mut(self.order) {
            if row.iter().all(|&v| v == 0.0) {
                continue;
            }
            for (i, out) in scratch.iter_mut().enumerate() {
                *out = dot(self.row(i), row);
            }
            row.copy_from_slice(&scratch);
        }
    }
}

fn dot(signs: &[i8], x: &[f64]) -> f64 {
    signs
        .iter()
        .zip(x)
        .map(|(&s, &v)| if s > 0 { v } else { -v })
        .sum()
}
