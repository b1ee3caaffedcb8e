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

//! Hadamard Count-Mean Sketch: frequency estimation under local differential privacy.
//!
//! Every client releases a single randomized bit about its categorical value; an aggregator
//! combines the bits into a sketch from which the frequency of any value can be estimated
//! without learning any individual client's value.
//!
//! - [`hcms`]: the encode, aggregate and estimate pipeline.
//! - [`hash`]: the shared polynomial hash family.
//! - [`hadamard`]: Sylvester-Hadamard matrices and transforms.
//! - [`common`]: seeded random sources and confidence-bound helpers.
//! - [`error`]: the error type returned by all fallible operations.

pub mod common;
pub mod error;
pub mod hadamard;
pub mod hash;
pub mod hcms;

mod codec;
