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

#![allow(dead_code)]

use hcms::hcms::HcmsFamily;
use hcms::hcms::PrivatizedReport;

/// Candidates queried against the vote fixture; "dan" never votes.
pub const CANDIDATES: [&str; 3] = ["ken", "sam", "dan"];

/// The vote population of the reference election: 5 votes for "ken", 130 for "sam".
pub fn votes() -> Vec<&'static str> {
    let mut votes = vec!["ken"; 5];
    votes.extend(std::iter::repeat_n("sam", 130));
    votes
}

/// Encodes `values[i]` with client stream `i`.
pub fn encode_all<S: AsRef<str>>(family: &HcmsFamily, values: &[S]) -> Vec<PrivatizedReport> {
    values
        .iter()
        .enumerate()
        .map(|(client, value)| {
            family
                .encoder(client as u64)
                .encode(value.as_ref())
                .unwrap()
        })
        .collect()
}
