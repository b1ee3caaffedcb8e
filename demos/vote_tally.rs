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

//! Runs a small private election: every voter privatizes a ballot, the tally server aggregates
//! the reports and estimates how many votes each candidate received.

use hcms::hcms::HcmsAggregator;
use hcms::hcms::HcmsFamily;
use hcms::hcms::PrivatizedReport;
use tracing::Level;
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let mut ballots = vec!["ken"; 5];
    ballots.extend(std::iter::repeat_n("sam", 130));
    let candidates = ["ken", "sam", "dan"];

    let family = HcmsFamily::builder(1024, 64, 2.0)
        .seed(2016)
        .build()
        .unwrap();

    // Each voter encodes on its own device with its own random stream.
    let reports: Vec<_> = ballots
        .iter()
        .enumerate()
        .map(|(voter, ballot)| family.encoder(voter as u64).encode(ballot).unwrap())
        .collect();
    info!(num_reports = reports.len(), "collected privatized ballots");

    // Ship the reports over the wire the way a real client would.
    let received: Vec<_> = reports
        .iter()
        .map(|report| {
            let bytes = report.serialize();
            PrivatizedReport::deserialize(&bytes).unwrap()
        })
        .collect();

    let aggregation = family.aggregate(&received);
    let sketch = aggregation.sketch;
    let n = sketch.num_reports();

    println!("Ballots cast: {}", n);
    println!("Rejected reports: {}", aggregation.rejected.len());
    println!("Standard error: {:.2}", family.standard_error(n));
    for (candidate, estimate) in family.estimate_all(&sketch, candidates, n).unwrap() {
        let actual = ballots.iter().filter(|b| **b == candidate).count();
        let clamped = estimate.clamp(0.0, n as f64);
        println!(
            "{:>4}: estimated {:>7.2} (clamped {:>6.2}), actual {}",
            candidate, estimate, clamped, actual
        );
    }

    // A partial aggregator can be shipped to another tally server and merged there.
    let mut partial = family.aggregator();
    for report in &received[..50] {
        partial.update(report).unwrap();
    }
    let bytes = partial.serialize();
    println!("\nPartial aggregator: {} bytes", bytes.len());
    let mut restored = HcmsAggregator::deserialize(&bytes, &family).unwrap();
    for report in &received[50..] {
        restored.update(report).unwrap();
    }
    let merged = restored.finalize();
    let sam = family.estimate(&merged, "sam", merged.num_reports()).unwrap();
    println!("Estimate for sam after transfer: {:.2}", sam);
}
