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

mod common;

use common::CANDIDATES;
use common::encode_all;
use common::votes;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::ge;
use googletest::prelude::gt;
use googletest::prelude::le;
use googletest::prelude::lt;
use googletest::prelude::near;
use hcms::common::NumStdDev;
use hcms::error::ErrorKind;
use hcms::hcms::CoordinateSampling;
use hcms::hcms::HcmsFamily;
use hcms::hcms::bias_probability;

#[test]
fn test_noiseless_single_value() {
    const N: usize = 10_000;
    const N_F64: f64 = N as f64;

    let family = HcmsFamily::builder(1024, 64, f64::INFINITY)
        .seed(2024)
        .build()
        .unwrap();
    let reports = encode_all(&family, &vec!["ken"; N]);
    let aggregation = family.aggregate(&reports);
    assert!(aggregation.rejected.is_empty());

    let sketch = aggregation.sketch;
    assert_eq!(sketch.num_reports(), N as u64);
    let estimate = family.estimate(&sketch, "ken", N as u64).unwrap();
    assert_that!(estimate, near(N_F64, 0.05 * N_F64));
}

#[test]
fn test_absent_value_is_near_zero() {
    const N: u64 = 1_000;

    let family = HcmsFamily::builder(1024, 64, 2.0).seed(17).build().unwrap();
    let reports = encode_all(&family, &vec!["ken"; N as usize]);
    let sketch = family.aggregate(&reports).sketch;

    let tolerance = 5.0 * family.standard_error(N);
    let absent = family.estimate(&sketch, "dan", N).unwrap();
    assert_that!(absent.abs(), lt(tolerance));

    let present = family.estimate(&sketch, "ken", N).unwrap();
    assert_that!(present, near(N as f64, tolerance));
}

#[test]
fn test_absent_values_without_noise_under_perfect_squares() {
    const N: u64 = 10_000;

    let family = HcmsFamily::builder(1024, 64, f64::INFINITY).build().unwrap();
    assert_eq!(
        family.coordinate_sampling(),
        CoordinateSampling::PerfectSquares
    );
    let reports = encode_all(&family, &vec!["ken"; N as usize]);
    let sketch = family.aggregate(&reports).sketch;

    // Only the cross terms of the few released coordinates remain, so the error must be
    // wider than sampling noise alone.
    let standard_error = family.standard_error(N);
    assert_that!(standard_error, gt(2.0 * (N as f64).sqrt()));

    for absent in ["ann", "dan", "bob", "zed"] {
        let estimate = family.estimate(&sketch, absent, N).unwrap();
        assert_that!(estimate.abs(), lt(5.0 * standard_error));
    }
    let present = family.estimate(&sketch, "ken", N).unwrap();
    assert_that!(present, near(N as f64, 1e-6 * N as f64));
}

#[test]
fn test_vote_fixture() {
    let votes = votes();
    let n = votes.len() as u64;

    let family = HcmsFamily::builder(1024, 64, 2.0).seed(5).build().unwrap();
    let reports = encode_all(&family, &votes);
    let sketch = family.aggregate(&reports).sketch;

    let tolerance = 5.0 * family.standard_error(n);
    let estimates = family.estimate_all(&sketch, CANDIDATES, n).unwrap();
    let expected = [5.0, 130.0, 0.0];
    for ((value, estimate), want) in estimates.iter().zip(expected) {
        assert_that!(*estimate, near(want, tolerance));
        assert!(CANDIDATES.contains(&value.as_str()));
    }
    assert_eq!(estimates[1].0, "sam");
}

#[test]
fn test_mixed_population_with_uniform_sampling() {
    let mut values = Vec::new();
    values.extend(std::iter::repeat_n("apple", 3_000));
    values.extend(std::iter::repeat_n("banana", 1_500));
    values.extend(std::iter::repeat_n("cherry", 500));
    let n = values.len() as u64;

    let family = HcmsFamily::builder(256, 32, 3.0)
        .coordinate_sampling(CoordinateSampling::Uniform)
        .seed(99)
        .build()
        .unwrap();
    let reports = encode_all(&family, &values);
    let sketch = family.aggregate(&reports).sketch;

    let tolerance = 5.0 * family.standard_error(n);
    for (value, want) in [("apple", 3_000.0), ("banana", 1_500.0), ("cherry", 500.0)] {
        let estimate = family.estimate(&sketch, value, n).unwrap();
        assert_that!(estimate, near(want, tolerance));
    }
    let absent = family.estimate(&sketch, "durian", n).unwrap();
    assert_that!(absent.abs(), lt(tolerance));
}

#[test]
fn test_bounds_bracket_estimate() {
    let family = HcmsFamily::builder(64, 8, 1.0).build().unwrap();
    let reports = encode_all(&family, &votes());
    let sketch = family.aggregate(&reports).sketch;
    let n = sketch.num_reports();

    let estimate = family.estimate(&sketch, "sam", n).unwrap();
    for num_std_dev in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
        let lower = family.lower_bound(&sketch, "sam", n, num_std_dev).unwrap();
        let upper = family.upper_bound(&sketch, "sam", n, num_std_dev).unwrap();
        assert_that!(lower, le(estimate));
        assert_that!(upper, ge(estimate));
        assert_that!(
            upper - lower,
            near(
                2.0 * num_std_dev.as_f64() * family.standard_error(n),
                1e-9
            )
        );
    }
}

#[test]
fn test_clients_and_server_agree_across_family_instances() {
    // Clients and the server each build their own family from the shared seed.
    let client_family = HcmsFamily::builder(512, 32, f64::INFINITY)
        .seed(31337)
        .build()
        .unwrap();
    let server_family = HcmsFamily::builder(512, 32, f64::INFINITY)
        .seed(31337)
        .build()
        .unwrap();

    let reports = encode_all(&client_family, &vec!["sam"; 2_000]);
    let sketch = server_family.aggregate(&reports).sketch;
    let estimate = server_family.estimate(&sketch, "sam", 2_000).unwrap();
    assert_that!(estimate, near(2_000.0, 1e-6));
}

#[test]
fn test_zero_epsilon_is_uninformative() {
    assert_eq!(bias_probability(0.0), 0.5);

    let err = HcmsFamily::builder(64, 8, 0.0).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_that!(err.message(), contains_substring("epsilon"));

    // As epsilon approaches zero the noise swamps any possible count.
    let family = HcmsFamily::builder(64, 8, 1e-3).build().unwrap();
    assert_that!(family.standard_error(1_000), gt(1_000.0));
}

#[test]
fn test_invalid_buckets_rejected_at_build() {
    for m in [0, 1] {
        let err = HcmsFamily::builder(m, 8, 1.0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}

#[test]
fn test_invalid_values() {
    let family = HcmsFamily::builder(64, 8, 1.0).build().unwrap();
    let err = family.encoder(0).encode("ken-1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);

    let sketch = family.aggregator().finalize();
    let err = family.estimate(&sketch, "d@n", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_estimate_with_foreign_family() {
    let family = HcmsFamily::builder(64, 8, 1.0).seed(1).build().unwrap();
    let other = HcmsFamily::builder(64, 8, 1.0).seed(2).build().unwrap();
    let sketch = family.aggregator().finalize();
    let err = other.estimate(&sketch, "ken", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}
