// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use k256::ecdsa::SigningKey;
use rstest::rstest;
use sigcheck_core::build_unsigned_message;
use sigcheck_harness::{
    runner::{CaseFailure, ConformanceRunner, PathOutcome, RunnerSettings},
    signer::{
        scripted::ScriptedSignerFactory, simulated::SimulatedDeviceFactory, RejectReason,
        SignatureResponse, SignerError,
    },
    vectors::{builtin_vectors, Operation, TestVector},
};

fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

fn device_key() -> SigningKey {
    SigningKey::from_slice(&[0x46; 32]).unwrap()
}

fn settings() -> RunnerSettings {
    RunnerSettings::new(*device_key().verifying_key())
}

fn vector(name: &str) -> TestVector {
    builtin_vectors()
        .unwrap()
        .into_iter()
        .find(|vector| vector.name == name)
        .unwrap()
}

fn zero_signature() -> SignatureResponse {
    SignatureResponse {
        v: "3f".into(),
        r: "00".repeat(32),
        s: "00".repeat(32),
    }
}

#[tokio::test]
async fn builtin_table_passes() {
    init_logger();
    let vectors = builtin_vectors().unwrap();
    let runner = ConformanceRunner::new(SimulatedDeviceFactory::new(device_key()), settings());
    let report = runner.run_all(&vectors).await;

    assert!(report.all_passed(), "{:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.passed(), 10);
    let names: Vec<_> = report.cases.iter().map(|case| case.name.as_str()).collect();
    let expected: Vec<_> = vectors.iter().map(|vector| vector.name.as_str()).collect();
    assert_eq!(names, expected);

    let expected_sender = runner.settings().expected_address();
    for case in &report.cases {
        assert_eq!(case.recovered, expected_sender);
        let v = u64::from_str_radix(&case.signature.as_ref().unwrap().v, 16).unwrap();
        match case.chain_id {
            Some(14) => assert!(v == 63 || v == 64, "{}: v = {v}", case.name),
            None => assert!(v == 27 || v == 28, "{}: v = {v}", case.name),
            other => panic!("unexpected chain {other:?}"),
        }
    }
}

#[rstest]
#[case::serial(1)]
#[case::parallel(8)]
#[tokio::test]
async fn concurrency_does_not_change_results(#[case] jobs: usize) {
    let vectors = builtin_vectors().unwrap();
    let runner = ConformanceRunner::new(
        SimulatedDeviceFactory::new(device_key()),
        RunnerSettings {
            max_concurrent_cases: jobs,
            ..settings()
        },
    );
    let report = runner.run_all(&vectors).await;
    assert_eq!(report.passed(), vectors.len());
}

#[tokio::test]
async fn message_reaches_signer_unchanged() {
    let vector = vector("basic_transfer");
    let factory = ScriptedSignerFactory::responding(zero_signature());
    let runner = ConformanceRunner::new(factory.clone(), settings());
    let report = runner.run_case(&vector).await;

    let expected = build_unsigned_message(&vector.fields().unwrap(), vector.chain()).to_hex();
    assert_eq!(
        expected,
        "e980856d6e2edc00832dc6c094df073477da421520cf03af261b782282c304ad6684abcdef00800e8080"
    );
    assert_eq!(factory.requests(), [expected.clone()]);
    assert_eq!(report.unsigned_tx, Some(expected));
}

#[tokio::test]
async fn all_zero_signature_fails_both_paths() {
    let runner = ConformanceRunner::new(ScriptedSignerFactory::responding(zero_signature()), settings());
    let report = runner.run_case(&vector("basic_transfer")).await;

    let Some(CaseFailure::Verification { raw, reconstructed }) = report.failure else {
        panic!("expected a verification failure, got {:?}", report.failure);
    };
    assert!(!raw.passed());
    assert!(!reconstructed.passed());
    assert_eq!(report.recovered, None);
}

#[tokio::test]
async fn wrong_key_fails_raw_path_only() {
    let other = SigningKey::from_slice(&[0x47; 32]).unwrap();
    let runner = ConformanceRunner::new(
        SimulatedDeviceFactory::new(device_key()),
        RunnerSettings::new(*other.verifying_key()),
    );
    let report = runner.run_case(&vector("basic_transfer")).await;

    let Some(CaseFailure::Verification { raw, reconstructed }) = &report.failure else {
        panic!("expected a verification failure, got {:?}", report.failure);
    };
    assert!(matches!(raw, PathOutcome::Failed(_)));
    assert_eq!(reconstructed, &PathOutcome::Passed);
    assert!(report.recovered.is_some());
}

#[tokio::test]
async fn timeout_is_signer_unavailable() {
    let factory = ScriptedSignerFactory::responding(zero_signature()).with_delay(Duration::from_secs(5));
    let runner = ConformanceRunner::new(
        factory,
        RunnerSettings {
            timeout: Duration::from_millis(50),
            ..settings()
        },
    );
    let report = runner.run_case(&vector("basic_transfer")).await;
    assert!(matches!(
        report.failure,
        Some(CaseFailure::SignerUnavailable { .. })
    ));
    assert_eq!(report.signature, None);
}

#[tokio::test]
async fn transport_failure_is_signer_unavailable() {
    let factory = ScriptedSignerFactory::failing(SignerError::Unavailable("device unplugged".into()));
    let runner = ConformanceRunner::new(factory, settings());
    let report = runner.run_case(&vector("erc20_transfer")).await;
    assert_eq!(
        report.failure,
        Some(CaseFailure::SignerUnavailable {
            reason: "device unplugged".into()
        })
    );
}

#[tokio::test]
async fn expert_mode_required_for_blind_signing() {
    let vectors = builtin_vectors().unwrap();
    let runner = ConformanceRunner::new(
        SimulatedDeviceFactory::new(device_key()),
        RunnerSettings {
            expert_mode: false,
            ..settings()
        },
    );
    let report = runner.run_all(&vectors).await;

    for case in &report.cases {
        if case.name == "erc20_transfer" {
            assert!(case.passed());
        } else {
            assert_eq!(
                case.failure,
                Some(CaseFailure::SignerRejected {
                    reason: RejectReason::ExpertModeRequired
                }),
                "{}",
                case.name
            );
        }
    }
}

#[tokio::test]
async fn user_rejection() {
    let runner = ConformanceRunner::new(SimulatedDeviceFactory::new(device_key()).rejecting(), settings());
    let report = runner.run_case(&vector("undelegate_contract")).await;
    assert_eq!(
        report.failure,
        Some(CaseFailure::SignerRejected {
            reason: RejectReason::UserRejected
        })
    );
}

#[tokio::test]
async fn garbage_response() {
    let response = SignatureResponse {
        v: "1b".into(),
        r: "xyz".into(),
        s: "00".into(),
    };
    let runner = ConformanceRunner::new(ScriptedSignerFactory::responding(response), settings());
    let report = runner.run_case(&vector("basic_transfer")).await;
    assert!(matches!(
        report.failure,
        Some(CaseFailure::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn one_bad_vector_does_not_stop_the_table() {
    let mut vectors = builtin_vectors().unwrap();
    vectors.insert(
        1,
        TestVector {
            name: "bad_recipient".into(),
            op: Operation {
                to: Some("abcd".into()),
                value: "01".into(),
                data: None,
            },
            chain_id: Some(14),
        },
    );
    let runner = ConformanceRunner::new(SimulatedDeviceFactory::new(device_key()), settings());
    let report = runner.run_all(&vectors).await;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.cases[1].name, "bad_recipient");
    assert!(matches!(report.cases[1].failure, Some(CaseFailure::Build { .. })));
    assert_eq!(report.passed(), 10);
}

#[tokio::test]
async fn report_serializes() {
    let runner = ConformanceRunner::new(ScriptedSignerFactory::responding(zero_signature()), settings());
    let report = runner.run_all(&[vector("basic_transfer")]).await;
    let json = serde_json::to_value(&report).unwrap();
    let failure = &json["cases"][0]["failure"];
    assert_eq!(failure["kind"], "verification");
    assert_eq!(failure["raw"]["status"], "failed");
}
