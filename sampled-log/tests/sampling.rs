// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use assert_approx_eq::assert_approx_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rstest::rstest;
use sampled_log::{
    LoggerConfig, Record, RunContext, SampledLogger, SamplingPolicy, TARGET_LIVE_CALLS,
    read_history,
    test_util::{InMemoryRegistry, RecordingForwarder},
};

#[test]
fn policy_converges_to_target_over_expected_steps() {
    const EXPECTED: u64 = 1_000_000;
    for seed in [3, 17, 4242] {
        let mut policy =
            SamplingPolicy::for_expected_steps_with_rng(EXPECTED, ChaCha8Rng::seed_from_u64(seed));
        let forwarded = (0..EXPECTED).filter(|_| policy.should_forward()).count() as u64;
        let fraction = forwarded as f64 / EXPECTED as f64;
        assert!(
            (0.095..=0.105).contains(&fraction),
            "seed {seed}: forwarded {forwarded} of {EXPECTED}"
        );
        assert_approx_eq!(
            policy.rate(),
            TARGET_LIVE_CALLS as f64 / EXPECTED as f64
        );
    }
}

#[rstest]
#[case(200_000, 0.5)]
#[case(400_000, 0.25)]
fn logger_forwards_target_fraction(#[case] expected_steps: u64, #[case] rate: f64) {
    let dir = tempfile::tempdir().unwrap();
    let forwarder = RecordingForwarder::new();
    let logger = SampledLogger::builder()
        .expected_steps(expected_steps)
        // keep everything in memory, only the live view is under test
        .chunk_size(usize::MAX)
        .rng(ChaCha8Rng::seed_from_u64(expected_steps))
        .build(
            RunContext::new("rate", "rate").with_storage_root(dir.path()),
            forwarder.clone(),
            InMemoryRegistry::new(),
        )
        .unwrap();
    assert_approx_eq!(logger.live_rate(), rate);

    const LOGGED: u32 = 40_000;
    for i in 0..LOGGED {
        logger.log(Record::new().with("i", i)).unwrap();
    }
    let fraction = forwarder.records().len() as f64 / f64::from(LOGGED);
    assert!((fraction - rate).abs() < 0.02, "{fraction} vs {rate}");
    assert_eq!(logger.stats().buffered, LOGGED as usize);
}

#[test]
fn sampling_never_drops_persisted_records() {
    let dir = tempfile::tempdir().unwrap();
    let forwarder = RecordingForwarder::new();
    let logger = SampledLogger::builder()
        .live_rate(0.0)
        .chunk_size(100)
        .build(
            RunContext::new("quiet", "quiet").with_storage_root(dir.path()),
            forwarder.clone(),
            InMemoryRegistry::new(),
        )
        .unwrap();
    for i in 0..1_050u32 {
        logger.log(Record::new().with("i", i)).unwrap();
    }
    let report = logger.finalize().unwrap();

    assert!(forwarder.records().is_empty());
    assert_eq!(forwarder.calls(), 0);
    assert_eq!(report.live_forwarded, 0);
    assert_eq!(report.chunk_files.len(), 11);
    assert_eq!(
        read_history(dir.path().join("history/quiet")).unwrap().len(),
        1_050
    );
}

#[test]
fn degenerate_expected_steps_forward_everything() {
    let dir = tempfile::tempdir().unwrap();
    let forwarder = RecordingForwarder::new();
    let logger = SampledLogger::builder()
        .expected_steps(0)
        .build(
            RunContext::new("tiny", "tiny").with_storage_root(dir.path()),
            forwarder.clone(),
            InMemoryRegistry::new(),
        )
        .unwrap();
    for i in 0..100u32 {
        logger.log(Record::new().with("i", i)).unwrap();
    }
    assert_eq!(forwarder.records().len(), 100);
    assert_eq!(logger.chunk_size(), 100_000);
}

#[test]
fn config_file_drives_the_builder() {
    let config: LoggerConfig = toml::from_str(
        r#"
        wandb_log_rate = 1.0
        history_chunk_size = 25
        retry_attempts = 1
        gzip_level = 9
        "#,
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let forwarder = RecordingForwarder::new();
    let logger = config
        .builder()
        .unwrap()
        .build(
            RunContext::new("cfg", "cfg").with_storage_root(dir.path()),
            forwarder.clone(),
            InMemoryRegistry::new(),
        )
        .unwrap();
    assert_eq!(logger.chunk_size(), 25);
    for i in 0..60u32 {
        logger.log(Record::new().with("i", i)).unwrap();
    }
    assert_eq!(forwarder.records().len(), 60);
    let report = logger.finalize().unwrap();
    assert_eq!(report.chunk_files.len(), 3);
    assert!(
        report
            .chunk_files
            .iter()
            .all(|path| path.extension().is_some_and(|ext| ext == "parquet"))
    );
}

#[test]
fn config_file_selects_json_chunks() {
    let config: LoggerConfig = toml::from_str(
        r#"
        expected_steps = 100
        format = "json"
        "#,
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let logger = config
        .builder()
        .unwrap()
        .build(
            RunContext::new("cfg-json", "cfg-json").with_storage_root(dir.path()),
            RecordingForwarder::new(),
            InMemoryRegistry::new(),
        )
        .unwrap();
    for i in 0..5u32 {
        logger.log(Record::new().with("i", i)).unwrap();
    }
    let report = logger.finalize().unwrap();
    assert_eq!(report.chunk_files.len(), 1);
    assert!(report.chunk_files[0].to_string_lossy().ends_with(".json.gz"));
    assert_eq!(read_history(dir.path().join("history/cfg-json")).unwrap().len(), 5);
}

#[test]
fn config_file_with_zero_retries_is_rejected() {
    let config: LoggerConfig = toml::from_str("expected_steps = 100\nretry_attempts = 0").unwrap();
    assert!(config.builder().is_err());
}
