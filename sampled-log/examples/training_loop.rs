// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logs random metrics for a number of steps, then runs the teardown hooks like a job host would.
//!
//! Run with `RUST_LOG=sampled_log=debug cargo run --example training_loop -- 2000000` to see each
//! chunk being written.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use rand::Rng;
use sampled_log::{
    ArtifactSpec, BoxError, Record, RunContext, SampledLogger, StampedRecord, Teardown, read_history,
};
use tracing_subscriber::EnvFilter;

const METRICS_PER_STEP: usize = 20;

fn metrics(rng: &mut impl Rng) -> Record {
    (0..METRICS_PER_STEP)
        .map(|i| (format!("metric-{i}"), rng.random::<f64>()))
        .collect()
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let steps: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 300_000,
    };
    let storage = tempfile::tempdir()?;

    // stands in for the live backend
    let live_calls = Arc::new(AtomicU64::new(0));
    let counter = live_calls.clone();
    let teardown = Teardown::new();

    let logger = SampledLogger::builder()
        // expected_steps does not need to be exact
        .expected_steps(steps)
        .build(
            RunContext::new("demo", "training-loop").with_storage_root(storage.path()),
            move |_: &StampedRecord| -> Result<(), BoxError> {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            |artifact: &ArtifactSpec| -> Result<(), BoxError> {
                println!(
                    "registered {} ({}) with {} chunk files",
                    artifact.name,
                    artifact.kind,
                    artifact.files.len()
                );
                Ok(())
            },
        )?;
    logger.register_teardown(&teardown)?;
    println!(
        "logging {steps} steps, live rate {}, chunk size {}",
        logger.live_rate(),
        logger.chunk_size()
    );

    let mut rng = rand::rng();
    for _ in 0..steps {
        logger.log(metrics(&mut rng))?;
    }

    // the host finishes the job
    for failure in teardown.run() {
        eprintln!("{failure}");
    }

    let stats = logger.stats();
    println!(
        "{} records logged, {} sent live, {} chunk files",
        stats.records_logged,
        live_calls.load(Ordering::Relaxed),
        stats.chunks_written
    );
    let history = read_history(logger.run().storage_dir())?;
    println!("history holds {} records", history.len());
    Ok(())
}
