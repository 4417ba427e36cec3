// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for testing code that embeds a [`SampledLogger`].
//!
//! [`RecordingForwarder`] and [`InMemoryRegistry`] stand in for the live backend and the artifact
//! service and remember every call. [`FailingFormat`] wraps the default chunk format and fails a
//! chosen number of writes, to exercise the retry and recovery paths.
//!
//! Fake clocks are in [`sampled_log_core::time::fakes`].
//!
//! This requires that the `test-util` feature be enabled.
//!
//! ```
//! # use sampled_log::{RunContext, SampledLogger, Record};
//! # use sampled_log::test_util::{InMemoryRegistry, RecordingForwarder};
//! let dir = tempfile::tempdir().unwrap();
//! let forwarder = RecordingForwarder::new();
//! let registry = InMemoryRegistry::new();
//! let logger = SampledLogger::builder()
//!     .expected_steps(1_000)
//!     .build(
//!         RunContext::new("doc", "doc-run").with_storage_root(dir.path()),
//!         forwarder.clone(),
//!         registry.clone(),
//!     )
//!     .unwrap();
//!
//! logger.log(Record::new().with("loss", 0.5)).unwrap();
//! logger.finalize().unwrap();
//!
//! // small jobs forward every record
//! assert_eq!(forwarder.records().len(), 1);
//! assert_eq!(registry.registered()[0].name, "run-history-doc");
//! ```
//!
//! [`SampledLogger`]: crate::SampledLogger

use std::{
    io,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use sampled_log_core::{
    ArtifactRegistry, ArtifactSpec, BoxError, ChunkFormat, LiveForward, StampedRecord,
};

use crate::format::ParquetGzip;

// Takes one unit off `remaining` if there is one, returning whether it did.
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A [`LiveForward`] that keeps every record it is handed.
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct RecordingForwarder {
    records: Arc<Mutex<Vec<StampedRecord>>>,
    failures: Arc<AtomicU32>,
    calls: Arc<AtomicU64>,
}

impl RecordingForwarder {
    /// Create an empty forwarder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail without recording the record
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// The records forwarded successfully so far
    pub fn records(&self) -> Vec<StampedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of forward calls, including failed ones
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LiveForward for RecordingForwarder {
    fn forward(&self, record: &StampedRecord) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures) {
            return Err("live backend unavailable".into());
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// An [`ArtifactRegistry`] that keeps every artifact registered with it.
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    registered: Arc<Mutex<Vec<ArtifactSpec>>>,
    failures: Arc<AtomicU32>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` registrations fail
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// The artifacts registered so far, oldest first
    pub fn registered(&self) -> Vec<ArtifactSpec> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ArtifactRegistry for InMemoryRegistry {
    fn register_artifact(&self, artifact: &ArtifactSpec) -> Result<(), BoxError> {
        if take_failure(&self.failures) {
            return Err(format!("artifact service rejected `{}`", artifact.name).into());
        }
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(artifact.clone());
        Ok(())
    }
}

/// A [`ParquetGzip`] chunk format that fails a chosen number of writes.
///
/// Clones share the failure counter, so a test can keep a handle after passing the format to a
/// logger.
#[derive(Debug, Clone, Default)]
pub struct FailingFormat {
    inner: ParquetGzip,
    failures: Arc<AtomicU32>,
    attempts: Arc<AtomicU64>,
}

impl FailingFormat {
    /// Create a format that doesn't fail until told to
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` chunk writes fail with an IO error
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Make every chunk write fail until [`FailingFormat::fail_next`] is called again
    pub fn fail_always(&self) {
        self.fail_next(u32::MAX);
    }

    /// Number of chunk writes attempted, including failed ones
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ChunkFormat for FailingFormat {
    fn extension(&self) -> &str {
        self.inner.extension()
    }

    fn write_chunk(
        &self,
        records: &[StampedRecord],
        output: &mut dyn io::Write,
    ) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures) {
            return Err(io::Error::other("injected chunk write failure"));
        }
        self.inner.write_chunk(records, output)
    }
}
