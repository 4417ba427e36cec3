// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use rand::{RngCore, rngs::ThreadRng};
use sampled_log_core::{
    AlreadyFinalizedError, ArtifactRegistry, BoxError, ChunkFormat, Clock, LiveForward, LogError,
    PersistenceError, Record, RegisterTeardown, RunContext, StampedRecord, Step,
    time::elapsed_seconds, validate::validate_step,
};

use crate::{
    buffer::ChunkBuffer,
    chunk::{ChunkWriter, RetryConfig, WrittenChunk},
    config::Parameters,
    finalize::{FinalizeReport, Finalizer},
    format::ParquetGzip,
    rate_limit::RateLimit,
    sample::{DefaultRng, SamplingPolicy},
};

/// Builder for [`SampledLogger`].
///
/// Either [`expected_steps`] or both [`live_rate`] and [`chunk_size`] must be set. When both
/// forms are given, the explicit value wins for that parameter.
///
/// [`expected_steps`]: SampledLoggerBuilder::expected_steps
/// [`live_rate`]: SampledLoggerBuilder::live_rate
/// [`chunk_size`]: SampledLoggerBuilder::chunk_size
pub struct SampledLoggerBuilder<R = DefaultRng<ThreadRng>> {
    expected_steps: Option<u64>,
    live_rate: Option<f64>,
    chunk_size: Option<usize>,
    retry: RetryConfig,
    clock: Clock,
    rng: R,
    format: Box<dyn ChunkFormat + Send + Sync>,
}

impl Default for SampledLoggerBuilder {
    fn default() -> Self {
        Self {
            expected_steps: None,
            live_rate: None,
            chunk_size: None,
            retry: RetryConfig::default(),
            clock: Clock::default(),
            rng: DefaultRng::default(),
            format: Box::new(ParquetGzip::default()),
        }
    }
}

impl<R> SampledLoggerBuilder<R> {
    /// Approximate number of records the job will log. Derives the live rate and the chunk size.
    pub fn expected_steps(mut self, expected_steps: u64) -> Self {
        self.expected_steps = Some(expected_steps);
        self
    }

    /// Forward records to the live backend with probability `rate`
    pub fn live_rate(mut self, rate: f64) -> Self {
        self.live_rate = Some(rate);
        self
    }

    /// Write a chunk file every `chunk_size` records
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// How chunk writes are retried. Defaults to [`RetryConfig::default`].
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The clock records are stamped with. Defaults to the system clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The chunk file format. Defaults to [`ParquetGzip`].
    pub fn format(mut self, format: impl ChunkFormat + Send + Sync + 'static) -> Self {
        self.format = Box::new(format);
        self
    }

    /// The random number generator for sampling decisions. Defaults to the thread-local RNG.
    pub fn rng<R2>(self, rng: R2) -> SampledLoggerBuilder<R2> {
        SampledLoggerBuilder {
            expected_steps: self.expected_steps,
            live_rate: self.live_rate,
            chunk_size: self.chunk_size,
            retry: self.retry,
            clock: self.clock,
            rng,
            format: self.format,
        }
    }

    /// Build the logger for `run`, creating its storage directory.
    ///
    /// `forward` receives the sampled records, `registry` receives the history artifact at
    /// finalize.
    pub fn build(
        self,
        run: RunContext,
        forward: impl LiveForward + Send + Sync + 'static,
        registry: impl ArtifactRegistry + Send + Sync + 'static,
    ) -> Result<SampledLogger<R>, LogError> {
        run.validate()?;
        self.retry.validate()?;
        let parameters = Parameters::resolve(self.expected_steps, self.live_rate, self.chunk_size)?;
        let policy = SamplingPolicy::with_rng(parameters.live_rate, self.rng)?;
        let buffer = ChunkBuffer::new(parameters.chunk_size)?;
        fs::create_dir_all(run.storage_dir())
            .map_err(|err| PersistenceError::new(run.storage_dir(), 1, err))?;
        let writer = ChunkWriter::new_boxed(run.storage_dir().to_owned(), self.format, self.retry);

        tracing::debug!(
            run_id = run.id(),
            live_rate = parameters.live_rate,
            chunk_size = parameters.chunk_size,
            dir = %run.storage_dir().display(),
            "created sampled logger"
        );
        let started = self.clock.instant();
        Ok(SampledLogger {
            state: Arc::new(Mutex::new(LoggerState {
                run,
                policy,
                buffer,
                writer,
                forward: Box::new(forward),
                registry: Box::new(registry),
                clock: self.clock,
                started,
                forward_warnings: RateLimit::new(FORWARD_WARNING_INTERVAL),
                next_step: 0,
                last_step: None,
                stats: LoggerStats::default(),
            })),
        })
    }
}

const FORWARD_WARNING_INTERVAL: Duration = Duration::from_secs(10);

/// Counters describing what a [`SampledLogger`] has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerStats {
    /// Records accepted by [`SampledLogger::log`] and friends
    pub records_logged: u64,
    /// Records successfully sent to the live backend
    pub live_forwarded: u64,
    /// Live forward calls that returned an error
    pub forward_failures: u64,
    /// Chunk files written
    pub chunks_written: u64,
    /// Records in the chunk files written
    pub records_written: u64,
    /// Records waiting in the buffer
    pub buffered: usize,
    /// Whether [`SampledLogger::finalize`] succeeded
    pub finalized: bool,
}

impl LoggerStats {
    fn record_chunk(&mut self, chunk: &WrittenChunk) {
        self.chunks_written += 1;
        self.records_written += chunk.rows as u64;
    }
}

struct LoggerState<R> {
    run: RunContext,
    policy: SamplingPolicy<R>,
    buffer: ChunkBuffer,
    writer: ChunkWriter,
    forward: Box<dyn LiveForward + Send + Sync>,
    registry: Box<dyn ArtifactRegistry + Send + Sync>,
    clock: Clock,
    started: Instant,
    forward_warnings: RateLimit,
    next_step: Step,
    last_step: Option<Step>,
    stats: LoggerStats,
}

impl<R: RngCore> LoggerState<R> {
    fn check_open(&self) -> Result<(), AlreadyFinalizedError> {
        if self.stats.finalized {
            Err(AlreadyFinalizedError)
        } else {
            Ok(())
        }
    }

    fn append(&mut self, record: Record, step: Option<Step>) -> Result<Step, LogError> {
        self.check_open()?;
        record.validate()?;
        let step = step.unwrap_or(self.next_step);
        validate_step(step, self.last_step)?;

        let stamped = StampedRecord {
            step,
            timestamp: self.clock.unix_seconds(),
            runtime: elapsed_seconds(self.started, self.clock.instant()),
            record,
        };
        self.last_step = Some(step);
        self.next_step = step.saturating_add(1);
        self.stats.records_logged += 1;

        // drawn for every record, whatever happens to the buffer
        if self.policy.should_forward() {
            self.forward_live(&stamped);
        }
        if self.buffer.push(stamped) {
            self.flush()?;
        }
        Ok(step)
    }

    fn forward_live(&mut self, stamped: &StampedRecord) {
        match self.forward.forward(stamped) {
            Ok(()) => self.stats.live_forwarded += 1,
            Err(err) => {
                self.stats.forward_failures += 1;
                let failures = self.stats.forward_failures;
                if let Some(suppressed) = self.forward_warnings.allow(self.clock.instant()) {
                    tracing::warn!(
                        ?err,
                        failures,
                        suppressed,
                        "couldn't forward record to the live backend"
                    );
                }
            }
        }
    }

    fn flush(&mut self) -> Result<Option<WrittenChunk>, LogError> {
        let chunk = self.writer.flush(&mut self.buffer)?;
        if let Some(chunk) = &chunk {
            self.stats.record_chunk(chunk);
        }
        Ok(chunk)
    }

    fn finalize(&mut self) -> Result<FinalizeReport, LogError> {
        self.check_open()?;
        let stats = &mut self.stats;
        let finalized = Finalizer::new(&self.writer, &*self.registry, self.run.artifact_name())
            .run(&mut self.buffer, |chunk| stats.record_chunk(chunk))?;
        self.stats.finalized = true;

        tracing::info!(
            artifact = %finalized.artifact.name,
            chunks = finalized.artifact.files.len(),
            records = self.stats.records_written,
            live_forwarded = self.stats.live_forwarded,
            "finalized run history"
        );
        Ok(FinalizeReport {
            artifact: finalized.artifact.name,
            chunk_files: finalized.artifact.files,
            records_written: self.stats.records_written,
            live_forwarded: self.stats.live_forwarded,
        })
    }
}

/// Downsamples a stream of metric records to a live backend while writing every record to a
/// chunked history on disk.
///
/// Every record passed to [`log`](SampledLogger::log) is validated, stamped with its step and
/// times, forwarded live with probability [`live_rate`](SampledLogger::live_rate), and buffered.
/// Whenever the buffer holds [`chunk_size`](SampledLogger::chunk_size) records they are written to
/// a new chunk file before `log` returns. [`finalize`](SampledLogger::finalize) writes the rest
/// and registers all chunk files as the run's history artifact.
///
/// `SampledLogger` is a cheap handle: clones log to the same run, and calls from several threads
/// are serialized.
///
/// ```
/// # use sampled_log::{NoForward, Record, RunContext, SampledLogger, ArtifactSpec, BoxError};
/// # let dir = tempfile::tempdir().unwrap();
/// let logger = SampledLogger::builder()
///     .expected_steps(1_000_000)
///     .build(
///         RunContext::new("3kd9x", "resnet").with_storage_root(dir.path()),
///         NoForward,
///         |artifact: &ArtifactSpec| -> Result<(), BoxError> {
///             println!("registering {} with {} files", artifact.name, artifact.files.len());
///             Ok(())
///         },
///     )
///     .unwrap();
/// assert_eq!(logger.live_rate(), 0.1);
/// assert_eq!(logger.chunk_size(), 100_000);
///
/// for step in 0..1_000u32 {
///     logger.log(Record::new().with("loss", 1.0 / f64::from(step + 1))).unwrap();
/// }
/// let report = logger.finalize().unwrap();
/// assert_eq!(report.records_written, 1_000);
/// assert_eq!(report.chunk_files.len(), 1);
/// ```
pub struct SampledLogger<R = DefaultRng<ThreadRng>> {
    state: Arc<Mutex<LoggerState<R>>>,
}

impl<R> Clone for SampledLogger<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R> std::fmt::Debug for SampledLogger<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SampledLogger")
            .field("run", &state.run)
            .field("writer", &state.writer)
            .field("live_rate", &state.policy.rate())
            .field("stats", &state.stats)
            .finish()
    }
}

impl SampledLogger {
    /// Create a builder with default settings.
    pub fn builder() -> SampledLoggerBuilder {
        SampledLoggerBuilder::default()
    }
}

impl<R> SampledLogger<R> {
    // a producer that panicked mid-call leaves the buffer consistent, so keep going
    fn lock(&self) -> MutexGuard<'_, LoggerState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The run this logger belongs to
    pub fn run(&self) -> RunContext {
        self.lock().run.clone()
    }

    /// Probability that a record is forwarded to the live backend
    pub fn live_rate(&self) -> f64 {
        self.lock().policy.rate()
    }

    /// Number of records per chunk file
    pub fn chunk_size(&self) -> usize {
        self.lock().buffer.chunk_size()
    }

    /// Counters describing what the logger has done so far
    pub fn stats(&self) -> LoggerStats {
        let state = self.lock();
        LoggerStats {
            buffered: state.buffer.len(),
            ..state.stats.clone()
        }
    }
}

impl<R: RngCore> SampledLogger<R> {
    /// Log `record` at the next step, returning the step.
    ///
    /// Steps start at 0 and increase by one per record, or continue after the last
    /// [`log_at`](SampledLogger::log_at) step.
    ///
    /// An invalid record is rejected with [`LogError::Validation`] and doesn't use up a step. If
    /// the record completes a chunk that then can't be written, the error is
    /// [`LogError::Persistence`], but the record is accepted and stays buffered with the rest of
    /// the chunk; the next `log` or [`flush`](SampledLogger::flush) retries the write.
    pub fn log(&self, record: Record) -> Result<Step, LogError> {
        self.lock().append(record, None)
    }

    /// Log `record` at an explicit `step`, which must be greater than every step logged before.
    pub fn log_at(&self, record: Record, step: Step) -> Result<Step, LogError> {
        self.lock().append(record, Some(step))
    }

    /// Log untyped input, which must be a JSON object of scalars.
    ///
    /// ```
    /// # use sampled_log::{LogError, NoForward, RunContext, SampledLogger, ArtifactSpec, BoxError};
    /// # let dir = tempfile::tempdir().unwrap();
    /// # let logger = SampledLogger::builder()
    /// #     .expected_steps(10)
    /// #     .build(
    /// #         RunContext::new("json", "json").with_storage_root(dir.path()),
    /// #         NoForward,
    /// #         |_: &ArtifactSpec| -> Result<(), BoxError> { Ok(()) },
    /// #     )
    /// #     .unwrap();
    /// logger.log_json(serde_json::json!({"loss": 0.5, "phase": "train"})).unwrap();
    ///
    /// let err = logger.log_json(serde_json::json!([0.5])).unwrap_err();
    /// assert!(matches!(err, LogError::Validation(_)));
    /// ```
    pub fn log_json(&self, value: serde_json::Value) -> Result<Step, LogError> {
        let record = Record::from_json(value)?;
        self.log(record)
    }

    /// Write every buffered record to a new chunk file now.
    ///
    /// Does nothing and returns `Ok(None)` if the buffer is empty.
    pub fn flush(&self) -> Result<Option<WrittenChunk>, LogError> {
        self.lock().flush()
    }

    /// Write the remaining records and register all chunk files as the run's history artifact.
    ///
    /// After a successful call the logger rejects further records and a second `finalize` with
    /// [`LogError::AlreadyFinalized`]. If writing or registration fails the logger stays open and
    /// `finalize` can be called again.
    pub fn finalize(&self) -> Result<FinalizeReport, LogError> {
        self.lock().finalize()
    }
}

impl<R: RngCore + Send + 'static> SampledLogger<R> {
    /// Register [`finalize`](SampledLogger::finalize) with the host's teardown hooks.
    ///
    /// The hook treats an already finalized logger as success, so calling `finalize` explicitly
    /// before teardown is fine.
    pub fn register_teardown(&self, teardown: &impl RegisterTeardown) -> Result<(), BoxError> {
        let logger = self.clone();
        let name = format!("finalize {}", self.lock().run.artifact_name());
        teardown.register_teardown(
            name.into(),
            Box::new(move || -> Result<(), BoxError> {
                match logger.finalize() {
                    Ok(_) | Err(LogError::AlreadyFinalized(_)) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sampled_log_core::{NoForward, Teardown, time::fakes::ManualClock};

    use super::*;
    use crate::{
        format::read_history,
        test_util::{FailingFormat, InMemoryRegistry, RecordingForwarder},
    };

    fn run(dir: &tempfile::TempDir) -> RunContext {
        RunContext::new("unit", "unit-test").with_storage_root(dir.path())
    }

    #[test]
    fn build_requires_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let err = SampledLogger::builder()
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap_err();
        assert!(matches!(err, LogError::Config(_)));

        let err = SampledLogger::builder()
            .expected_steps(10)
            .build(RunContext::new("a/b", "x"), NoForward, InMemoryRegistry::new())
            .unwrap_err();
        assert!(matches!(err, LogError::Config(_)));
    }

    #[test]
    fn build_creates_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SampledLogger::builder()
            .live_rate(0.5)
            .chunk_size(3)
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap();
        assert!(dir.path().join("history/unit").is_dir());
        assert_approx_eq!(logger.live_rate(), 0.5);
        assert_eq!(logger.chunk_size(), 3);
    }

    #[test]
    fn stamps_steps_and_times() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at_time(UNIX_EPOCH + Duration::from_secs(1_000));
        let logger = SampledLogger::builder()
            .chunk_size(10)
            .live_rate(1.0)
            .clock(Clock::custom(clock.clone()))
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap();

        assert_eq!(logger.log(Record::new().with("a", 1)).unwrap(), 0);
        clock.advance(Duration::from_millis(500));
        assert_eq!(logger.log(Record::new().with("a", 2)).unwrap(), 1);
        assert_eq!(logger.log_at(Record::new().with("a", 3), 10).unwrap(), 10);
        assert_eq!(logger.log(Record::new().with("a", 4)).unwrap(), 11);
        logger.finalize().unwrap();

        let history = read_history(dir.path().join("history/unit")).unwrap();
        let steps: Vec<_> = history.iter().map(|r| r.step).collect();
        assert_eq!(steps, [0, 1, 10, 11]);
        assert_approx_eq!(history[0].timestamp, 1_000.0);
        assert_approx_eq!(history[0].runtime, 0.0);
        assert_approx_eq!(history[1].timestamp, 1_000.5);
        assert_approx_eq!(history[1].runtime, 0.5);
    }

    #[test]
    fn rejects_invalid_records_without_using_a_step() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SampledLogger::builder()
            .expected_steps(10)
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap();

        let err = logger.log(Record::new().with("_step", 3)).unwrap_err();
        assert!(matches!(err, LogError::Validation(_)));
        let err = logger.log(Record::new().with("loss", f64::NAN)).unwrap_err();
        assert!(matches!(err, LogError::Validation(_)));

        assert_eq!(logger.log(Record::new().with("loss", 1.0)).unwrap(), 0);
        let err = logger.log_at(Record::new(), 0).unwrap_err();
        assert!(matches!(err, LogError::Validation(_)));
        assert_eq!(logger.stats().records_logged, 1);
    }

    #[test]
    fn forward_failures_do_not_fail_logging() {
        let dir = tempfile::tempdir().unwrap();
        let forwarder = RecordingForwarder::new();
        forwarder.fail_next(2);
        let logger = SampledLogger::builder()
            .expected_steps(10)
            .build(run(&dir), forwarder.clone(), InMemoryRegistry::new())
            .unwrap();

        for value in 0..5 {
            logger.log(Record::new().with("v", value)).unwrap();
        }
        let stats = logger.stats();
        assert_eq!(stats.forward_failures, 2);
        assert_eq!(stats.live_forwarded, 3);
        assert_eq!(forwarder.calls(), 5);
        assert_eq!(stats.buffered, 5);

        let report = logger.finalize().unwrap();
        assert_eq!(report.records_written, 5);
        assert_eq!(report.live_forwarded, 3);
    }

    #[test]
    fn failed_chunk_write_keeps_records_and_retries_on_next_log() {
        let dir = tempfile::tempdir().unwrap();
        let format = FailingFormat::new();
        let logger = SampledLogger::builder()
            .live_rate(0.0)
            .chunk_size(2)
            .retry(RetryConfig::no_retry())
            .format(format.clone())
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap();

        format.fail_next(1);
        logger.log(Record::new().with("v", 0)).unwrap();
        let err = logger.log(Record::new().with("v", 1)).unwrap_err();
        assert!(matches!(err, LogError::Persistence(_)));
        assert_eq!(logger.stats().buffered, 2);

        // the next append sees a full buffer and writes all three records
        logger.log(Record::new().with("v", 2)).unwrap();
        let stats = logger.stats();
        assert_eq!(stats.buffered, 0);
        assert_eq!(stats.chunks_written, 1);
        assert_eq!(stats.records_written, 3);
        assert_eq!(format.attempts(), 2);
    }

    #[test]
    fn retries_transient_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        let format = FailingFormat::new();
        format.fail_next(2);
        let logger = SampledLogger::builder()
            .live_rate(0.0)
            .chunk_size(1)
            .retry(RetryConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                ..RetryConfig::default()
            })
            .format(format.clone())
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap();

        logger.log(Record::new().with("v", 0)).unwrap();
        assert_eq!(format.attempts(), 3);
        assert_eq!(logger.stats().chunks_written, 1);
    }

    #[test]
    fn build_rejects_zero_write_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let err = SampledLogger::builder()
            .expected_steps(10)
            .retry(RetryConfig {
                max_attempts: 0,
                ..RetryConfig::default()
            })
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap_err();
        assert!(matches!(err, LogError::Config(_)));
    }

    #[test]
    fn last_chunk_is_counted_when_registration_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InMemoryRegistry::new();
        registry.fail_next(1);
        let logger = SampledLogger::builder()
            .live_rate(0.0)
            .chunk_size(10)
            .build(run(&dir), NoForward, registry.clone())
            .unwrap();
        for v in 0..4 {
            logger.log(Record::new().with("v", v)).unwrap();
        }

        assert!(matches!(logger.finalize(), Err(LogError::Registration(_))));
        let stats = logger.stats();
        assert_eq!((stats.chunks_written, stats.records_written), (1, 4));
        assert_eq!(stats.buffered, 0);

        let report = logger.finalize().unwrap();
        assert_eq!(report.records_written, 4);
        assert_eq!(logger.stats().chunks_written, 1);
        assert_eq!(registry.registered()[0].files.len(), 1);
    }

    #[test]
    fn seeded_sampling_forwards_the_configured_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let forwarder = RecordingForwarder::new();
        let logger = SampledLogger::builder()
            .live_rate(0.25)
            .chunk_size(100_000)
            .rng(ChaCha8Rng::seed_from_u64(7))
            .build(run(&dir), forwarder.clone(), InMemoryRegistry::new())
            .unwrap();

        for step in 0..20_000u32 {
            logger.log(Record::new().with("step", step)).unwrap();
        }
        let fraction = forwarder.records().len() as f64 / 20_000.0;
        assert!((0.23..0.27).contains(&fraction), "{fraction}");
        // every record is buffered whether or not it was forwarded
        assert_eq!(logger.stats().buffered, 20_000);
    }

    #[test]
    fn teardown_hook_finalizes_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InMemoryRegistry::new();
        let logger = SampledLogger::builder()
            .expected_steps(10)
            .build(run(&dir), NoForward, registry.clone())
            .unwrap();
        let teardown = Teardown::new();
        logger.register_teardown(&teardown).unwrap();
        assert_eq!(teardown.len(), 1);

        logger.log(Record::new().with("v", 1)).unwrap();
        assert!(teardown.run().is_empty());
        assert!(logger.stats().finalized);
        assert_eq!(registry.registered().len(), 1);
    }

    #[test]
    fn teardown_after_explicit_finalize_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InMemoryRegistry::new();
        let logger = SampledLogger::builder()
            .expected_steps(10)
            .build(run(&dir), NoForward, registry.clone())
            .unwrap();
        let teardown = Teardown::new();
        logger.register_teardown(&teardown).unwrap();

        logger.finalize().unwrap();
        assert!(teardown.run().is_empty());
        assert_eq!(registry.registered().len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SampledLogger::builder()
            .expected_steps(10)
            .build(run(&dir), NoForward, InMemoryRegistry::new())
            .unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for v in 0..250 {
                        logger.log(Record::new().with("v", v)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = logger.finalize().unwrap();
        assert_eq!(report.records_written, 1_000);
        let steps: Vec<_> = read_history(dir.path().join("history/unit"))
            .unwrap()
            .iter()
            .map(|r| r.step)
            .collect();
        assert_eq!(steps, (0..1_000).collect::<Vec<_>>());
    }
}
