// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The chunk writer.
//!
//! A chunk is written to a temporary file in the run's storage directory, synced, and renamed to
//! `history-<start step>.<ext>` without replacing an existing file. A chunk file therefore either
//! exists complete or doesn't exist at all, and is never modified once it has its final name.
//!
//! Writes are retried with exponential backoff, see [RetryConfig].

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use sampled_log_core::{ChunkFormat, ConfigError, PersistenceError, StampedRecord, Step};

use crate::buffer::ChunkBuffer;

const CHUNK_FILE_PREFIX: &str = "history-";
const STEP_DIGITS: usize = 12;

/// The file name of the chunk starting at `start_step`: `history-<12-digit step>.<extension>`.
///
/// Steps with more than 12 digits are written in full.
///
/// ```
/// # use sampled_log::chunk::chunk_file_name;
/// assert_eq!(chunk_file_name(100_000, "parquet"), "history-000000100000.parquet");
/// ```
pub fn chunk_file_name(start_step: Step, extension: &str) -> String {
    format!("{CHUNK_FILE_PREFIX}{start_step:0width$}.{extension}", width = STEP_DIGITS)
}

/// Parse the start step out of a chunk file name, returning `None` for any other file.
pub fn parse_chunk_file_name(name: &str, extension: &str) -> Option<Step> {
    let digits = name
        .strip_prefix(CHUNK_FILE_PREFIX)?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    if digits.len() < STEP_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List the chunk files in `dir`, in step order.
///
/// Files that don't follow the chunk naming pattern, such as leftover temporary files, are
/// ignored.
pub fn list_chunk_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    Ok(list_chunks(dir, extension)?
        .into_iter()
        .map(|(_, path)| path)
        .collect())
}

/// Like [list_chunk_files], but also returns the start step of each chunk.
pub(crate) fn list_chunks(dir: &Path, extension: &str) -> io::Result<Vec<(Step, PathBuf)>> {
    let mut chunks = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(step) = name.to_str().and_then(|n| parse_chunk_file_name(n, extension)) else {
            continue;
        };
        if entry.file_type()?.is_file() {
            chunks.push((step, entry.path()));
        }
    }
    chunks.sort_unstable_by_key(|(step, _)| *step);
    Ok(chunks)
}

// Makes a rename into `dir` durable. Directories can't be opened as files on Windows.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Retry configuration for chunk writes.
///
/// The first retry waits `initial_backoff`, and each later one waits `multiplier` times longer, up
/// to `max_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of write attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Wait before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any wait
    pub max_backoff: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Attempt each write once. A failure is reported immediately.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check that at least one attempt is made and that backoff doesn't shrink.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("retry attempts must be at least 1"));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(ConfigError::invalid(format!(
                "backoff multiplier must be at least 1, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// The wait after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if secs.is_finite() && secs < self.max_backoff.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_backoff
        }
    }
}

/// A chunk file that was written by [`ChunkWriter::flush`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenChunk {
    /// Final path of the chunk file
    pub path: PathBuf,
    /// Step of the first record in the chunk
    pub start_step: Step,
    /// Number of records in the chunk
    pub rows: usize,
}

/// Writes buffered records to chunk files in a run's storage directory.
pub struct ChunkWriter {
    dir: PathBuf,
    format: Box<dyn ChunkFormat + Send + Sync>,
    retry: RetryConfig,
}

impl std::fmt::Debug for ChunkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkWriter")
            .field("dir", &self.dir)
            .field("extension", &self.format.extension())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ChunkWriter {
    /// Create a writer for `dir`. The directory must exist.
    pub fn new(
        dir: impl Into<PathBuf>,
        format: impl ChunkFormat + Send + Sync + 'static,
        retry: RetryConfig,
    ) -> Self {
        Self::new_boxed(dir.into(), Box::new(format), retry)
    }

    pub(crate) fn new_boxed(
        dir: PathBuf,
        format: Box<dyn ChunkFormat + Send + Sync>,
        retry: RetryConfig,
    ) -> Self {
        Self { dir, format, retry }
    }

    /// The storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name suffix of the chunk files
    pub fn extension(&self) -> &str {
        self.format.extension()
    }

    /// The chunk files written to the storage directory so far, in step order
    pub fn list(&self) -> io::Result<Vec<PathBuf>> {
        list_chunk_files(&self.dir, self.format.extension())
    }

    /// Write every record in `buffer` to one new chunk file and clear the buffer.
    ///
    /// Flushing an empty buffer does nothing and returns `Ok(None)`. If the write fails, the
    /// buffer is left untouched so that a later flush can write the same records.
    pub fn flush(&self, buffer: &mut ChunkBuffer) -> Result<Option<WrittenChunk>, PersistenceError> {
        let Some(start_step) = buffer.first_step() else {
            return Ok(None);
        };
        let path = self
            .dir
            .join(chunk_file_name(start_step, self.format.extension()));
        self.write_with_retry(&path, buffer.records())?;
        // the file has its final name, so retrying would only hit AlreadyExists
        if let Err(err) = sync_dir(&self.dir) {
            tracing::warn!(?err, dir = %self.dir.display(), "couldn't sync storage directory");
        }

        let rows = buffer.len();
        buffer.clear();
        tracing::debug!(path = %path.display(), start_step, rows, "wrote history chunk");
        Ok(Some(WrittenChunk {
            path,
            start_step,
            rows,
        }))
    }

    fn write_with_retry(&self, path: &Path, records: &[StampedRecord]) -> Result<(), PersistenceError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.write_once(path, records) {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            // an existing chunk file won't go away by retrying
            if err.kind() == io::ErrorKind::AlreadyExists || attempt >= max_attempts {
                tracing::error!(?err, path = %path.display(), attempt, "couldn't write history chunk");
                return Err(PersistenceError::new(path, attempt, err));
            }
            let backoff = self.retry.backoff(attempt);
            tracing::warn!(?err, path = %path.display(), attempt, ?backoff, "history chunk write failed, retrying");
            std::thread::sleep(backoff);
        }
    }

    fn write_once(&self, path: &Path, records: &[StampedRecord]) -> io::Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix(".history-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        {
            let mut output = BufWriter::new(file.as_file_mut());
            self.format.write_chunk(records, &mut output)?;
            output.flush()?;
        }
        file.as_file().sync_all()?;
        file.persist_noclobber(path).map_err(|err| err.error)?;
        Ok(())
    }
}
