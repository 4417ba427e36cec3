// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The in-memory [ChunkBuffer] and the chunk size derivation.

use sampled_log_core::{ConfigError, StampedRecord, Step};

/// The most chunk files a job of the expected size should produce.
pub const MAX_CHUNKS: u64 = 100;

/// The smallest derived chunk size, so that short jobs don't produce many tiny files.
pub const MIN_STEPS_PER_CHUNK: u64 = 100_000;

/// The chunk size for a job that expects to log `expected_steps` records:
/// `max(expected_steps / MAX_CHUNKS, MIN_STEPS_PER_CHUNK)`.
///
/// ```
/// # use sampled_log::buffer::chunk_size_for_expected_steps;
/// assert_eq!(chunk_size_for_expected_steps(1_000_000), 100_000);
/// assert_eq!(chunk_size_for_expected_steps(50_000_000), 500_000);
/// assert_eq!(chunk_size_for_expected_steps(0), 100_000);
/// ```
pub fn chunk_size_for_expected_steps(expected_steps: u64) -> usize {
    let size = (expected_steps / MAX_CHUNKS).max(MIN_STEPS_PER_CHUNK);
    usize::try_from(size).unwrap_or(usize::MAX)
}

/// Whether a [ChunkBuffer] holds records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// No records are buffered
    Empty,
    /// Some records are buffered but not yet written
    Accumulating,
}

/// Accumulates stamped records in arrival order until there are enough of them for a chunk.
///
/// The buffer only holds records that are not yet durably written. It is drained by
/// [`ChunkWriter::flush`] once the write succeeded.
///
/// [`ChunkWriter::flush`]: crate::chunk::ChunkWriter::flush
#[derive(Debug)]
pub struct ChunkBuffer {
    records: Vec<StampedRecord>,
    chunk_size: usize,
}

impl ChunkBuffer {
    /// Create an empty buffer that is full after `chunk_size` records.
    pub fn new(chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::invalid("chunk size must be at least 1"));
        }
        Ok(Self {
            records: Vec::new(),
            chunk_size,
        })
    }

    /// Append `record` and return whether the buffer has reached the chunk size.
    ///
    /// After a failed flush the buffer may already hold more than a chunk. It keeps reporting
    /// full until a flush drains it.
    pub fn push(&mut self, record: StampedRecord) -> bool {
        self.records.push(record);
        self.is_full()
    }

    /// True if the buffer holds at least a chunk's worth of records
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.chunk_size
    }

    /// Number of buffered records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records are buffered
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The flush threshold
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether any records are buffered
    pub fn state(&self) -> BufferState {
        if self.records.is_empty() {
            BufferState::Empty
        } else {
            BufferState::Accumulating
        }
    }

    /// Step of the oldest buffered record, which names the next chunk
    pub fn first_step(&self) -> Option<Step> {
        self.records.first().map(|r| r.step)
    }

    /// The buffered records, oldest first
    pub fn records(&self) -> &[StampedRecord] {
        &self.records
    }

    /// Drop every buffered record. Only called once they are durably written.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}
