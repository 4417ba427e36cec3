// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains the [`ChunkFormat`] trait, which turns a chunk of records into the bytes of one
//! history file.

use std::io;

use crate::StampedRecord;

/// Serializes one chunk of records into a history file.
///
/// A format is called once per chunk, with the records in step order. It writes the complete
/// file to `output`. The writer takes care of temporary files, retries and renaming, so a format
/// only needs to produce bytes.
///
/// Returning an error fails the chunk write. The records stay buffered and are retried with the
/// next flush.
pub trait ChunkFormat {
    /// File name suffix of the chunk files, without the leading dot, e.g. `parquet`.
    fn extension(&self) -> &str;

    /// Write `records` to `output` as one chunk file. `records` is never empty.
    fn write_chunk(&self, records: &[StampedRecord], output: &mut dyn io::Write)
    -> io::Result<()>;
}
