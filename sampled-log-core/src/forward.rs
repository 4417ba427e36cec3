// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains the [`LiveForward`] trait, the host's native function for sending a record to the
//! live monitoring backend.

use crate::{BoxError, StampedRecord};

/// Sends one record to the live monitoring backend.
///
/// The logger only calls this for the sampled fraction of records. The call is synchronous and
/// may block. A returned error is logged and counted but does not fail the logging call, since the
/// record has already been buffered for the durable history.
///
/// Any `Fn(&StampedRecord) -> Result<(), BoxError>` closure implements this trait:
///
/// ```
/// # use sampled_log_core::{BoxError, LiveForward, Record, StampedRecord};
/// let forward = |record: &StampedRecord| -> Result<(), BoxError> {
///     println!("step {}: {:?}", record.step, record.record);
///     Ok(())
/// };
/// # let record = StampedRecord { step: 0, timestamp: 0.0, runtime: 0.0, record: Record::new() };
/// forward.forward(&record).unwrap();
/// ```
pub trait LiveForward {
    /// Forward `record` to the live backend.
    fn forward(&self, record: &StampedRecord) -> Result<(), BoxError>;
}

impl<F: Fn(&StampedRecord) -> Result<(), BoxError>> LiveForward for F {
    fn forward(&self, record: &StampedRecord) -> Result<(), BoxError> {
        self(record)
    }
}

/// A [LiveForward] that drops every record.
///
/// Useful when only the durable history is wanted.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoForward;

impl LiveForward for NoForward {
    fn forward(&self, _record: &StampedRecord) -> Result<(), BoxError> {
        Ok(())
    }
}
