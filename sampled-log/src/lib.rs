// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use sampled_log_core::{
    AlreadyFinalizedError, ArtifactRegistry, ArtifactSpec, BoxError, ChunkFormat, Clock,
    ConfigError, HISTORY_ARTIFACT_KIND, LiveForward, LogError, NoForward, PersistenceError, Record,
    RegisterTeardown, RegistrationError, RunContext, Scalar, StampedRecord, Step, Teardown,
    TeardownFailure, TeardownHook, Time, ValidationError, ValidationErrorBuilder,
};

pub use crate::buffer::{MAX_CHUNKS, MIN_STEPS_PER_CHUNK};
pub use crate::chunk::{RetryConfig, WrittenChunk};
pub use crate::config::{LoggerConfig, Parameters};
pub use crate::finalize::FinalizeReport;
pub use crate::format::{
    ChunkFormatKind, ColumnarGzip, JSON_EXTENSION, PARQUET_EXTENSION, ParquetGzip, read_chunk,
    read_history,
};
pub use crate::logger::{LoggerStats, SampledLogger, SampledLoggerBuilder};
pub use crate::sample::{SamplingPolicy, TARGET_LIVE_CALLS};

pub mod buffer;
pub mod chunk;
pub mod config;
pub mod finalize;
pub mod format;
mod logger;
pub(crate) mod rate_limit;
pub mod sample;
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;

#[doc(hidden)]
pub use sampled_log_core as core;
