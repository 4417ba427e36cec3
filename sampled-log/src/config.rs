// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logger settings.
//!
//! The preferred setting is the number of steps the job expects to log, from which the live rate
//! and the chunk size are derived. Either can also be set explicitly, which overrides the derived
//! value. [LoggerConfig] accepts the same settings from a configuration file, including the legacy
//! key names `wandb_log_rate` and `history_chunk_size`, plus the chunk format and write retries.
//! Out-of-range values are rejected with a [ConfigError] rather than adjusted.
//!
//! ```
//! # use sampled_log::LoggerConfig;
//! let config: LoggerConfig = serde_json::from_str(r#"{"wandb_log_rate": 0.5, "history_chunk_size": 1000}"#).unwrap();
//! let parameters = config.parameters().unwrap();
//! assert_eq!(parameters.live_rate, 0.5);
//! assert_eq!(parameters.chunk_size, 1000);
//!
//! let config: LoggerConfig = serde_json::from_str(r#"{"expected_steps": 10, "gzip_level": 12}"#).unwrap();
//! assert!(config.builder().is_err());
//! ```

use std::time::Duration;

use sampled_log_core::ConfigError;
use serde::Deserialize;

use crate::{
    SampledLogger, SampledLoggerBuilder, buffer::chunk_size_for_expected_steps, chunk::RetryConfig,
    format::{ChunkFormatKind, ColumnarGzip, ParquetGzip},
    sample::rate_for_expected_steps,
};

/// The sampling and chunking parameters a logger runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// Probability that a record is forwarded to the live backend
    pub live_rate: f64,
    /// Number of records per chunk file
    pub chunk_size: usize,
}

impl Parameters {
    /// Derive both parameters from the number of steps the job expects to log.
    ///
    /// ```
    /// # use sampled_log::Parameters;
    /// let parameters = Parameters::for_expected_steps(1_000_000);
    /// assert_eq!(parameters.live_rate, 0.1);
    /// assert_eq!(parameters.chunk_size, 100_000);
    /// ```
    pub fn for_expected_steps(expected_steps: u64) -> Self {
        Self {
            live_rate: rate_for_expected_steps(expected_steps),
            chunk_size: chunk_size_for_expected_steps(expected_steps),
        }
    }

    /// Combine the derived and the explicit settings. Explicit settings win.
    ///
    /// Fails if a parameter is neither given nor derivable, or out of range.
    pub fn resolve(
        expected_steps: Option<u64>,
        live_rate: Option<f64>,
        chunk_size: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let derived = expected_steps.map(Self::for_expected_steps);
        let live_rate = live_rate
            .or(derived.map(|d| d.live_rate))
            .ok_or_else(|| ConfigError::invalid("either expected_steps or live_rate is required"))?;
        let chunk_size = chunk_size
            .or(derived.map(|d| d.chunk_size))
            .ok_or_else(|| {
                ConfigError::invalid("either expected_steps or chunk_size is required")
            })?;

        if !(live_rate.is_finite() && (0.0..=1.0).contains(&live_rate)) {
            return Err(ConfigError::invalid(format!(
                "live rate must be between 0 and 1, got {live_rate}"
            )));
        }
        if chunk_size == 0 {
            return Err(ConfigError::invalid("chunk size must be at least 1"));
        }
        Ok(Self {
            live_rate,
            chunk_size,
        })
    }
}

/// Logger settings as read from a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// Approximate number of records the job will log
    #[serde(default)]
    pub expected_steps: Option<u64>,
    /// Explicit live-forward rate
    #[serde(default, alias = "wandb_log_rate")]
    pub live_rate: Option<f64>,
    /// Explicit number of records per chunk file
    #[serde(default, alias = "history_chunk_size")]
    pub chunk_size: Option<usize>,
    /// Maximum attempts per chunk write, see [RetryConfig::max_attempts]
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    /// Wait before the first retry of a chunk write, in milliseconds
    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,
    /// Chunk file format, `parquet` (the default) or `json`
    #[serde(default)]
    pub format: Option<ChunkFormatKind>,
    /// Gzip level of the chunk files, 0 to 9
    #[serde(default)]
    pub gzip_level: Option<u32>,
}

impl LoggerConfig {
    /// The sampling and chunking parameters. See [Parameters::resolve].
    pub fn parameters(&self) -> Result<Parameters, ConfigError> {
        Parameters::resolve(self.expected_steps, self.live_rate, self.chunk_size)
    }

    /// The chunk write retry settings, starting from [RetryConfig::default].
    ///
    /// Fails if `retry_attempts` is 0.
    pub fn retry(&self) -> Result<RetryConfig, ConfigError> {
        let mut retry = RetryConfig::default();
        if let Some(attempts) = self.retry_attempts {
            retry.max_attempts = attempts;
        }
        if let Some(backoff) = self.retry_backoff_ms {
            retry.initial_backoff = Duration::from_millis(backoff);
        }
        retry.validate()?;
        Ok(retry)
    }

    /// A logger builder with these settings applied.
    ///
    /// Fails if the retry settings or the gzip level are out of range. The sampling and chunking
    /// parameters are checked when the logger is built.
    pub fn builder(&self) -> Result<SampledLoggerBuilder, ConfigError> {
        let mut builder = SampledLogger::builder().retry(self.retry()?);
        if let Some(expected_steps) = self.expected_steps {
            builder = builder.expected_steps(expected_steps);
        }
        if let Some(live_rate) = self.live_rate {
            builder = builder.live_rate(live_rate);
        }
        if let Some(chunk_size) = self.chunk_size {
            builder = builder.chunk_size(chunk_size);
        }
        builder = match (self.format.unwrap_or_default(), self.gzip_level) {
            (ChunkFormatKind::Parquet, None) => builder.format(ParquetGzip::new()),
            (ChunkFormatKind::Parquet, Some(level)) => {
                builder.format(ParquetGzip::new().with_level(level)?)
            }
            (ChunkFormatKind::Json, None) => builder.format(ColumnarGzip::new()),
            (ChunkFormatKind::Json, Some(level)) => {
                builder.format(ColumnarGzip::new().with_level(level)?)
            }
        };
        Ok(builder)
    }
}
