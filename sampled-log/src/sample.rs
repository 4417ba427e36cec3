// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains [SamplingPolicy], which decides for each record whether a copy is sent to the live
//! monitoring backend.
//!
//! The policy forwards a fixed fraction of records at random. The fraction is either given
//! directly, or derived from the number of steps the job expects to log so that the whole job
//! makes about [TARGET_LIVE_CALLS] live calls.
//!
//! Sampling never affects persistence: every record is buffered and written to the history
//! whether or not it was forwarded.

use std::marker::PhantomData;

use rand::{Rng, RngCore, rngs::ThreadRng};
use sampled_log_core::ConfigError;

/// The number of live-forwarded records a job should make over its whole expected run.
pub const TARGET_LIVE_CALLS: u64 = 100_000;

/// The live-forward rate for a job that expects to log `expected_steps` records:
/// `min(1, TARGET_LIVE_CALLS / expected_steps)`.
///
/// Small jobs forward every record. Zero expected steps is treated the same way.
///
/// ```
/// # use sampled_log::sample::rate_for_expected_steps;
/// assert_eq!(rate_for_expected_steps(1_000_000), 0.1);
/// assert_eq!(rate_for_expected_steps(5_000), 1.0);
/// assert_eq!(rate_for_expected_steps(0), 1.0);
/// ```
pub fn rate_for_expected_steps(expected_steps: u64) -> f64 {
    if expected_steps == 0 {
        return 1.0;
    }
    (TARGET_LIVE_CALLS as f64 / expected_steps as f64).min(1.0)
}

/// Utility wrapper to impl [`RngCore`] from a stateless random number generator that impls [`Default`], like
/// [`ThreadRng`].
#[derive(Default)]
// PhantomData of fn() -> R keeps DefaultRng Send + Sync even though ThreadRng isn't. We only ever create
// and drop a temporary R.
pub struct DefaultRng<R>(PhantomData<fn() -> R>);

impl<R> std::fmt::Debug for DefaultRng<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DefaultRng")
    }
}

impl<R: RngCore + Default> RngCore for DefaultRng<R> {
    fn next_u32(&mut self) -> u32 {
        R::default().next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        R::default().next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        R::default().fill_bytes(dest)
    }
}

/// Forwards a fixed fraction of records at random.
///
/// Every call to [`SamplingPolicy::should_forward`] is an independent draw.
#[derive(Debug)]
pub struct SamplingPolicy<R = DefaultRng<ThreadRng>> {
    rate: f64,
    rng: R,
}

impl SamplingPolicy {
    /// Create a policy that forwards records with probability `rate`, using the thread-local RNG.
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        Self::with_rng(rate, DefaultRng::default())
    }

    /// Create a policy for a job expecting `expected_steps` records. See [rate_for_expected_steps].
    pub fn for_expected_steps(expected_steps: u64) -> Self {
        Self::for_expected_steps_with_rng(expected_steps, DefaultRng::default())
    }
}

impl<R> SamplingPolicy<R> {
    /// Like [`SamplingPolicy::new`], but also specify the random number generator.
    pub fn with_rng(rate: f64, rng: R) -> Result<Self, ConfigError> {
        if !(rate.is_finite() && (0.0..=1.0).contains(&rate)) {
            return Err(ConfigError::invalid(format!(
                "live rate must be between 0 and 1, got {rate}"
            )));
        }
        Ok(Self { rate, rng })
    }

    /// Like [`SamplingPolicy::for_expected_steps`], but also specify the random number generator.
    pub fn for_expected_steps_with_rng(expected_steps: u64, rng: R) -> Self {
        Self {
            rate: rate_for_expected_steps(expected_steps),
            rng,
        }
    }

    /// The probability that a record is forwarded
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl<R: RngCore> SamplingPolicy<R> {
    /// Draw a uniform value in `[0, 1)` and return whether it is below the rate.
    pub fn should_forward(&mut self) -> bool {
        self.rng.random::<f64>() < self.rate
    }
}
