// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Time sources for the `_timestamp` and `_runtime` columns.
//!
//! The logger reads wall-clock time through a [`Clock`], which is the system clock unless a
//! [`Time`] implementation is installed. Tests use the fakes in [`fakes`] so that stamps are
//! deterministic.

use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Trait for providing custom time sources
pub trait Time: Send + Sync + Debug {
    /// Get the current system time
    fn now(&self) -> SystemTime;

    /// Get the current instant
    fn instant(&self) -> Instant;
}

/// The clock a logger stamps records with.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Use the system clock
    #[default]
    System,
    /// Use a custom time source
    Custom(Arc<dyn Time>),
}

impl Clock {
    /// Create a clock backed by a custom time source
    pub fn custom(time: impl Time + 'static) -> Self {
        Self::Custom(Arc::new(time))
    }

    /// The current wall-clock time
    pub fn system_time(&self) -> SystemTime {
        match self {
            Self::System => SystemTime::now(),
            Self::Custom(time) => time.now(),
        }
    }

    /// The current monotonic instant
    pub fn instant(&self) -> Instant {
        match self {
            Self::System => Instant::now(),
            Self::Custom(time) => time.instant(),
        }
    }

    /// The current wall-clock time as fractional seconds since the UNIX epoch
    pub fn unix_seconds(&self) -> f64 {
        unix_seconds(self.system_time())
    }
}

/// Convert `time` to fractional seconds since the UNIX epoch. Times before the epoch are negative.
pub fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(err) => -err.duration().as_secs_f64(),
    }
}

/// Fractional seconds between `start` and `now`, zero if `now` is earlier.
pub fn elapsed_seconds(start: Instant, now: Instant) -> f64 {
    now.checked_duration_since(start)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// Fake time sources for testing
///
/// To use this module outside of this crate's tests, enable the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod fakes {
    use std::{
        sync::{Arc, Mutex, PoisonError},
        time::{Duration, Instant, SystemTime},
    };

    use super::Time;

    /// A time source that always returns the same time
    #[derive(Debug, Clone, Copy)]
    pub struct StaticClock {
        now: SystemTime,
        now_instant: Instant,
    }

    impl StaticClock {
        /// Create a new StaticClock that always returns `time`
        ///
        /// ```
        /// use sampled_log_core::{Clock, time::fakes::StaticClock};
        /// use std::time::UNIX_EPOCH;
        ///
        /// let clock = Clock::custom(StaticClock::at_time(UNIX_EPOCH));
        /// assert_eq!(clock.unix_seconds(), 0.0);
        /// ```
        pub fn at_time(time: impl Into<SystemTime>) -> Self {
            Self {
                now: time.into(),
                now_instant: Instant::now(),
            }
        }
    }

    impl Time for StaticClock {
        fn now(&self) -> SystemTime {
            self.now
        }

        fn instant(&self) -> Instant {
            self.now_instant
        }
    }

    /// A time source loaded with one time that can be cloned and advanced through any of its
    /// clones.
    ///
    /// ```
    /// use sampled_log_core::{Clock, time::fakes::ManualClock};
    /// use std::time::{Duration, UNIX_EPOCH};
    ///
    /// let manual = ManualClock::at_time(UNIX_EPOCH);
    /// let clock = Clock::custom(manual.clone());
    /// let start = clock.instant();
    ///
    /// manual.advance(Duration::from_millis(1500));
    /// assert_eq!(clock.unix_seconds(), 1.5);
    /// assert_eq!(clock.instant() - start, Duration::from_millis(1500));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock(Arc<Mutex<StaticClock>>);

    impl ManualClock {
        /// Create a new ManualClock started at `time`
        pub fn at_time(time: impl Into<SystemTime>) -> Self {
            Self(Arc::new(Mutex::new(StaticClock::at_time(time))))
        }

        /// Move both the wall-clock time and the instant forward by `duration`
        pub fn advance(&self, duration: Duration) {
            let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            guard.now += duration;
            guard.now_instant += duration;
        }

        /// Replace the wall-clock time without touching the instant
        pub fn update_time(&self, time: impl Into<SystemTime>) {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).now = time.into();
        }
    }

    impl Time for ManualClock {
        fn now(&self) -> SystemTime {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).now
        }

        fn instant(&self) -> Instant {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .now_instant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fakes::ManualClock, *};

    #[test]
    fn unix_seconds_handles_times_before_the_epoch() {
        assert_eq!(unix_seconds(UNIX_EPOCH + Duration::from_millis(2500)), 2.5);
        assert_eq!(unix_seconds(UNIX_EPOCH - Duration::from_secs(1)), -1.0);
    }

    #[test]
    fn elapsed_never_goes_negative() {
        let start = Instant::now();
        let later = start + Duration::from_secs(2);
        assert_eq!(elapsed_seconds(start, later), 2.0);
        assert_eq!(elapsed_seconds(later, start), 0.0);
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let manual = ManualClock::at_time(UNIX_EPOCH + Duration::from_secs(10));
        let clock = Clock::custom(manual.clone());
        manual.advance(Duration::from_secs(5));
        assert_eq!(clock.unix_seconds(), 15.0);
        manual.update_time(UNIX_EPOCH);
        assert_eq!(clock.unix_seconds(), 0.0);
    }

    #[test]
    fn system_clock_is_after_the_epoch() {
        assert!(Clock::System.unix_seconds() > 0.0);
    }
}
