// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

/// Throttles a warning about a condition that can repeat on every logged record, such as a failing
/// live backend.
///
/// The first occurrence is reported, then at most one per `interval` while the problem persists.
/// Each report carries the number of occurrences that were swallowed since the previous one, so
/// nothing disappears silently.
#[derive(Debug)]
pub(crate) struct RateLimit {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl RateLimit {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// Registers one occurrence at `now`.
    ///
    /// Returns `Some(suppressed)` if this occurrence should be reported, with the number of
    /// occurrences suppressed since the last report, or `None` if it should be swallowed.
    pub(crate) fn allow(&mut self, now: Instant) -> Option<u64> {
        let due = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            self.suppressed += 1;
            return None;
        }
        self.last = Some(now);
        Some(std::mem::take(&mut self.suppressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_is_reported_and_repeats_are_counted() {
        let start = Instant::now();
        let mut limit = RateLimit::new(Duration::from_secs(10));

        assert_eq!(limit.allow(start), Some(0));
        for second in 1..10 {
            assert_eq!(limit.allow(start + Duration::from_secs(second)), None);
        }
        assert_eq!(limit.allow(start + Duration::from_secs(10)), Some(9));
        assert_eq!(limit.allow(start + Duration::from_secs(11)), None);
        assert_eq!(limit.allow(start + Duration::from_secs(25)), Some(1));
    }

    #[test]
    fn quiet_periods_reset_the_count() {
        let start = Instant::now();
        let mut limit = RateLimit::new(Duration::from_secs(1));
        assert_eq!(limit.allow(start), Some(0));
        assert_eq!(limit.allow(start + Duration::from_secs(60)), Some(0));
    }

    #[test]
    fn unbounded_interval_reports_once() {
        let start = Instant::now();
        let mut limit = RateLimit::new(Duration::MAX);
        assert_eq!(limit.allow(start), Some(0));
        for second in 0..100 {
            assert_eq!(limit.allow(start + Duration::from_secs(second)), None);
        }
    }

    #[test]
    fn clock_going_backwards_is_suppressed() {
        let start = Instant::now() + Duration::from_secs(60);
        let mut limit = RateLimit::new(Duration::from_secs(10));
        assert_eq!(limit.allow(start), Some(0));
        assert_eq!(limit.allow(start - Duration::from_secs(30)), None);
    }
}
