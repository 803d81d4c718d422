// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cooperative wall-clock enforcement for template evaluation.
//!
//! Untrusted template text runs under a time budget. The evaluator calls
//! [`ExecutionTimer::tick`] once per unit of work; the timer amortizes clock
//! reads by only checking the deadline every `check_interval` units, carrying
//! any remainder so callers never lose fractional work.

use core::num::NonZeroU32;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Reported when the execution timer observes elapsed time beyond the
/// configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("execution exceeded time limit (elapsed={elapsed:?}, limit={limit:?})")]
    TimeLimitExceeded {
        /// Elapsed work duration when the threshold was exceeded.
        elapsed: Duration,
        /// Configured time limit.
        limit: Duration,
    },
}

/// Configuration for the cooperative execution time limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionTimerConfig {
    /// Maximum allowed wall-clock duration.
    pub limit: Duration,
    /// Number of work units between time checks (minimum 1).
    pub check_interval: NonZeroU32,
}

impl ExecutionTimerConfig {
    pub const DEFAULT_CHECK_INTERVAL: u32 = 32;

    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            check_interval: NonZeroU32::new(Self::DEFAULT_CHECK_INTERVAL)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// Cooperative time-limit tracker threaded through evaluation loops.
///
/// A timer without configuration never fails; a timer that was never started
/// ignores ticks.
#[derive(Debug)]
pub struct ExecutionTimer {
    config: Option<ExecutionTimerConfig>,
    start: Option<Instant>,
    accumulated_units: u32,
    last_elapsed: Duration,
}

impl ExecutionTimer {
    pub const fn new(config: Option<ExecutionTimerConfig>) -> Self {
        Self {
            config,
            start: None,
            accumulated_units: 0,
            last_elapsed: Duration::ZERO,
        }
    }

    /// Reset any prior state and record the start instant.
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
        self.accumulated_units = 0;
        self.last_elapsed = Duration::ZERO;
    }

    pub const fn config(&self) -> Option<ExecutionTimerConfig> {
        self.config
    }

    pub const fn last_elapsed(&self) -> Duration {
        self.last_elapsed
    }

    /// Increment work units and run the periodic limit check when necessary.
    pub fn tick(&mut self, work_units: u32) -> Result<(), LimitError> {
        let Some(config) = self.config else {
            return Ok(());
        };
        self.accumulated_units = self.accumulated_units.saturating_add(work_units);
        if self.accumulated_units < config.check_interval.get() {
            return Ok(());
        }

        // Preserve the remainder so that callers do not lose fractional work.
        self.accumulated_units %= config.check_interval.get();
        self.check_now()
    }

    /// Force an immediate check against the configured deadline.
    pub fn check_now(&mut self) -> Result<(), LimitError> {
        let Some(config) = self.config else {
            return Ok(());
        };
        let Some(start) = self.start else {
            return Ok(());
        };

        let elapsed = start.elapsed();
        self.last_elapsed = elapsed;
        if elapsed > config.limit {
            return Err(LimitError::TimeLimitExceeded {
                elapsed,
                limit: config.limit,
            });
        }
        Ok(())
    }

    /// Elapsed time relative to the recorded start, if started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.start.map(|s| s.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
    }

    #[test]
    fn tick_defers_checks_until_interval_is_reached() {
        let mut timer = ExecutionTimer::new(Some(ExecutionTimerConfig {
            limit: Duration::from_nanos(1),
            check_interval: nz(1000),
        }));
        timer.start();
        std::thread::sleep(Duration::from_millis(2));

        for _ in 0..999 {
            assert_eq!(timer.tick(1), Ok(()), "tick below interval must succeed");
        }
        assert!(
            timer.tick(1).is_err(),
            "tick at interval boundary must observe the breach"
        );
    }

    #[test]
    fn check_now_reports_limit_exceeded() {
        let mut timer = ExecutionTimer::new(Some(ExecutionTimerConfig {
            limit: Duration::from_nanos(1),
            check_interval: nz(1),
        }));
        timer.start();
        std::thread::sleep(Duration::from_millis(2));

        let result = timer.check_now();
        assert!(matches!(
            result,
            Err(LimitError::TimeLimitExceeded { .. })
        ));
        if let Err(LimitError::TimeLimitExceeded { elapsed, limit }) = result {
            assert!(elapsed > limit);
            assert_eq!(limit, Duration::from_nanos(1));
        }
    }

    #[test]
    fn tick_before_start_is_noop() {
        let mut timer = ExecutionTimer::new(Some(ExecutionTimerConfig::new(Duration::ZERO)));
        assert_eq!(timer.tick(1), Ok(()), "tick before start should be ignored");
        assert!(timer.elapsed().is_none());
    }

    #[test]
    fn tick_is_noop_when_limit_disabled() {
        let mut timer = ExecutionTimer::new(None);
        timer.start();
        for _ in 0..128 {
            assert_eq!(timer.tick(1), Ok(()));
        }
        assert_eq!(timer.last_elapsed(), Duration::ZERO);
    }

    #[test]
    fn generous_limit_allows_completion() {
        let mut timer = ExecutionTimer::new(Some(ExecutionTimerConfig::new(
            Duration::from_secs(60),
        )));
        timer.start();
        for _ in 0..1000 {
            assert_eq!(timer.tick(1), Ok(()));
        }
    }
}
