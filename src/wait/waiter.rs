//! Hybrid Wait Algorithm
//!
//! A wait of `d` microseconds runs in two phases:
//!
//! 1. **Coarse**: if `d` exceeds the threshold (10 ms), sleep for
//!    `(d - margin) / 1000` whole milliseconds in one shot. The margin
//!    (1 ms) absorbs the sleep primitive's own overshoot.
//! 2. **Fine**: poll the monotonic clock with a spin hint until the end
//!    point is reached.
//!
//! The fine phase only corrects undershoot. An anomalously long coarse sleep
//! is not compensated.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::time::clock::{ClockSource, TimePoint};
use crate::time::resolution::{HighResolutionGuard, DEFAULT_PERIOD_MS};
use crate::wait::result::WaitResult;

/// Requests at or below this length skip the coarse phase (microseconds)
pub const DEFAULT_COARSE_THRESHOLD_US: i64 = 10_000;

/// Amount deliberately left unslept at the end of the coarse phase (microseconds)
pub const DEFAULT_SAFETY_MARGIN_US: i64 = 1_000;

/// Upper bound accepted for the requested timer period (ms)
pub const MAX_TIMER_PERIOD_MS: u32 = 1_000;

/// Tuning for the hybrid wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Coarse phase runs only for requests strictly longer than this
    pub coarse_threshold_us: i64,
    /// Under-sleep margin handed to the busy-poll phase
    pub safety_margin_us: i64,
    /// Timer period requested from the host scheduler (ms)
    pub timer_period_ms: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            coarse_threshold_us: DEFAULT_COARSE_THRESHOLD_US,
            safety_margin_us: DEFAULT_SAFETY_MARGIN_US,
            timer_period_ms: DEFAULT_PERIOD_MS,
        }
    }
}

impl WaitConfig {
    /// Validate values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.coarse_threshold_us < 0 {
            return Err(crate::Error::Config(format!(
                "coarse_threshold_us must be >= 0, got {}", self.coarse_threshold_us
            )));
        }
        // A negative margin would sleep past the requested end
        if self.safety_margin_us < 0 {
            return Err(crate::Error::Config(format!(
                "safety_margin_us must be >= 0, got {}", self.safety_margin_us
            )));
        }
        if self.timer_period_ms == 0 || self.timer_period_ms > MAX_TIMER_PERIOD_MS {
            return Err(crate::Error::Config(format!(
                "timer_period_ms must be in [1, {}], got {}",
                MAX_TIMER_PERIOD_MS, self.timer_period_ms
            )));
        }
        Ok(())
    }
}

/// Length of the coarse sleep for a request, in whole milliseconds.
///
/// `None` when the request is at or below the threshold, or when nothing is
/// left to sleep once the margin is taken off.
pub fn coarse_sleep_millis(duration_us: i64, config: &WaitConfig) -> Option<u64> {
    if duration_us <= config.coarse_threshold_us {
        return None;
    }
    let millis = duration_us.saturating_sub(config.safety_margin_us) / 1_000;
    (millis > 0).then_some(millis as u64)
}

/// Blocks the calling thread for precise durations.
///
/// Construction initializes the clock source and requests a finer scheduler
/// tick; the request is released when the waiter is dropped. Like its
/// resolution guard, a waiter stays on the thread that created it.
#[derive(Debug)]
pub struct PrecisionWaiter {
    clock: ClockSource,
    config: WaitConfig,
    resolution: HighResolutionGuard,
}

impl PrecisionWaiter {
    /// Create a waiter with the default thresholds.
    pub fn new() -> crate::Result<Self> {
        Self::with_config(WaitConfig::default())
    }

    /// Create a waiter with custom thresholds.
    ///
    /// Fails if `config` is out of range or the host has no usable
    /// high-resolution counter.
    pub fn with_config(config: WaitConfig) -> crate::Result<Self> {
        config.validate()?;
        let clock = ClockSource::init()?;
        let resolution = HighResolutionGuard::begin(config.timer_period_ms);
        debug!(
            ticks_per_second = clock.ticks_per_second(),
            coarse_threshold_us = config.coarse_threshold_us,
            safety_margin_us = config.safety_margin_us,
            resolution_active = resolution.is_active(),
            "precision waiter ready"
        );
        Ok(Self {
            clock,
            config,
            resolution,
        })
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    pub fn clock(&self) -> ClockSource {
        self.clock
    }

    /// Whether the host accepted the finer timer request.
    pub fn resolution_active(&self) -> bool {
        self.resolution.is_active()
    }

    /// Current time on the waiter's monotonic clock.
    #[inline]
    pub fn now(&self) -> TimePoint {
        self.clock.now()
    }

    /// Block until at least `duration_us` microseconds have elapsed.
    ///
    /// Zero or negative durations return immediately.
    pub fn wait_for(&self, duration_us: i64) {
        let start = self.now();
        let end = start.saturating_add_micros(duration_us);

        if let Some(millis) = coarse_sleep_millis(duration_us, &self.config) {
            debug!(duration_us, sleep_ms = millis, "coarse sleep");
            std::thread::sleep(Duration::from_millis(millis));
        }

        while self.now() < end {
            std::hint::spin_loop();
        }
    }

    /// Block until `target` on this waiter's clock. Returns immediately if
    /// the target has already passed.
    pub fn wait_until(&self, target: TimePoint) {
        let remaining = target - self.now();
        if remaining > 0 {
            self.wait_for(remaining);
        }
    }

    /// [`wait_for`](Self::wait_for) bracketed by clock reads.
    pub fn measure(&self, requested_us: i64) -> WaitResult {
        let start = self.now();
        self.wait_for(requested_us);
        let end = self.now();
        WaitResult::new(requested_us, end - start)
    }

    /// [`wait_until`](Self::wait_until) bracketed by clock reads. The
    /// requested duration is the time left to `target` at the start, or
    /// zero if it has already passed.
    pub fn measure_until(&self, target: TimePoint) -> WaitResult {
        let start = self.now();
        let requested = (target - start).max(0);
        self.wait_until(target);
        let end = self.now();
        WaitResult::new(requested, end - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WaitConfig::default();
        assert_eq!(config.coarse_threshold_us, 10_000);
        assert_eq!(config.safety_margin_us, 1_000);
        assert_eq!(config.timer_period_ms, 1);
    }

    #[test]
    fn test_coarse_sleep_skipped_at_or_below_threshold() {
        let config = WaitConfig::default();
        assert_eq!(coarse_sleep_millis(-5, &config), None);
        assert_eq!(coarse_sleep_millis(0, &config), None);
        assert_eq!(coarse_sleep_millis(1_000, &config), None);
        assert_eq!(coarse_sleep_millis(10_000, &config), None);
    }

    #[test]
    fn test_coarse_sleep_leaves_margin() {
        let config = WaitConfig::default();
        assert_eq!(coarse_sleep_millis(10_001, &config), Some(9));
        assert_eq!(coarse_sleep_millis(20_000, &config), Some(19));
        assert_eq!(coarse_sleep_millis(100_000, &config), Some(99));
        assert_eq!(coarse_sleep_millis(20_999, &config), Some(19));
    }

    #[test]
    fn test_coarse_sleep_single_shot_for_huge_requests() {
        let config = WaitConfig::default();
        let millis = coarse_sleep_millis(i64::MAX, &config).unwrap();
        assert_eq!(millis, ((i64::MAX - 1_000) / 1_000) as u64);
    }

    #[test]
    fn test_coarse_sleep_custom_config() {
        let config = WaitConfig {
            coarse_threshold_us: 2_000,
            safety_margin_us: 500,
            timer_period_ms: 1,
        };
        assert_eq!(coarse_sleep_millis(2_000, &config), None);
        assert_eq!(coarse_sleep_millis(3_000, &config), Some(2));

        // Margin larger than the request leaves nothing to sleep
        let greedy = WaitConfig {
            coarse_threshold_us: 0,
            safety_margin_us: 5_000,
            timer_period_ms: 1,
        };
        assert_eq!(coarse_sleep_millis(4_000, &greedy), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(WaitConfig::default().validate().is_ok());

        let bad = [
            WaitConfig { coarse_threshold_us: -1, ..WaitConfig::default() },
            WaitConfig { safety_margin_us: -1_000, ..WaitConfig::default() },
            WaitConfig { timer_period_ms: 0, ..WaitConfig::default() },
            WaitConfig { timer_period_ms: MAX_TIMER_PERIOD_MS + 1, ..WaitConfig::default() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(crate::Error::Config(_))),
                "accepted: {:?}",
                config
            );
        }
    }

    #[test]
    fn test_waiter_rejects_negative_margin() {
        let config = WaitConfig {
            safety_margin_us: -50_000,
            ..WaitConfig::default()
        };
        let err = PrecisionWaiter::with_config(config).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_zero_and_negative_return_immediately() {
        let waiter = PrecisionWaiter::new().unwrap();

        for d in [0, -5, i64::MIN] {
            let start = waiter.now();
            waiter.wait_for(d);
            let elapsed = waiter.now() - start;
            assert!(elapsed < 5_000, "wait_for({}) took {} us", d, elapsed);
        }
    }

    #[test]
    fn test_never_returns_early() {
        let waiter = PrecisionWaiter::new().unwrap();

        for d in [1, 100, 1_000, 5_000, 10_000, 20_000] {
            let start = waiter.now();
            waiter.wait_for(d);
            let elapsed = waiter.now() - start;
            assert!(elapsed >= d, "wait_for({}) returned after {} us", d, elapsed);
        }
    }

    #[test]
    fn test_measure_reports_error() {
        let waiter = PrecisionWaiter::new().unwrap();
        let result = waiter.measure(2_000);

        assert_eq!(result.requested_us, 2_000);
        assert!(result.actual_us >= 2_000);
        assert_eq!(result.error_us, result.actual_us - result.requested_us);
        assert!(!result.is_early());
    }

    #[test]
    fn test_wait_until_future() {
        let waiter = PrecisionWaiter::new().unwrap();
        let start = waiter.now();
        let target = start.saturating_add_micros(3_000);

        waiter.wait_until(target);

        assert!(waiter.now() >= target);
        assert!(waiter.now() - start >= 3_000);
    }

    #[test]
    fn test_wait_until_past_returns_immediately() {
        let waiter = PrecisionWaiter::new().unwrap();
        let past = waiter.now().saturating_add_micros(-1_000_000);

        let start = waiter.now();
        waiter.wait_until(past);
        assert!(waiter.now() - start < 5_000);

        let result = waiter.measure_until(past);
        assert_eq!(result.requested_us, 0);
    }

    #[test]
    fn test_measure_until_matches_wait_for() {
        let waiter = PrecisionWaiter::new().unwrap();
        let target = waiter.now().saturating_add_micros(12_000);

        let result = waiter.measure_until(target);

        assert!(result.requested_us <= 12_000);
        assert!(result.actual_us >= result.requested_us);
    }

    #[test]
    fn test_waiter_exposes_clock() {
        let waiter = PrecisionWaiter::new().unwrap();
        assert_eq!(waiter.clock(), ClockSource::init().unwrap());
        assert_eq!(waiter.config(), &WaitConfig::default());
    }

    #[cfg(any(windows, target_os = "linux", target_os = "android"))]
    #[test]
    fn test_waiter_holds_resolution_request() {
        let waiter = PrecisionWaiter::new().unwrap();
        assert!(waiter.resolution_active());
    }

    #[test]
    #[ignore = "timing-sensitive; run on an unloaded host"]
    fn test_overshoot_is_bounded() {
        let waiter = PrecisionWaiter::new().unwrap();

        for d in [1_000, 5_000, 20_000, 100_000] {
            let result = waiter.measure(d);
            assert!(result.error_us >= 0, "{:?}", result);
            assert!(result.error_us < 500, "overshoot too large: {:?}", result);
        }
    }
}
