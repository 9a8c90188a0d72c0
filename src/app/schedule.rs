//! Wall-Clock Targets
//!
//! Maps a local time of day onto the monotonic clock so `--at` can go
//! through `wait_until`. The wall clock is read once; later adjustments to
//! it do not move the target.

use chrono::{DateTime, NaiveTime, TimeZone};

use crate::time::clock::TimePoint;

/// Signed microseconds from `now` until `target` on the same calendar day.
/// Negative once the target has passed.
pub fn micros_until<Tz: TimeZone>(target: NaiveTime, now: &DateTime<Tz>) -> i64 {
    let delta = now.date_naive().and_time(target) - now.naive_local();
    // Bounded by one day, so this always fits
    delta.num_microseconds().unwrap_or_default()
}

/// Monotonic time point corresponding to `target`, given simultaneous
/// wall-clock and monotonic readings.
pub fn monotonic_target<Tz: TimeZone>(
    target: NaiveTime,
    now_wall: &DateTime<Tz>,
    now_mono: TimePoint,
) -> TimePoint {
    now_mono.saturating_add_micros(micros_until(target, now_wall))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_future_target() {
        let target = NaiveTime::from_hms_milli_opt(12, 0, 1, 500).unwrap();
        assert_eq!(micros_until(target, &noon()), 1_500_000);
    }

    #[test]
    fn test_past_target_is_negative() {
        let target = NaiveTime::from_hms_opt(11, 59, 59).unwrap();
        assert_eq!(micros_until(target, &noon()), -1_000_000);
    }

    #[test]
    fn test_target_is_same_day() {
        // No rollover to tomorrow
        let target = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(micros_until(target, &noon()), -12 * 3_600 * 1_000_000);
    }

    #[test]
    fn test_monotonic_target_offsets_reading() {
        let target = NaiveTime::from_hms_milli_opt(12, 0, 0, 20).unwrap();
        let mono = TimePoint::from_micros(5_000_000);
        assert_eq!(
            monotonic_target(target, &noon(), mono),
            TimePoint::from_micros(5_020_000)
        );
    }
}
