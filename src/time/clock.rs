//! Monotonic Clock Source
//!
//! Reads the host's high-resolution counter and converts raw ticks to
//! microseconds. The counter frequency is queried once per process and
//! cached; every later read is a single counter query plus one division.

use std::num::NonZeroU64;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;

const MICROS_PER_SEC: u128 = 1_000_000;

/// Counter frequency, captured once per process
static TICKS_PER_SECOND: OnceLock<NonZeroU64> = OnceLock::new();

/// Handle to the host's monotonic high-resolution counter.
///
/// Cheap to copy. All handles in a process share the same frequency, which
/// never changes after the first successful [`ClockSource::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSource {
    ticks_per_second: NonZeroU64,
}

impl ClockSource {
    /// Initialize the clock source.
    ///
    /// The first call queries the host counter frequency; later calls reuse
    /// the cached value. Fails if the host reports no usable counter or a
    /// zero frequency, since every microsecond conversion divides by it.
    pub fn init() -> crate::Result<Self> {
        if let Some(&ticks_per_second) = TICKS_PER_SECOND.get() {
            return Ok(Self { ticks_per_second });
        }

        let queried = checked_frequency(host::frequency()?)?;
        let ticks_per_second = *TICKS_PER_SECOND.get_or_init(|| queried);
        debug!(
            ticks_per_second = ticks_per_second.get(),
            "clock source initialized"
        );
        Ok(Self { ticks_per_second })
    }

    /// Counter frequency in ticks per second.
    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second.get()
    }

    /// Raw counter value. This is the hot-path read.
    #[inline(always)]
    pub fn now_ticks(&self) -> u64 {
        host::now_ticks()
    }

    /// Convert raw counter ticks to microseconds.
    #[inline]
    pub fn ticks_to_micros(&self, ticks: u64) -> i64 {
        ticks_to_micros(ticks, self.ticks_per_second)
    }

    /// Current time on the monotonic clock.
    #[inline]
    pub fn now(&self) -> TimePoint {
        TimePoint::from_micros(self.ticks_to_micros(self.now_ticks()))
    }
}

/// Reject a zero frequency reported by the host.
pub fn checked_frequency(raw: u64) -> crate::Result<NonZeroU64> {
    NonZeroU64::new(raw).ok_or_else(|| {
        Error::ClockUnavailable("host reported a zero counter frequency".to_string())
    })
}

/// `ticks * 1_000_000 / ticks_per_second`, multiplied in 128 bits so large
/// tick counts keep full precision. Saturates at `i64::MAX`.
#[inline]
pub fn ticks_to_micros(ticks: u64, ticks_per_second: NonZeroU64) -> i64 {
    let micros = (ticks as u128 * MICROS_PER_SEC) / ticks_per_second.get() as u128;
    i64::try_from(micros).unwrap_or(i64::MAX)
}

/// Microseconds since an arbitrary, process-specific monotonic epoch.
///
/// Only ordering and differences between two points are meaningful; the
/// absolute value means nothing across processes or reboots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimePoint(i64);

impl TimePoint {
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    #[inline]
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Shift by a signed number of microseconds, saturating at the ends.
    #[inline]
    pub fn saturating_add_micros(self, micros: i64) -> Self {
        Self(self.0.saturating_add(micros))
    }

    /// Signed microseconds from `earlier` to `self`. Negative if `earlier`
    /// is actually later.
    #[inline]
    pub fn micros_since(&self, earlier: TimePoint) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    #[inline]
    pub fn is_after(&self, other: TimePoint) -> bool {
        self.0 > other.0
    }
}

impl std::ops::Sub for TimePoint {
    type Output = i64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.micros_since(rhs)
    }
}

// Windows: QueryPerformanceCounter
#[cfg(windows)]
mod host {
    use windows::Win32::System::Performance::{QueryPerformanceCounter, QueryPerformanceFrequency};

    use crate::Error;

    pub(super) fn frequency() -> crate::Result<u64> {
        let mut freq = 0i64;
        // SAFETY: the out-pointer refers to a live local
        unsafe { QueryPerformanceFrequency(&mut freq) }
            .map_err(|e| Error::ClockUnavailable(format!("QueryPerformanceFrequency: {e}")))?;
        u64::try_from(freq)
            .map_err(|_| Error::ClockUnavailable(format!("negative counter frequency {freq}")))
    }

    #[inline(always)]
    pub(super) fn now_ticks() -> u64 {
        let mut ticks = 0i64;
        // Cannot fail once QueryPerformanceFrequency has succeeded.
        // SAFETY: the out-pointer refers to a live local
        let _ = unsafe { QueryPerformanceCounter(&mut ticks) };
        ticks as u64
    }
}

// macOS: mach_absolute_time
#[cfg(target_os = "macos")]
mod host {
    use mach2::kern_return::KERN_SUCCESS;
    use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};

    use crate::Error;

    pub(super) fn frequency() -> crate::Result<u64> {
        let mut info = mach_timebase_info_data_t { numer: 0, denom: 0 };
        // SAFETY: mach_timebase_info only writes into the provided struct
        let kr = unsafe { mach_timebase_info(&mut info) };
        if kr != KERN_SUCCESS || info.numer == 0 || info.denom == 0 {
            return Err(Error::ClockUnavailable(format!(
                "mach_timebase_info returned {kr} ({}/{})",
                info.numer, info.denom
            )));
        }
        // nanos = ticks * numer / denom
        Ok((1_000_000_000u128 * info.denom as u128 / info.numer as u128) as u64)
    }

    #[inline(always)]
    pub(super) fn now_ticks() -> u64 {
        // SAFETY: mach_absolute_time is always safe to call
        unsafe { mach_absolute_time() }
    }
}

// Other Unix: clock_gettime(CLOCK_MONOTONIC), ticks are nanoseconds
#[cfg(all(unix, not(target_os = "macos")))]
mod host {
    use crate::Error;

    const NANOS_PER_SEC: u64 = 1_000_000_000;

    pub(super) fn frequency() -> crate::Result<u64> {
        let mut res = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // SAFETY: the out-pointer refers to a live local
        let rc = unsafe { libc::clock_getres(libc::CLOCK_MONOTONIC, &mut res) };
        if rc != 0 {
            return Err(Error::ClockUnavailable(format!(
                "clock_getres(CLOCK_MONOTONIC): {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(NANOS_PER_SEC)
    }

    #[inline(always)]
    pub(super) fn now_ticks() -> u64 {
        let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // SAFETY: CLOCK_MONOTONIC was validated by clock_getres in frequency()
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        ts.tv_sec as u64 * NANOS_PER_SEC + ts.tv_nsec as u64
    }
}

// Anything else: nanoseconds since a process-wide Instant origin
#[cfg(not(any(unix, windows)))]
mod host {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ORIGIN: OnceLock<Instant> = OnceLock::new();

    pub(super) fn frequency() -> crate::Result<u64> {
        ORIGIN.get_or_init(Instant::now);
        Ok(1_000_000_000)
    }

    #[inline(always)]
    pub(super) fn now_ticks() -> u64 {
        ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}
