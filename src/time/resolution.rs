//! Scoped Timer Resolution Control
//!
//! General-purpose schedulers wake sleeping threads on a coarse tick
//! (10-15 ms on a default Windows install). [`HighResolutionGuard`] asks the
//! host for a finer granularity for as long as the guard lives and releases
//! the request exactly once when it is ended or dropped.
//!
//! The request is advisory. Hosts may ignore or refuse it, and other
//! processes holding their own requests keep the finer tick alive after this
//! guard is released.

use std::marker::PhantomData;

use tracing::{debug, warn};

/// Default requested timer period in milliseconds
pub const DEFAULT_PERIOD_MS: u32 = 1;

/// RAII request for finer scheduler timer granularity.
///
/// - Windows: `timeBeginPeriod` / `timeEndPeriod`
/// - Linux/Android: the calling thread's timer slack is lowered to 1 ns and
///   restored when the last guard on that thread is released
/// - Elsewhere: inert
///
/// Not `Send`: the Linux control is per-thread, so the guard has to be
/// released on the thread that acquired it.
#[derive(Debug)]
pub struct HighResolutionGuard {
    period_ms: u32,
    token: Option<host::Token>,
    _not_send: PhantomData<*const ()>,
}

impl HighResolutionGuard {
    /// Request a timer period of `period_ms` milliseconds.
    ///
    /// Never fails: a refused request is logged and yields an inactive guard.
    pub fn begin(period_ms: u32) -> Self {
        let token = match host::begin(period_ms) {
            Ok(Some(token)) => {
                debug!(period_ms, "timer resolution request acquired");
                Some(token)
            }
            Ok(None) => {
                debug!("host has no timer resolution control, coarse sleeps may overshoot");
                None
            }
            Err(reason) => {
                warn!(period_ms, "timer resolution request refused: {}", reason);
                None
            }
        };

        Self {
            period_ms,
            token,
            _not_send: PhantomData,
        }
    }

    /// Whether the host accepted the request and it has not been released.
    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Release the request now instead of at end of scope.
    pub fn end(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(token) = self.token.take() {
            host::end(self.period_ms, token);
            debug!(period_ms = self.period_ms, "timer resolution request released");
        }
    }
}

impl Drop for HighResolutionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(windows)]
mod host {
    use windows::Win32::Media::{timeBeginPeriod, timeEndPeriod};

    const TIMERR_NOERROR: u32 = 0;

    pub(super) type Token = ();

    pub(super) fn begin(period_ms: u32) -> Result<Option<Token>, String> {
        // SAFETY: plain winmm call, no pointers involved
        let rc = unsafe { timeBeginPeriod(period_ms) };
        if rc == TIMERR_NOERROR {
            Ok(Some(()))
        } else {
            Err(format!("timeBeginPeriod({period_ms}) returned {rc}"))
        }
    }

    pub(super) fn end(period_ms: u32, _token: Token) {
        // SAFETY: matched with the successful timeBeginPeriod above
        unsafe {
            timeEndPeriod(period_ms);
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod host {
    use std::cell::Cell;

    use libc::c_ulong;

    /// Smallest non-zero slack; zero means "reset to the default"
    const MIN_SLACK_NS: c_ulong = 1;

    thread_local! {
        /// Live guards on this thread and the slack to restore after the last one
        static HELD: Cell<(usize, c_ulong)> = const { Cell::new((0, 0)) };
    }

    pub(super) type Token = ();

    pub(super) fn begin(_period_ms: u32) -> Result<Option<Token>, String> {
        let (depth, original) = HELD.with(Cell::get);
        if depth > 0 {
            HELD.with(|held| held.set((depth + 1, original)));
            return Ok(Some(()));
        }

        // SAFETY: PR_GET_TIMERSLACK takes no pointer arguments
        let previous = unsafe { libc::prctl(libc::PR_GET_TIMERSLACK) };
        if previous < 0 {
            return Err(format!(
                "PR_GET_TIMERSLACK: {}",
                std::io::Error::last_os_error()
            ));
        }

        // SAFETY: PR_SET_TIMERSLACK takes a plain integer
        let rc = unsafe { libc::prctl(libc::PR_SET_TIMERSLACK, MIN_SLACK_NS) };
        if rc != 0 {
            return Err(format!(
                "PR_SET_TIMERSLACK: {}",
                std::io::Error::last_os_error()
            ));
        }

        HELD.with(|held| held.set((1, previous as c_ulong)));
        Ok(Some(()))
    }

    pub(super) fn end(_period_ms: u32, _token: Token) {
        let (depth, original) = HELD.with(Cell::get);
        let remaining = depth.saturating_sub(1);
        HELD.with(|held| held.set((remaining, original)));
        if remaining == 0 {
            // SAFETY: PR_SET_TIMERSLACK takes a plain integer
            unsafe {
                libc::prctl(libc::PR_SET_TIMERSLACK, original);
            }
        }
    }
}

#[cfg(not(any(windows, target_os = "linux", target_os = "android")))]
mod host {
    pub(super) type Token = ();

    pub(super) fn begin(_period_ms: u32) -> Result<Option<Token>, String> {
        Ok(None)
    }

    pub(super) fn end(_period_ms: u32, _token: Token) {}
}
