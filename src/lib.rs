//! # Precision Timer
//!
//! Blocks the calling thread for a requested number of microseconds with
//! minimal overshoot, and measures how long the wait actually took.
//!
//! ## Overview
//!
//! Standard sleep primitives wake on scheduler ticks, which routinely adds
//! one or more milliseconds of overshoot. This crate combines a coarse sleep
//! for the bulk of the duration with a busy-poll over a monotonic
//! high-resolution counter for the final tail.
//!
//! ## Quick Start
//!
//! ```no_run
//! use precision_timer::PrecisionWaiter;
//!
//! let waiter = PrecisionWaiter::new().expect("no usable clock");
//!
//! let result = waiter.measure(1_500);
//! println!("requested {} us, took {} us", result.requested_us, result.actual_us);
//!
//! // Absolute form: wait until a point on the same monotonic clock
//! let target = waiter.now().saturating_add_micros(20_000);
//! waiter.wait_until(target);
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: monotonic clock source and scoped timer-resolution control
//! - [`wait`]: the hybrid coarse-sleep / busy-poll waiter and its results
//! - [`app`]: CLI and configuration management
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  start =    │───▶│ coarse sleep│───▶│  busy-poll  │───▶│ WaitResult  │
//! │  now()      │    │ (> 10 ms)   │    │ until end   │    │             │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod time;
pub mod wait;
pub mod app;

// Re-export commonly used types
pub use time::clock::{ClockSource, TimePoint};
pub use time::resolution::HighResolutionGuard;
pub use wait::waiter::{PrecisionWaiter, WaitConfig};
pub use wait::result::{WaitResult, WaitSummary, WaitTally};

/// Result type alias for the precision timer
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the precision timer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("High-resolution clock unavailable: {0}")]
    ClockUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
