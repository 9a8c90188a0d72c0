//! Monotonic timing primitives
//!
//! This module provides the two host facilities the waiter is built on:
//! - A monotonic high-resolution clock read in microseconds
//! - A scoped request for finer scheduler timer granularity

pub mod clock;
pub mod resolution;

pub use clock::{ClockSource, TimePoint};
pub use resolution::HighResolutionGuard;
