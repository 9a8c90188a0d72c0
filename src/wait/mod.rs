//! Hybrid Waiting
//!
//! Coarse sleep for the bulk of a wait, busy-poll for the tail.

pub mod result;
pub mod waiter;

pub use result::{WaitResult, WaitSummary, WaitTally};
pub use waiter::{coarse_sleep_millis, PrecisionWaiter, WaitConfig};
