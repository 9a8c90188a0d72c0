//! Wait measurements

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one measured wait, all values in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitResult {
    pub requested_us: i64,
    pub actual_us: i64,
    /// `actual - requested`: positive is overshoot, negative undershoot
    pub error_us: i64,
}

impl WaitResult {
    pub fn new(requested_us: i64, actual_us: i64) -> Self {
        Self {
            requested_us,
            actual_us,
            error_us: actual_us.saturating_sub(requested_us),
        }
    }

    /// Returned before the requested time had elapsed.
    pub fn is_early(&self) -> bool {
        self.error_us < 0
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for WaitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Requested: {} μs", self.requested_us)?;
        writeln!(f, "Actual: {} μs", self.actual_us)?;
        write!(f, "Error: {} μs", self.error_us)
    }
}

/// Error statistics over repeated waits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitSummary {
    pub runs: usize,
    pub min_error_us: i64,
    pub max_error_us: i64,
    pub mean_error_us: f64,
    /// Runs that returned before the requested time
    pub early_runs: usize,
}

impl WaitSummary {
    /// `None` for an empty slice.
    pub fn from_results(results: &[WaitResult]) -> Option<Self> {
        results.iter().copied().collect::<WaitTally>().summary()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Running error statistics, folded one result at a time so arbitrarily
/// long repeat runs use constant memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitTally {
    runs: usize,
    min_error_us: i64,
    max_error_us: i64,
    total_error_us: i128,
    early_runs: usize,
}

impl WaitTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: &WaitResult) {
        if self.runs == 0 {
            self.min_error_us = result.error_us;
            self.max_error_us = result.error_us;
        } else {
            self.min_error_us = self.min_error_us.min(result.error_us);
            self.max_error_us = self.max_error_us.max(result.error_us);
        }
        self.runs += 1;
        self.total_error_us += result.error_us as i128;
        if result.is_early() {
            self.early_runs += 1;
        }
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// `None` until at least one result has been pushed.
    pub fn summary(&self) -> Option<WaitSummary> {
        if self.runs == 0 {
            return None;
        }
        Some(WaitSummary {
            runs: self.runs,
            min_error_us: self.min_error_us,
            max_error_us: self.max_error_us,
            mean_error_us: self.total_error_us as f64 / self.runs as f64,
            early_runs: self.early_runs,
        })
    }
}

impl FromIterator<WaitResult> for WaitTally {
    fn from_iter<I: IntoIterator<Item = WaitResult>>(iter: I) -> Self {
        let mut tally = Self::new();
        for result in iter {
            tally.push(&result);
        }
        tally
    }
}

impl fmt::Display for WaitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Runs: {}", self.runs)?;
        writeln!(f, "Min error: {} μs", self.min_error_us)?;
        writeln!(f, "Mean error: {:.1} μs", self.mean_error_us)?;
        write!(f, "Max error: {} μs", self.max_error_us)?;
        if self.early_runs > 0 {
            write!(f, "\nEarly returns: {}", self.early_runs)?;
        }
        Ok(())
    }
}
