//! Command-Line Interface

use chrono::NaiveTime;
use clap::Parser;
use std::path::PathBuf;

/// Precision Timer - wait an exact number of microseconds and report the error
#[derive(Parser, Debug)]
#[command(name = "precision-timer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Microseconds to wait
    #[arg(allow_negative_numbers = true, required_unless_present = "at")]
    pub microseconds: Option<i64>,

    /// Wait until this local time today instead (HH:MM:SS or HH:MM:SS.fff)
    #[arg(long, value_parser = parse_wall_time, conflicts_with_all = ["microseconds", "repeat"])]
    pub at: Option<NaiveTime>,

    /// Number of times to repeat the wait
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Print results as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments, leaving error reporting to the caller
    pub fn try_parse_args() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}

/// Parse `HH:MM:SS` with optional fractional seconds
pub fn parse_wall_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .map_err(|e| format!("expected HH:MM:SS[.fff], got '{}': {}", s, e))
}
