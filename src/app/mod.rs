//! Application Layer
//!
//! User-facing CLI and configuration management.

pub mod cli;
pub mod config;
pub mod schedule;

pub use cli::Cli;
pub use config::Config;
