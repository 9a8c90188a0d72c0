//! Precision Timer - microsecond-accurate waits
//!
//! Waits for the requested number of microseconds and reports how long the
//! wait actually took.

use anyhow::Context;
use chrono::{Local, NaiveTime};
use clap::error::ErrorKind;
use precision_timer::app::cli::Cli;
use precision_timer::app::config::Config;
use precision_timer::app::schedule;
use precision_timer::wait::{PrecisionWaiter, WaitResult, WaitSummary, WaitTally};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse_args() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            // Usage errors go to stdout with exit code 1
            print!("{}", e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr so stdout carries only results
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    debug!("Effective configuration:\n{}", config.to_toml()?);

    let waiter =
        PrecisionWaiter::with_config(config.wait).context("Failed to initialize precision waiter")?;

    match (cli.at, cli.microseconds) {
        (Some(at), _) => run_at(&waiter, at, cli.json),
        (None, Some(micros)) => run_wait(&waiter, micros, cli.repeat, cli.json),
        // clap enforces one of the two
        (None, None) => anyhow::bail!("No wait duration given"),
    }
}

fn run_wait(
    waiter: &PrecisionWaiter,
    micros: i64,
    repeat: u32,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        println!("Starting precise wait for {} microseconds...", micros);
    }

    let mut tally = WaitTally::new();
    for run in 1..=repeat {
        let result = waiter.measure(micros);
        if result.is_early() {
            warn!("Run {} returned {} μs early", run, -result.error_us);
        }

        if repeat > 1 && !json {
            println!("Run {}/{}", run, repeat);
        }
        print_result(&result, json)?;
        tally.push(&result);
    }

    if repeat > 1 {
        if let Some(summary) = tally.summary() {
            print_summary(&summary, json)?;
        }
    }

    Ok(())
}

fn run_at(waiter: &PrecisionWaiter, at: NaiveTime, json: bool) -> anyhow::Result<()> {
    let now_wall = Local::now();
    let now_mono = waiter.now();
    let target = schedule::monotonic_target(at, &now_wall, now_mono);

    if !target.is_after(now_mono) {
        warn!("Target time {} has already passed", at.format("%H:%M:%S%.3f"));
    }

    if !json {
        println!(
            "Starting precise wait until {} ({} microseconds)...",
            at.format("%H:%M:%S%.3f"),
            (target - now_mono).max(0)
        );
    }

    let result = waiter.measure_until(target);
    print_result(&result, json)
}

fn print_result(result: &WaitResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", result.to_json()?);
    } else {
        println!("{}", result);
    }
    Ok(())
}

fn print_summary(summary: &WaitSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", summary.to_json()?);
    } else {
        println!("\nSummary");
        println!("{}", summary);
    }
    Ok(())
}
