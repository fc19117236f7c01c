// ===============================
// src/main.rs
// ===============================
/*
 cargo run --release -- sim.env --seed 42

 # just the summary
 RUST_LOG=warn,ema_crossover_sim=info cargo run --release -- sim.env

 # per-signal debug output
 RUST_LOG=debug cargo run -- sim.env --steps 2000
*/
/*
=============================================================================
Project : ema_crossover_sim - synthetic tick simulator with EMA crossover bot
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Generates a geometric price path, runs a time-weighted EMA
          crossover strategy against it, applies position limits, fills
          orders on a simulated venue with random rejections, tracks
          position/PnL, and records ticks and orders to CSV or JSONL.
=============================================================================
*/
mod domain;
mod config;
mod metrics;
mod recorder;
mod feed;
mod strategy;
mod risk;
mod orders;
mod gateway;          // simulated venue (random reject, fill on poll)
mod positions;
mod simulation;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{format_duration, SimConfig};
use crate::recorder::{OrderRecorder, TickRecorder};
use crate::simulation::Simulator;

const DEFAULT_CONFIG_FILE: &str = "sim.env";

/// Geometric price simulation traded by a time-weighted EMA crossover bot.
///
/// If CONFIG_PATH does not exist, a default config is written there first.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file (KEY=VALUE). Defaults to sim.env next to the executable.
    config_path: Option<PathBuf>,

    /// Master RNG seed; overrides SEED from the config.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks; overrides STEPS_COUNT from the config.
    #[arg(long)]
    steps: Option<u64>,
}

fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn load_config(cli: &Cli) -> Result<SimConfig, config::ConfigError> {
    let path = cli.config_path.clone().unwrap_or_else(default_config_path);
    info!(path = %path.display(), "using configuration file");

    let mut cfg = config::load_or_create(&path)?;
    if let Some(seed) = cli.seed {
        cfg.seed = Some(seed);
    }
    if let Some(steps) = cli.steps {
        cfg.steps_count = steps;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn main() -> ExitCode {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // ---- Load config ----
    let cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "config");
            return ExitCode::FAILURE;
        }
    };

    info!(
        initial_price = cfg.initial_price,
        mu = cfg.average_trend_value,
        sigma = cfg.price_variation,
        horizon = %format_duration(cfg.time_horizon),
        dt = %format!("{}..{}", format_duration(cfg.min_diff_time), format_duration(cfg.max_diff_time)),
        fast_ema = %format_duration(cfg.fast_ema),
        slow_ema = %format_duration(cfg.slow_ema),
        position = %format!("{}..{}", cfg.min_position, cfg.max_position),
        rejection_pct = cfg.rejection_probability,
        steps = cfg.steps_count,
        seed = ?cfg.seed,
        "startup config"
    );

    // ---- Metrics ----
    metrics::init();

    // ---- Recorders (must open before the run starts) ----
    let ticks = match TickRecorder::open(&cfg.price_evolution_path, cfg.record_format) {
        Ok(r) => r,
        Err(e) => {
            error!(%e, "cannot start tick recorder");
            return ExitCode::FAILURE;
        }
    };
    let orders = match OrderRecorder::open(&cfg.orders_log_path, cfg.record_format) {
        Ok(r) => r,
        Err(e) => {
            error!(%e, "cannot start order recorder");
            return ExitCode::FAILURE;
        }
    };

    // ---- Run ----
    let mut sim = Simulator::new(&cfg, Box::new(ticks), Box::new(orders));
    let summary = sim.run();
    if let Err(e) = sim.flush() {
        error!(%e, "final flush failed");
    }

    info!(
        steps = summary.steps,
        final_price = summary.final_price,
        signals = summary.signals,
        submitted = summary.orders.submitted,
        executed = summary.orders.executed,
        rejected = summary.orders.rejected,
        position = summary.position,
        realized_pnl = summary.realized_pnl,
        total_pnl = summary.total_pnl,
        "simulation finished"
    );
    match serde_json::to_string(&summary) {
        Ok(json) => info!(summary = %json, "run summary"),
        Err(e) => warn!(%e, "summary serialize failed"),
    }

    if let Some(path) = &cfg.metrics_file {
        match metrics::write_to(path) {
            Ok(()) => info!(path = %path.display(), "metrics written"),
            Err(e) => warn!(%e, path = %path.display(), "metrics write failed"),
        }
    }

    ExitCode::SUCCESS
}
