// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : ema_crossover_sim - synthetic tick simulator with EMA crossover bot
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Generates a geometric price path, runs a time-weighted EMA
          crossover strategy against it, applies position limits, fills
          orders on a simulated venue with random rejections, tracks
          position/PnL, and records ticks and orders to CSV or JSONL.
=============================================================================
*/
use std::collections::HashMap;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::domain::{Price, Volume};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config path {path}: {source}")]
    Access { path: PathBuf, source: std::io::Error },
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: dotenvy::Error },
    #[error("failed to write default config file {path}: {source}")]
    WriteDefault { path: PathBuf, source: std::io::Error },
    #[error("error parsing {key}={value}: {reason}")]
    Parse { key: &'static str, value: String, reason: String },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Output format for the tick and order recorders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Jsonl,
}

impl RecordFormat {
    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(RecordFormat::Csv),
            "jsonl" | "json" => Some(RecordFormat::Jsonl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::Csv => "csv",
            RecordFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    // price process
    pub initial_price: Price,
    pub average_trend_value: f64,
    pub price_variation: f64,
    pub time_horizon: Duration,
    pub min_diff_time: Duration,
    pub max_diff_time: Duration,

    // trade
    pub fast_ema: Duration,
    pub slow_ema: Duration,
    pub min_volume: Volume,
    pub max_volume: Volume,
    pub min_position: Volume,
    pub max_position: Volume,

    // venue
    pub rejection_probability: f64, // percent, 0..=100

    // run
    pub steps_count: u64,
    pub seed: Option<u64>,
    pub price_evolution_path: PathBuf,
    pub orders_log_path: PathBuf,
    pub record_format: RecordFormat,
    pub metrics_file: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_price: 100.0,
            average_trend_value: 0.05,
            price_variation: 0.10,
            time_horizon: Duration::from_secs(24 * 3600),
            min_diff_time: Duration::from_millis(100),
            max_diff_time: Duration::from_millis(200),
            fast_ema: Duration::from_secs(1),
            slow_ema: Duration::from_secs(5),
            min_volume: 1.0,
            max_volume: 1000.0,
            min_position: -1000.0,
            max_position: 1000.0,
            rejection_probability: 1.0,
            steps_count: 100_000,
            seed: None,
            price_evolution_path: PathBuf::from("output/price_evolution.csv"),
            orders_log_path: PathBuf::from("output/orders.csv"),
            record_format: RecordFormat::Csv,
            metrics_file: None,
        }
    }
}

// ===== Duration strings: "<int><unit>" =====
const MONTH_SECS: u64 = 2_629_746;
const YEAR_SECS: u64 = 31_556_952;

const UNITS: [(&str, u64); 9] = [
    ("y", YEAR_SECS * 1_000_000_000),
    ("m", MONTH_SECS * 1_000_000_000),
    ("d", 86_400 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
    ("min", 60 * 1_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty duration string".into());
    }
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);
    if digits.is_empty() || suffix.is_empty() {
        return Err(format!("invalid duration format: {input}"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid number in duration: {input}"))?;
    let nanos_per = UNITS
        .iter()
        .find(|(name, _)| *name == suffix)
        .map(|(_, n)| *n)
        .ok_or_else(|| format!("unknown time suffix: {suffix}"))?;
    value
        .checked_mul(nanos_per)
        .map(Duration::from_nanos)
        .ok_or_else(|| format!("duration out of range: {input}"))
}

/// Inverse of `parse_duration`, using the largest unit that divides evenly.
pub fn format_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    if ns == 0 {
        return "0ns".into();
    }
    for (name, per) in UNITS {
        let per = per as u128;
        if ns % per == 0 {
            return format!("{}{}", ns / per, name);
        }
    }
    format!("{ns}ns")
}

fn parse_key<T, F>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, target: &mut T, parse: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Result<T, String>,
{
    if let Some(raw) = lookup(key) {
        *target = parse(raw.trim()).map_err(|reason| ConfigError::Parse { key, value: raw.clone(), reason })?;
    }
    Ok(())
}

fn num<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("failed to parse number: {s}"))
}

impl SimConfig {
    /// Build a config from a key lookup; missing keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut c = SimConfig::default();

        // ===== Price =====
        parse_key(&lookup, "INITIAL_PRICE", &mut c.initial_price, num)?;
        parse_key(&lookup, "AVERAGE_TREND_VALUE", &mut c.average_trend_value, num)?;
        parse_key(&lookup, "PRICE_VARIATION", &mut c.price_variation, num)?;
        parse_key(&lookup, "TIME_HORIZON", &mut c.time_horizon, parse_duration)?;
        parse_key(&lookup, "MIN_DIFF_TIME", &mut c.min_diff_time, parse_duration)?;
        parse_key(&lookup, "MAX_DIFF_TIME", &mut c.max_diff_time, parse_duration)?;

        // ===== Trade =====
        parse_key(&lookup, "FAST_EMA", &mut c.fast_ema, parse_duration)?;
        parse_key(&lookup, "SLOW_EMA", &mut c.slow_ema, parse_duration)?;
        parse_key(&lookup, "MIN_VOLUME", &mut c.min_volume, num)?;
        parse_key(&lookup, "MAX_VOLUME", &mut c.max_volume, num)?;
        parse_key(&lookup, "MIN_POSITION", &mut c.min_position, num)?;
        parse_key(&lookup, "MAX_POSITION", &mut c.max_position, num)?;

        // ===== Exchange =====
        parse_key(&lookup, "REJECTION_PROBABILITY", &mut c.rejection_probability, num)?;

        // ===== Simulation =====
        parse_key(&lookup, "STEPS_COUNT", &mut c.steps_count, num)?;
        parse_key(&lookup, "SEED", &mut c.seed, |s| num::<u64>(s).map(Some))?;
        parse_key(&lookup, "PRICE_EVOLUTION_PATH", &mut c.price_evolution_path, |s| Ok(PathBuf::from(s)))?;
        parse_key(&lookup, "ORDERS_LOG_PATH", &mut c.orders_log_path, |s| Ok(PathBuf::from(s)))?;
        parse_key(&lookup, "RECORD_FORMAT", &mut c.record_format, |s| {
            RecordFormat::parse_one(s).ok_or_else(|| format!("unknown record format: {s}"))
        })?;
        parse_key(&lookup, "METRICS_FILE", &mut c.metrics_file, |s| {
            Ok((!s.is_empty()).then(|| PathBuf::from(s)))
        })?;

        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let one_ns = Duration::from_nanos(1);
        let checks: [(bool, &'static str); 12] = [
            (self.initial_price >= 0.0, "initial_price must be >= 0"),
            (self.time_horizon >= one_ns, "time_horizon must be >= 1ns"),
            (self.min_diff_time < self.max_diff_time, "min_diff_time must be < max_diff_time"),
            (self.min_diff_time >= one_ns, "min_diff_time must be >= 1ns"),
            (self.fast_ema >= one_ns, "fast_ema must be >= 1ns"),
            (self.slow_ema > self.fast_ema, "slow_ema must be > fast_ema"),
            (self.max_volume >= self.min_volume, "max_volume must be >= min_volume"),
            (self.min_volume >= 0.0, "min_volume must be >= 0"),
            (self.max_position >= self.min_position, "max_position must be >= min_position"),
            (
                (0.0..=100.0).contains(&self.rejection_probability),
                "rejection_probability must be between 0.0 and 100.0",
            ),
            (self.steps_count >= 1, "steps_count must be >= 1"),
            (self.price_variation.is_finite() && self.average_trend_value.is_finite(), "trend and variation must be finite"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, msg)) => Err(ConfigError::Invalid(msg)),
            None => Ok(()),
        }
    }

    /// Render as a dotenv-style file that `load_file` reads back.
    pub fn to_env_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# ===== Price =====");
        let _ = writeln!(out, "INITIAL_PRICE={}", self.initial_price);
        let _ = writeln!(out, "AVERAGE_TREND_VALUE={}", self.average_trend_value);
        let _ = writeln!(out, "PRICE_VARIATION={}", self.price_variation);
        let _ = writeln!(out, "TIME_HORIZON={}", format_duration(self.time_horizon));
        let _ = writeln!(out, "MIN_DIFF_TIME={}", format_duration(self.min_diff_time));
        let _ = writeln!(out, "MAX_DIFF_TIME={}", format_duration(self.max_diff_time));
        let _ = writeln!(out, "\n# ===== Trade =====");
        let _ = writeln!(out, "FAST_EMA={}", format_duration(self.fast_ema));
        let _ = writeln!(out, "SLOW_EMA={}", format_duration(self.slow_ema));
        let _ = writeln!(out, "MIN_VOLUME={}", self.min_volume);
        let _ = writeln!(out, "MAX_VOLUME={}", self.max_volume);
        let _ = writeln!(out, "MIN_POSITION={}", self.min_position);
        let _ = writeln!(out, "MAX_POSITION={}", self.max_position);
        let _ = writeln!(out, "\n# ===== Exchange =====");
        let _ = writeln!(out, "REJECTION_PROBABILITY={}", self.rejection_probability);
        let _ = writeln!(out, "\n# ===== Simulation =====");
        let _ = writeln!(out, "STEPS_COUNT={}", self.steps_count);
        if let Some(seed) = self.seed {
            let _ = writeln!(out, "SEED={seed}");
        }
        let _ = writeln!(out, "PRICE_EVOLUTION_PATH={}", self.price_evolution_path.display());
        let _ = writeln!(out, "ORDERS_LOG_PATH={}", self.orders_log_path.display());
        let _ = writeln!(out, "RECORD_FORMAT={}", self.record_format.as_str());
        if let Some(path) = &self.metrics_file {
            let _ = writeln!(out, "METRICS_FILE={}", path.display());
        }
        out
    }
}

/// Read a dotenv-style config file. Process env vars with the same key win.
pub fn load_file(path: &Path) -> Result<SimConfig, ConfigError> {
    load_file_with(path, |key| env::var(key).ok())
}

/// Like `load_file`, with `env` standing in for the process environment.
pub fn load_file_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<SimConfig, ConfigError> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    let mut file_vals: HashMap<String, String> = HashMap::new();
    for item in iter {
        let (k, v) = item.map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        file_vals.insert(k, v);
    }
    SimConfig::from_lookup(|key| env(key).or_else(|| file_vals.get(key).cloned()))
}

/// Write the default config to `path`, creating parent directories.
pub fn create_default(path: &Path) -> Result<SimConfig, ConfigError> {
    let cfg = SimConfig::default();
    let write_err = |source| ConfigError::WriteDefault { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }
    fs::write(path, cfg.to_env_string()).map_err(write_err)?;
    Ok(cfg)
}

pub fn load_or_create(path: &Path) -> Result<SimConfig, ConfigError> {
    let exists = path
        .try_exists()
        .map_err(|source| ConfigError::Access { path: path.to_path_buf(), source })?;
    if exists {
        return load_file(path);
    }
    info!(path = %path.display(), "config file not found, creating default");
    create_default(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration(" 5 s ").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2min").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(MONTH_SECS));
        assert_eq!(parse_duration("7us").unwrap(), Duration::from_micros(7));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10 weeks").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_format_duration_picks_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(3_600 * 24 * 2)), "2d");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(60)), "1min");
        assert_eq!(format_duration(Duration::from_nanos(1)), "1ns");
        assert_eq!(format_duration(Duration::ZERO), "0ns");
    }

    #[test]
    fn test_defaults_when_no_keys() {
        let cfg = SimConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, SimConfig::default());
    }

    #[test]
    fn test_keys_override_defaults() {
        let pairs = [
            ("INITIAL_PRICE", "42.5"),
            ("FAST_EMA", "1ms"),
            ("SLOW_EMA", "1s"),
            ("STEPS_COUNT", "10"),
            ("SEED", "7"),
            ("RECORD_FORMAT", "jsonl"),
        ];
        let cfg = SimConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.initial_price, 42.5);
        assert_eq!(cfg.fast_ema, Duration::from_millis(1));
        assert_eq!(cfg.slow_ema, Duration::from_secs(1));
        assert_eq!(cfg.steps_count, 10);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.record_format, RecordFormat::Jsonl);
    }

    #[test]
    fn test_parse_error_names_key() {
        let pairs = [("MAX_VOLUME", "lots")];
        let err = SimConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("MAX_VOLUME"));
    }

    #[test]
    fn test_validation_rules() {
        let cases: [(&[(&str, &str)], &str); 6] = [
            (&[("MIN_DIFF_TIME", "200ms"), ("MAX_DIFF_TIME", "200ms")], "min_diff_time must be < max_diff_time"),
            (&[("SLOW_EMA", "1s")], "slow_ema must be > fast_ema"),
            (&[("MIN_VOLUME", "-1")], "min_volume must be >= 0"),
            (&[("MIN_POSITION", "10"), ("MAX_POSITION", "5")], "max_position must be >= min_position"),
            (&[("REJECTION_PROBABILITY", "100.5")], "rejection_probability must be between 0.0 and 100.0"),
            (&[("STEPS_COUNT", "0")], "steps_count must be >= 1"),
        ];
        for (pairs, expected) in cases {
            match SimConfig::from_lookup(lookup_from(pairs)) {
                Err(ConfigError::Invalid(msg)) => assert_eq!(msg, expected),
                other => panic!("expected {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_create_default_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sim.env");
        let created = load_or_create(&path).unwrap();
        assert!(path.exists());
        let loaded = load_file_with(&path, |_| None).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_load_file_reads_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.env");
        fs::write(&path, "# comment\nSTEPS_COUNT=25\nREJECTION_PROBABILITY=50\nTIME_HORIZON=1h\n").unwrap();
        let cfg = load_file_with(&path, |_| None).unwrap();
        assert_eq!(cfg.steps_count, 25);
        assert_eq!(cfg.rejection_probability, 50.0);
        assert_eq!(cfg.time_horizon, Duration::from_secs(3_600));
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.env");
        fs::write(&path, "STEPS_COUNT=25\nMAX_VOLUME=40\n").unwrap();
        let env = lookup_from(&[("STEPS_COUNT", "7"), ("SEED", "11")]);
        let cfg = load_file_with(&path, env).unwrap();
        assert_eq!(cfg.steps_count, 7);
        assert_eq!(cfg.seed, Some(11));
        assert_eq!(cfg.max_volume, 40.0);
    }
}
