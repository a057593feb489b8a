//! Application configuration, loaded from the environment exactly the way
//! the teacher's `Config::from_env()` does: one `std::env::var` per field,
//! falling back to a documented default.

use anyhow::{Context, Result};

/// Top-level config for the CLI binary. The library itself never reads the
/// environment — every engine component takes its inputs as plain arguments
/// (spec §9: "no process-wide mutable state").
#[derive(Debug, Clone)]
pub struct Config {
    /// Overrides `UserProfile::baseline_daily_min` when set.
    pub baseline_daily_min: f64,
    /// Overrides `UserProfile::buffer_pct` when set.
    pub buffer_pct: f64,
    /// Default `max_slices` for `what-now` when the CLI flag is omitted.
    pub default_max_slices: usize,
    /// Optional path to a YAML seed file loaded into the in-memory store at
    /// startup, ahead of whatever `import` populates during the same run.
    pub store_seed_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baseline_daily_min: 30.0,
            buffer_pct: 0.15,
            default_max_slices: 3,
            store_seed_path: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, each falling back to
    /// a documented default (see `SPEC_FULL.md` §11).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            baseline_daily_min: parse_env_f64(
                "KAIROS_BASELINE_DAILY_MIN",
                defaults.baseline_daily_min,
            )?,
            buffer_pct: parse_env_f64("KAIROS_BUFFER_PCT", defaults.buffer_pct)?,
            default_max_slices: parse_env_usize(
                "KAIROS_DEFAULT_MAX_SLICES",
                defaults.default_max_slices,
            )?,
            store_seed_path: std::env::var("KAIROS_STORE_SEED").ok(),
        })
    }
}

fn parse_env_f64(key: &str, default: f64) -> Result<f64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("{key} must be a floating point number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_env_usize(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
