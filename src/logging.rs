// src/logging.rs

//! Logging setup for `etagwatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `ETAGWATCH_LOG` environment variable, either a bare level ("debug")
//!    or a full filter directive ("etagwatch::engine=trace,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries only the event lines.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "ETAGWATCH_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directive = match cli_level {
        Some(lvl) => level_from_log_level(lvl).to_string(),
        None => directive_from_env(std::env::var(LOG_ENV_VAR).ok().as_deref()),
    };
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter: {directive}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing tracing subscriber: {err}"))?;

    Ok(())
}

/// Bare levels are normalized; anything else must parse as a filter
/// directive or the default is used.
fn directive_from_env(value: Option<&str>) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "info".to_string();
    };
    if let Some(level) = parse_level_str(value) {
        return level.to_string();
    }
    match EnvFilter::try_new(value) {
        Ok(_) => value.to_string(),
        Err(_) => "info".to_string(),
    }
}

fn level_from_log_level(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn parse_level_str(s: &str) -> Option<&'static str> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some("error"),
        "warn" | "warning" => Some("warn"),
        "info" => Some("info"),
        "debug" => Some("debug"),
        "trace" => Some("trace"),
        _ => None,
    }
}
