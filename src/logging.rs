// src/logging.rs

//! Logging setup for `flowdag`.
//!
//! The filter comes from, in order:
//! 1. the `--log-level` flag,
//! 2. the `FLOWDAG_LOG` environment variable, which accepts full
//!    `EnvFilter` directives (e.g. `flowdag::recovery=debug,info`),
//! 3. `info`.
//!
//! Logs go to stderr; stdout carries the run report.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "FLOWDAG_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_env_filter(build_filter(cli_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

fn build_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level.as_str());
    }
    match std::env::var(LOG_ENV_VAR) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives.trim())
            .unwrap_or_else(|err| {
                eprintln!("ignoring invalid {LOG_ENV_VAR} ({err}); using info");
                EnvFilter::new("info")
            }),
        _ => EnvFilter::new("info"),
    }
}
