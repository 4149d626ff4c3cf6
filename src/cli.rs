// src/cli.rs

//! Command-line interface for the `flowdag` binary.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `flowdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowdag",
    version,
    about = "Run a plan of dependent automation tasks with failure recovery.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Flowdag.toml")]
    pub plan: String,

    /// Validate the plan and print the execution order without running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWDAG_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
