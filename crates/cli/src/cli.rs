//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;

/// ingestd - buffered analytics event ingestion service
#[derive(Parser, Debug)]
#[command(
    name = "ingestd",
    author,
    version,
    about = "Buffered analytics event ingestion service",
    long_about = "Accepts analytics events over HTTP, buffers them in memory and \n\
                  periodically persists them in bulk to the configured sink."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "INGESTD_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "json",
        global = true,
        env = "INGESTD_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion service
    Serve(ServeArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `serve` command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Path to configuration file (TOML or JSON); defaults apply if it does not exist
    #[arg(short, long, default_value = "ingestd.toml", env = "INGESTD_CONFIG")]
    pub config: PathBuf,

    /// Override HTTP listen address
    #[arg(long, env = "SERVER_ADDR")]
    pub addr: Option<String>,

    /// Override ClickHouse URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Override flush interval (e.g. "5s", "500ms")
    #[arg(long, env = "STORAGE_FLUSH_INTERVAL", value_parser = parse_duration)]
    pub flush_interval: Option<Duration>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "INGESTD_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without serving
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ingestd.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    #[default]
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw)
}
