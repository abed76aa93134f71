//! # ingestd
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 服务编排与生命周期管理
//! - 优雅关闭处理 (关闭时刷盘)

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_serve, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(observability_config(&cli))?;

    info!(version = env!("CARGO_PKG_VERSION"), "ingestd starting");

    let result = match &cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
    }

    result
}

/// Logging settings from CLI flags; metrics are started by `serve`
fn observability_config(cli: &Cli) -> ObservabilityConfig {
    let (level, force_level) = if cli.quiet {
        ("warn", true)
    } else {
        match cli.verbose {
            0 => ("info", false),
            1 => ("debug", false),
            _ => ("trace", false),
        }
    };

    ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: level.to_string(),
        force_level,
    }
}
