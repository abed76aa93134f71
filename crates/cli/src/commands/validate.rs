//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ServiceBlueprint, SinkConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    server_addr: String,
    sink: String,
    #[serde(with = "humantime_serde")]
    flush_interval: std::time::Duration,
    #[serde(with = "humantime_serde")]
    save_timeout: std::time::Duration,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    server_addr: blueprint.server.addr.clone(),
                    sink: blueprint.sink.kind().to_string(),
                    flush_interval: blueprint.store.flush_interval,
                    save_timeout: blueprint.store.save_timeout,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ServiceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if matches!(blueprint.sink, SinkConfig::Log) {
        warnings.push("Sink type 'log' does not persist events".to_string());
    }

    if blueprint.store.high_water_mark.is_none() {
        warnings.push("store.high_water_mark is not set - buffer growth is not reported".to_string());
    }

    if let SinkConfig::ClickHouse(ref ch) = blueprint.sink {
        if ch.url.starts_with("http://") && ch.password.is_some() {
            warnings.push("ClickHouse password is sent over plain http".to_string());
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Server: {}", summary.server_addr);
            println!("  Sink: {}", summary.sink);
            println!("  Flush interval: {:?}", summary.flush_interval);
            println!("  Save timeout: {:?}", summary.save_timeout);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
