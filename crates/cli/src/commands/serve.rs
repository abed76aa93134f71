//! `serve` command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use buffered_store::{BufferedStore, StoreConfig};
use config_loader::ConfigLoader;
use contracts::{ServiceBlueprint, SinkConfig};
use ingestion::IngestServer;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::ServeArgs;

/// Execute the `serve` command
pub async fn run_serve(args: &ServeArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        server_address = %blueprint.server.addr,
        sink = blueprint.sink.kind(),
        flush_interval = ?blueprint.store.flush_interval,
        save_timeout = ?blueprint.store.save_timeout,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let sink = sinks::create_sink(&blueprint.sink).context("Failed to create sink")?;
    sink.initialize()
        .await
        .context("Failed to initialize sink")?;

    let store = BufferedStore::new(sink, StoreConfig::from(&blueprint.store));
    store.start().context("Failed to start storage")?;

    let cancel = CancellationToken::new();
    let server = IngestServer::new(blueprint.server.clone(), Arc::clone(&store));
    let mut server_task = tokio::spawn(server.run(cancel.clone()));

    let served = tokio::select! {
        joined = &mut server_task => joined,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping server...");
            cancel.cancel();
            server_task.await
        }
    };

    // Requests are drained by now; flush whatever they buffered.
    let stopped = store.stop().await;

    match served {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            if let Err(ref drain) = stopped {
                error!(error = %drain, "Can't properly stop storage");
            }
            return Err(e).context("Server failed");
        }
        Err(e) => return Err(e).context("Server task aborted"),
    }

    stopped.context("Can't properly stop storage")?;

    info!("ingestd finished");
    Ok(())
}

/// Load the configuration file (or defaults) and apply overrides
fn load_blueprint(args: &ServeArgs) -> Result<ServiceBlueprint> {
    let mut blueprint = read_or_default(&args.config)?;
    apply_overrides(&mut blueprint, args);

    ConfigLoader::validate(&blueprint).context("Invalid configuration")?;
    Ok(blueprint)
}

fn read_or_default(path: &Path) -> Result<ServiceBlueprint> {
    if !path.exists() {
        info!(config = %path.display(), "Configuration file not found, using defaults");
        return Ok(ServiceBlueprint::default());
    }

    info!(config = %path.display(), "Loading configuration");
    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Apply command-line / environment overrides
fn apply_overrides(blueprint: &mut ServiceBlueprint, args: &ServeArgs) {
    if let Some(ref addr) = args.addr {
        info!(addr = %addr, "Overriding server address");
        blueprint.server.addr = addr.clone();
    }

    if let Some(interval) = args.flush_interval {
        info!(flush_interval = ?interval, "Overriding flush interval");
        blueprint.store.flush_interval = interval;
    }

    if let Some(ref url) = args.database_url {
        match blueprint.sink {
            SinkConfig::ClickHouse(ref mut ch) => {
                info!("Overriding ClickHouse URL");
                ch.url = url.clone();
            }
            ref other => warn!(
                sink = other.kind(),
                "Database URL given but sink is not ClickHouse, ignoring"
            ),
        }
    }
}

/// Ctrl+C and SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ServiceBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Server:");
    println!("  Address: {}", blueprint.server.addr);
    println!("  Max body: {} bytes", blueprint.server.max_body_bytes);

    println!("\nStore:");
    println!("  Flush interval: {:?}", blueprint.store.flush_interval);
    println!("  Save timeout: {:?}", blueprint.store.save_timeout);
    if let Some(mark) = blueprint.store.high_water_mark {
        println!("  High water mark: {mark}");
    }

    println!("\nSink ({}):", blueprint.sink.kind());
    match &blueprint.sink {
        SinkConfig::ClickHouse(ch) => {
            println!("  URL: {}", ch.url);
            println!("  Table: {}.{}", ch.database, ch.table);
        }
        SinkConfig::File(file) => println!("  Path: {}", file.base_path.display()),
        SinkConfig::Log => {}
    }

    println!();
}
