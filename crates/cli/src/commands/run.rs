//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::FusionConfig;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding bind address from CLI");
        config.transport.bind_addr = bind.clone();
    }

    info!(
        table = %config.table_name,
        transport = %config.transport.kind,
        bind = %config.transport.bind_addr,
        cameras = config.cameras.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        fusion: config,
        status_interval: Duration::from_millis(args.status_interval_ms),
        max_results: if args.max_results == 0 {
            None
        } else {
            Some(args.max_results)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    info!("Starting pipeline...");

    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        results_read = stats.results_read,
        datagrams = stats.ingestion.packets_received,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Vision Fusion finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &FusionConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Transport:");
    println!("  Kind: {}", config.transport.kind);
    println!("  Bind: {}", config.transport.bind_addr);
    println!(
        "  Channel: {} ({:?})",
        config.transport.channel_capacity, config.transport.drop_policy
    );

    println!("\nCameras ({}):", config.cameras.len());
    for camera in &config.cameras {
        println!(
            "  - {} (index {}){}{}",
            config.camera_id(camera.index),
            camera.index,
            if camera.strobe_enabled { ", strobe" } else { "" },
            if camera.camera_to_center.is_some() {
                ", mounted"
            } else {
                ""
            }
        );
    }

    println!("\nGyro:");
    println!("  Capacity: {}", config.gyro.capacity);
    println!("  Sample period: {} µs", config.gyro.sample_period_us);

    println!();
}
