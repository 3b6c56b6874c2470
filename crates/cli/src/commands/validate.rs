//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{FusionConfig, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Gyro history shorter than this rarely covers camera latency
const MIN_GYRO_HISTORY_US: u64 = 50_000;

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
    table_name: String,
    transport: String,
    camera_count: usize,
    strobe_camera_count: usize,
    gyro_capacity: usize,
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

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

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
                    version: config.version.clone(),
                    table_name: config.table_name.clone(),
                    transport: config.transport.kind.to_string(),
                    camera_count: config.cameras.len(),
                    strobe_camera_count: config.cameras.iter().filter(|c| c.strobe_enabled).count(),
                    gyro_capacity: config.gyro.capacity,
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
fn collect_warnings(config: &FusionConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.transport.kind == TransportKind::Table {
        warnings.push(
            "table transport needs an embedded table client - `run` cannot drive it".to_string(),
        );
    }

    for camera in &config.cameras {
        if camera.camera_to_center.is_none() {
            warnings.push(format!(
                "Camera {} has no camera_to_center transform - robot-center poses will be the sentinel",
                camera.index
            ));
        }
    }

    let history_us = config.gyro.capacity as u64 * config.gyro.sample_period_us;
    if config.cameras.iter().any(|c| c.strobe_enabled) && history_us < MIN_GYRO_HISTORY_US {
        warnings.push(format!(
            "Gyro history covers only {} ms - late frames will fall back to vision yaw",
            history_us / 1000
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Table: {}", summary.table_name);
            println!("  Transport: {}", summary.transport);
            println!(
                "  Cameras: {} ({} strobe)",
                summary.camera_count, summary.strobe_camera_count
            );
            println!("  Gyro capacity: {}", summary.gyro_capacity);
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
