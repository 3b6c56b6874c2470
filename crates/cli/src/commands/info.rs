//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{FusionConfig, Transform3};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    table_name: String,
    transport: TransportInfo,
    gyro: GyroInfo,
    cameras: Vec<CameraInfo>,
}

#[derive(Serialize)]
struct TransportInfo {
    kind: String,
    bind_addr: String,
    read_timeout_ms: u64,
    poll_period_ms: u64,
    channel_capacity: usize,
    drop_policy: String,
}

#[derive(Serialize)]
struct GyroInfo {
    capacity: usize,
    sample_period_us: u64,
}

#[derive(Serialize)]
struct CameraInfo {
    index: u32,
    identity: String,
    strobe_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera_to_center: Option<Transform3>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &FusionConfig, args: &InfoArgs) -> ConfigInfo {
    let cameras = config
        .cameras
        .iter()
        .map(|c| CameraInfo {
            index: c.index,
            identity: config.camera_id(c.index).to_string(),
            strobe_enabled: c.strobe_enabled,
            camera_to_center: if args.transforms {
                c.camera_to_center
            } else {
                None
            },
        })
        .collect();

    let transport = &config.transport;
    ConfigInfo {
        version: config.version.clone(),
        table_name: config.table_name.clone(),
        transport: TransportInfo {
            kind: transport.kind.to_string(),
            bind_addr: transport.bind_addr.clone(),
            read_timeout_ms: transport.read_timeout_ms,
            poll_period_ms: transport.poll_period_ms,
            channel_capacity: transport.channel_capacity,
            drop_policy: format!("{:?}", transport.drop_policy),
        },
        gyro: GyroInfo {
            capacity: config.gyro.capacity,
            sample_period_us: config.gyro.sample_period_us,
        },
        cameras,
    }
}

fn print_config_info(config: &FusionConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Vision Fusion Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Transport
    let transport = &config.transport;
    println!("📡 Transport");
    println!("   ├─ Version: {}", config.version);
    println!("   ├─ Kind: {}", transport.kind);
    if transport.kind == contracts::TransportKind::Table {
        println!("   ├─ Table: {}", config.table_name);
        println!("   └─ Poll period: {} ms", transport.poll_period_ms);
    } else {
        println!("   ├─ Bind: {}", transport.bind_addr);
        println!("   ├─ Read timeout: {} ms", transport.read_timeout_ms);
        println!(
            "   └─ Channel: {} ({:?})",
            transport.channel_capacity, transport.drop_policy
        );
    }

    // Cameras
    println!("\n📷 Cameras ({})", config.cameras.len());
    for (i, camera) in config.cameras.iter().enumerate() {
        let is_last = i == config.cameras.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} (index {}, strobe {})",
            prefix,
            config.camera_id(camera.index),
            camera.index,
            if camera.strobe_enabled { "on" } else { "off" }
        );

        if args.transforms {
            match &camera.camera_to_center {
                Some(t) => println!(
                    "   {}  └─ to center: t=({:.3}, {:.3}, {:.3}) r=({:.3}, {:.3}, {:.3})",
                    child_prefix,
                    t.translation.x,
                    t.translation.y,
                    t.translation.z,
                    t.rotation.roll,
                    t.rotation.pitch,
                    t.rotation.yaw
                ),
                None => println!("   {}  └─ to center: (not set)", child_prefix),
            }
        }
    }

    // Gyro
    println!("\n🌀 Gyro");
    println!("   ├─ Capacity: {} samples", config.gyro.capacity);
    println!("   └─ Sample period: {} µs", config.gyro.sample_period_us);

    println!();
}
