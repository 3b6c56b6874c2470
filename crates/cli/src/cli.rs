//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Vision Fusion - vision/gyro fusion layer for robot pose estimation
#[derive(Parser, Debug)]
#[command(
    name = "vision-fusion",
    author,
    version,
    about = "Vision/gyro fusion layer",
    long_about = "Receives camera pose estimates over a polled table, binary UDP or JSON UDP,\n\
                  pairs them with gyro history and exposes the latest result per camera."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "VISION_FUSION_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "VISION_FUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fusion engine against the configured transport
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Publish synthetic camera frames over UDP
    Emit(EmitArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "VISION_FUSION_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the UDP bind address from configuration
    #[arg(long, env = "VISION_FUSION_BIND")]
    pub bind: Option<String>,

    /// Per-camera status print period in milliseconds
    #[arg(long, default_value = "1000", env = "VISION_FUSION_STATUS_INTERVAL_MS")]
    pub status_interval_ms: u64,

    /// Stop after this many results were read (0 = unlimited)
    #[arg(long, default_value = "0", env = "VISION_FUSION_MAX_RESULTS")]
    pub max_results: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "VISION_FUSION_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "VISION_FUSION_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show camera mounting transforms
    #[arg(long)]
    pub transforms: bool,
}

/// Arguments for the `emit` command
#[derive(Parser, Debug, Clone)]
pub struct EmitArgs {
    /// Address of the fusion process
    #[arg(short, long, default_value = "127.0.0.1:5800")]
    pub target: SocketAddr,

    /// Camera-name prefix (table name)
    #[arg(long, default_value = "limelight")]
    pub table_name: String,

    /// Camera index appended to the table name
    #[arg(long, default_value = "0")]
    pub camera: u32,

    /// Number of frames to send
    #[arg(short = 'n', long, default_value = "10")]
    pub count: u64,

    /// Wire encoding
    #[arg(long, value_enum, default_value = "json")]
    pub mode: EmitMode,

    /// Delay between frames in milliseconds
    #[arg(long, default_value = "20")]
    pub interval_ms: u64,

    /// First update number to publish
    #[arg(long, default_value = "1")]
    pub start_update: u64,
}

/// Wire encoding used by `emit`
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmitMode {
    /// JSON object keyed by camera identity
    #[default]
    Json,
    /// Big-endian binary frame
    Binary,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "vision-fusion",
            "-v",
            "run",
            "--config",
            "fusion.toml",
            "--status-interval-ms",
            "250",
            "--timeout",
            "5",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("fusion.toml"));
                assert_eq!(args.status_interval_ms, 250);
                assert_eq!(args.timeout, 5);
                assert!(args.bind.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_emit_args() {
        let cli = Cli::parse_from([
            "vision-fusion",
            "emit",
            "--target",
            "10.0.0.2:5801",
            "--camera",
            "2",
            "-n",
            "3",
            "--mode",
            "binary",
        ]);
        match cli.command {
            Commands::Emit(args) => {
                assert_eq!(args.target, "10.0.0.2:5801".parse().unwrap());
                assert_eq!(args.camera, 2);
                assert_eq!(args.count, 3);
                assert_eq!(args.mode, EmitMode::Binary);
                assert_eq!(args.table_name, "limelight");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_flags_map_to_observability_config() {
        let cli = Cli::parse_from([
            "vision-fusion",
            "--log-format",
            "json",
            "-vv",
            "info",
            "-c",
            "fusion.toml",
        ]);
        let config = observability::ObservabilityConfig::from_verbosity(
            cli.log_format.into(),
            cli.verbose,
            cli.quiet,
        );
        assert_eq!(config.log_format, observability::LogFormat::Json);
        assert_eq!(config.default_log_level, "trace");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["vision-fusion", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
