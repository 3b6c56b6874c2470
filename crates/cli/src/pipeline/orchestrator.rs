//! Pipeline orchestrator - coordinates all components.
//!
//! Binds the configured datagram transport, feeds the fusion engine and
//! reports per-camera status until shutdown, timeout or the result limit.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{Clock, FusionConfig, MonotonicClock, Pose3, TransportKind};
use ingestion::IngestionPipeline;
use sync_engine::FusionEngine;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded fusion configuration
    pub fusion: FusionConfig,

    /// Status report period
    pub status_interval: Duration,

    /// Maximum number of results to read (None = unlimited)
    pub max_results: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or the result limit is hit
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let fusion = &self.config.fusion;

        if fusion.transport.kind == TransportKind::Table {
            return Err(CliError::unsupported_transport(
                fusion.transport.kind,
                "no table client is linked into this binary; embed ingestion::TablePoller instead",
            )
            .into());
        }

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let bind_addr: SocketAddr = fusion
            .transport
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", fusion.transport.bind_addr))?;

        // Setup fusion engine and ingestion
        let engine = Arc::new(FusionEngine::new(fusion));
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let mut ingestion = IngestionPipeline::new(fusion, engine.clone());
        let local_addr = ingestion
            .bind_udp(bind_addr, clock)
            .await
            .map_err(CliError::from)?;

        info!(
            addr = %local_addr,
            transport = %fusion.transport.kind,
            cameras = fusion.cameras.len(),
            "Listening for vision frames"
        );

        let mut stats = PipelineStats {
            cameras: fusion.cameras.len(),
            ..Default::default()
        };

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(shutdown);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.config.status_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    report_status(&engine, &mut stats);
                    if let Some(max) = self.config.max_results {
                        if stats.results_read >= max {
                            info!(results = stats.results_read, "Reached max results limit");
                            break;
                        }
                    }
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    break;
                }
                _ = &mut deadline => {
                    warn!(
                        timeout_secs = self.config.timeout.map(|t| t.as_secs_f64()),
                        "Pipeline timed out"
                    );
                    break;
                }
            }
        }

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.shutdown().await;

        stats.ingestion = ingestion.metrics().snapshot();
        stats.engine = engine.stats();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.results_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Read every camera that has a new result and log its status.
///
/// Returns the number of results read.
pub(crate) fn report_status(engine: &FusionEngine, stats: &mut PipelineStats) -> usize {
    let mut read = 0;

    for camera in engine.camera_indices() {
        if !engine.has_new_update(camera) {
            continue;
        }

        let result = engine.get_result(camera);
        read += 1;
        stats.results_read += 1;
        stats.fusion_metrics.record_accepted(&result.frame, None);

        let robot = engine.robot_center_pose(camera);
        info!(
            camera,
            connected = engine.is_camera_connected(camera),
            update_seq = result.update_seq(),
            capture_us = result.frame.capture_timestamp,
            tags = result.frame.tag_count(),
            yaw_source = ?result.frame.yaw_source,
            camera_pose = %result.camera_pose().map(format_pose).unwrap_or_else(|| "-".into()),
            robot_pose = %robot.as_ref().map(format_pose).unwrap_or_else(|| "-".into()),
            "Camera result"
        );
    }

    read
}

fn format_pose(pose: &Pose3) -> String {
    let [x, y, z, roll, pitch, yaw] = pose.components();
    format!("({x:.3}, {y:.3}, {z:.3} | {roll:.3}, {pitch:.3}, {yaw:.3})")
}
