//! Pipeline statistics and metrics.

use std::time::Duration;

use ingestion::MetricsSnapshot;
use observability::FusionMetricsAggregator;
use sync_engine::EngineStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Results read through `get_result`
    pub results_read: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of configured cameras
    pub cameras: usize,

    /// Transport-side counters
    pub ingestion: MetricsSnapshot,

    /// Fusion engine counters
    pub engine: EngineStats,

    /// Aggregated over the results that were read
    pub fusion_metrics: FusionMetricsAggregator,
}

impl PipelineStats {
    /// Results read per second
    pub fn results_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.results_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Datagrams that never became a result, as percentage of received
    pub fn rejection_rate(&self) -> f64 {
        let received = self.ingestion.packets_received;
        if received > 0 {
            let rejected = self.ingestion.packets_dropped
                + self.ingestion.frames_stale
                + self.ingestion.decode_errors();
            (rejected as f64 / received as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Cameras: {}", self.cameras);
        println!("   ├─ Results read: {}", self.results_read);
        println!("   └─ Results/s: {:.2}", self.results_per_sec());

        let ingest = &self.ingestion;
        println!("\n📥 Ingestion");
        println!("   ├─ Datagrams received: {}", ingest.packets_received);
        println!("   ├─ Dropped (backpressure): {}", ingest.packets_dropped);
        println!("   ├─ Stale updates: {}", ingest.frames_stale);
        println!("   ├─ Malformed: {}", ingest.malformed_frames);
        println!("   ├─ Identity mismatches: {}", ingest.identity_mismatches);
        println!("   ├─ Transport errors: {}", ingest.transport_errors);
        println!("   └─ Rejection rate: {:.2}%", self.rejection_rate());

        println!("\n🧭 Fusion Engine");
        println!("   ├─ Accepted frames: {}", self.engine.accepted);
        println!("   ├─ Stale frames: {}", self.engine.stale);
        println!("   ├─ Gyro yaw matched: {}", self.engine.gyro_matched);
        println!("   └─ Gyro fallback: {}", self.engine.gyro_fallback);

        let summary = self.fusion_metrics.summary();
        if summary.accepted_frames > 0 {
            println!("\n📈 Results Read");
            println!("   ├─ With gyro yaw: {}", summary.gyro_yaw_frames);
            println!("   ├─ Gyro fallback: {}", summary.fallback_frames);
            println!("   └─ Ambiguity: {}", summary.ambiguity);

            let mut per_camera: Vec<_> = self.fusion_metrics.per_camera.iter().collect();
            per_camera.sort_unstable();
            println!("\n📷 Per Camera");
            for (i, (camera, count)) in per_camera.iter().enumerate() {
                let prefix = if i == per_camera.len() - 1 { "└─" } else { "├─" };
                println!("   {} camera {}: {}", prefix, camera, count);
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_traffic() {
        let stats = PipelineStats::default();
        assert_eq!(stats.results_per_sec(), 0.0);
        assert_eq!(stats.rejection_rate(), 0.0);
    }

    #[test]
    fn test_rejection_rate() {
        let stats = PipelineStats {
            results_read: 6,
            duration: Duration::from_secs(2),
            ingestion: MetricsSnapshot {
                packets_received: 10,
                packets_dropped: 1,
                frames_stale: 2,
                malformed_frames: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(stats.results_per_sec(), 3.0);
        assert!((stats.rejection_rate() - 40.0).abs() < 1e-9);
    }
}
