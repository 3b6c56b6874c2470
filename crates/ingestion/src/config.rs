//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::TransportConfig;
pub use contracts::DropPolicy;

use crate::error::IngestionError;

/// Backpressure configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Channel capacity
    pub channel_capacity: usize,

    /// Drop policy when full
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

impl BackpressureConfig {
    /// Create new backpressure configuration
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            drop_policy,
        }
    }
}

impl From<&TransportConfig> for BackpressureConfig {
    fn from(config: &TransportConfig) -> Self {
        Self::new(config.channel_capacity, config.drop_policy)
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Datagrams / table reads received
    pub packets_received: AtomicU64,

    /// Datagrams dropped by backpressure
    pub packets_dropped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,

    /// Frames accepted by the sink
    pub frames_accepted: AtomicU64,

    /// Frames rejected as stale (decoder or sink)
    pub frames_stale: AtomicU64,

    /// Structurally invalid frames
    pub malformed_frames: AtomicU64,

    /// Frames for another identity
    pub identity_mismatches: AtomicU64,

    /// Socket receive errors, timeouts excluded
    pub transport_errors: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.frames_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.frames_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_identity_mismatch(&self) {
        self.identity_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a decode failure under its kind
    pub fn record_decode_error(&self, err: &IngestionError) {
        let counter = match err {
            IngestionError::MalformedFrame { .. } => &self.malformed_frames,
            IngestionError::IdentityMismatch { .. } => &self.identity_mismatches,
            IngestionError::StaleUpdate { .. } => &self.frames_stale,
            IngestionError::TransportUnavailable { .. } | IngestionError::ChannelClosed { .. } => {
                &self.transport_errors
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_stale: self.frames_stale.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            identity_mismatches: self.identity_mismatches.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub queue_len: usize,
    pub frames_accepted: u64,
    pub frames_stale: u64,
    pub malformed_frames: u64,
    pub identity_mismatches: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// Malformed plus identity failures
    pub fn decode_errors(&self) -> u64 {
        self.malformed_frames + self.identity_mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_by_kind() {
        let metrics = IngestionMetrics::new();
        metrics.record_decode_error(&IngestionError::malformed(0, "short"));
        metrics.record_decode_error(&IngestionError::identity_mismatch(0, "cam0", 0));
        metrics.record_decode_error(&IngestionError::StaleUpdate {
            camera: 0,
            update: 1,
            last: 1,
        });

        let snap = metrics.snapshot();
        assert_eq!(snap.malformed_frames, 1);
        assert_eq!(snap.identity_mismatches, 1);
        assert_eq!(snap.frames_stale, 1);
        assert_eq!(snap.decode_errors(), 2);
    }

    #[test]
    fn test_backpressure_from_transport() {
        let transport = TransportConfig {
            channel_capacity: 0,
            drop_policy: DropPolicy::DropNewest,
            ..Default::default()
        };
        let bp = BackpressureConfig::from(&transport);
        assert_eq!(bp.channel_capacity, 1);
        assert_eq!(bp.drop_policy, DropPolicy::DropNewest);
    }
}
