//! Ingestion Pipeline main entry

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{bounded, Receiver};
use contracts::{
    CameraId, Clock, DatagramTransport, FrameSink, FusionConfig, TransportKind, UpdateOutcome,
    VisionFrame,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{BackpressureConfig, IngestionMetrics};
use crate::decoder::WireDecoder;
use crate::decoders::{BinaryDecoder, JsonDecoder};
use crate::error::{IngestionError, Result};
use crate::listener::{spawn_listener, Datagram, UdpTransport};

/// Per-camera decoders of one datagram transport
enum CameraDecoders {
    Binary(Vec<BinaryDecoder>),
    Json(Vec<JsonDecoder>),
    /// Table cameras are polled, never routed
    Unrouted,
}

impl CameraDecoders {
    fn for_kind(kind: TransportKind) -> Self {
        match kind {
            TransportKind::BinaryUdp => Self::Binary(Vec::new()),
            TransportKind::JsonUdp => Self::Json(Vec::new()),
            TransportKind::Table => Self::Unrouted,
        }
    }

    fn cameras(&self) -> Vec<u32> {
        match self {
            Self::Binary(ds) => ds.iter().map(|d| d.camera_index()).collect(),
            Self::Json(ds) => ds.iter().map(|d| d.camera_index()).collect(),
            Self::Unrouted => Vec::new(),
        }
    }
}

/// Running totals for one routed datagram
#[derive(Default)]
struct RouteTally {
    accepted: usize,
    claimed: bool,
    unclaimed_misses: usize,
}

/// Routes each datagram through every registered camera's decoder
pub struct DatagramRouter {
    kind: TransportKind,
    decoders: CameraDecoders,
    sink: Arc<dyn FrameSink>,
    metrics: Arc<IngestionMetrics>,
}

impl DatagramRouter {
    pub fn new(kind: TransportKind, sink: Arc<dyn FrameSink>, metrics: Arc<IngestionMetrics>) -> Self {
        Self {
            kind,
            decoders: CameraDecoders::for_kind(kind),
            sink,
            metrics,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Register a camera; ignored for table transports.
    pub fn register_camera(&mut self, index: u32, identity: CameraId) {
        match &mut self.decoders {
            CameraDecoders::Binary(ds) => ds.push(BinaryDecoder::new(index, identity)),
            CameraDecoders::Json(ds) => ds.push(JsonDecoder::new(index, identity)),
            CameraDecoders::Unrouted => {
                warn!(camera = index, "table cameras are polled, not routed");
                return;
            }
        }
        debug!(camera = index, transport = %self.kind, "datagram decoder registered");
    }

    pub fn camera_count(&self) -> usize {
        self.decoders.cameras().len()
    }

    fn first_camera(&self) -> u32 {
        self.decoders.cameras().first().copied().unwrap_or(0)
    }

    /// Decode `bytes` for every camera and forward the frames.
    ///
    /// A JSON datagram is parsed once and shared by all cameras. Returns the
    /// number of frames the sink accepted. Decode failures are logged and
    /// counted, never returned.
    pub fn route(&self, bytes: &[u8], received_at_us: i64) -> usize {
        let mut tally = RouteTally::default();

        match &self.decoders {
            CameraDecoders::Binary(ds) => {
                for d in ds {
                    let outcome = d.decode(bytes, received_at_us);
                    self.handle(d.camera_index(), outcome, &mut tally);
                }
            }
            CameraDecoders::Json(ds) => match serde_json::from_slice::<Value>(bytes) {
                Ok(doc) => {
                    for d in ds {
                        let outcome = d.decode_value(&doc, received_at_us);
                        self.handle(d.camera_index(), outcome, &mut tally);
                    }
                }
                Err(e) => {
                    for d in ds {
                        let camera = d.camera_index();
                        let err = IngestionError::malformed(camera, format!("invalid JSON: {e}"));
                        self.handle(camera, Err(err), &mut tally);
                    }
                }
            },
            CameraDecoders::Unrouted => {}
        }

        if !tally.claimed && tally.unclaimed_misses > 0 {
            self.metrics.record_identity_mismatch();
            warn!(len = bytes.len(), "datagram matches no registered camera");
        }

        tally.accepted
    }

    fn handle(&self, camera: u32, outcome: Result<Option<VisionFrame>>, tally: &mut RouteTally) {
        match outcome {
            Ok(Some(frame)) => {
                tally.claimed = true;
                observability::record_packet_received(camera, self.kind);
                match self.sink.accept(frame) {
                    UpdateOutcome::Accepted => {
                        self.metrics.record_accepted();
                        tally.accepted += 1;
                    }
                    UpdateOutcome::Stale { current } => {
                        self.metrics.record_stale();
                        trace!(camera, current, "stale frame ignored");
                    }
                }
            }
            Ok(None) => {}
            // another camera's frame on a shared socket
            Err(IngestionError::IdentityMismatch { occurrences: 0, .. }) => {
                tally.unclaimed_misses += 1;
            }
            Err(e @ IngestionError::StaleUpdate { .. }) => {
                tally.claimed = true;
                self.metrics.record_decode_error(&e);
                observability::record_frame_stale(camera);
                trace!(camera, error = %e, "stale frame ignored");
            }
            Err(e) => {
                tally.claimed = true;
                self.metrics.record_decode_error(&e);
                observability::record_decode_error(camera, e.reason());
                warn!(camera, error = %e, "dropping frame");
            }
        }
    }
}

/// Ingestion Pipeline
///
/// Owns the listener and router tasks of one datagram transport.
pub struct IngestionPipeline {
    router: Arc<DatagramRouter>,
    config: BackpressureConfig,
    read_timeout: Duration,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl IngestionPipeline {
    /// Build decoders for every configured camera.
    pub fn new(config: &FusionConfig, sink: Arc<dyn FrameSink>) -> Self {
        let metrics = Arc::new(IngestionMetrics::new());
        let mut router = DatagramRouter::new(config.transport.kind, sink, metrics);
        for cam in &config.cameras {
            router.register_camera(cam.index, config.camera_id(cam.index));
        }

        Self {
            router: Arc::new(router),
            config: BackpressureConfig::from(&config.transport),
            read_timeout: Duration::from_millis(config.transport.read_timeout_ms.max(1)),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }

    pub fn router(&self) -> &DatagramRouter {
        &self.router
    }

    /// Bind a UDP socket at `addr` and start.
    ///
    /// # Errors
    /// `TransportUnavailable` if the socket cannot be bound
    #[instrument(name = "ingestion_bind_udp", skip_all, fields(addr = %addr))]
    pub async fn bind_udp(&mut self, addr: SocketAddr, clock: Arc<dyn Clock>) -> Result<SocketAddr> {
        let transport = UdpTransport::bind(addr, clock).await.map_err(|e| {
            let camera = self.router.first_camera();
            warn!(error = %e, "cannot bind vision socket; cameras on it report no data");
            IngestionError::transport_unavailable(camera, format!("bind {addr}: {e}"))
        })?;
        let local = transport
            .local_addr()
            .map_err(|e| IngestionError::transport_unavailable(self.router.first_camera(), e.to_string()))?;
        self.start(transport);
        Ok(local)
    }

    /// Start receiving from `transport`. A second call while running is ignored.
    #[instrument(name = "ingestion_start", skip_all, fields(transport = %transport.name()))]
    pub fn start<T>(&mut self, transport: T)
    where
        T: DatagramTransport + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = bounded(self.config.channel_capacity);
        info!(
            cameras = self.router.camera_count(),
            capacity = self.config.channel_capacity,
            "ingestion pipeline starting"
        );

        self.tasks.push(spawn_listener(
            transport,
            tx,
            self.router.metrics.clone(),
            self.config.drop_policy,
            self.read_timeout,
            self.running.clone(),
        ));
        self.tasks.push(Self::spawn_router(self.router.clone(), rx));
    }

    fn spawn_router(router: Arc<DatagramRouter>, rx: Receiver<Datagram>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok(datagram) = rx.recv().await {
                router.metrics.update_queue_len(rx.len());
                router.route(&datagram.bytes, datagram.received_at_us);
            }
            debug!("router stopped");
        })
    }

    /// Stop the listener; the router drains and exits once the channel closes.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("ingestion pipeline stopping");
        }
    }

    /// Stop and wait for both tasks.
    pub async fn shutdown(&mut self) {
        self.stop();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "ingestion task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.router.metrics.clone()
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
