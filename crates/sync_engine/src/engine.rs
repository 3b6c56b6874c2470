//! Fusion engine: the assembled core and its outbound API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use contracts::{
    CameraId, Clock, FrameSink, FusionConfig, GyroSource, Pose3, StrobeInput, TableTransport,
    Transform3, UpdateOutcome, VisionFrame, VisionResult, YawSource,
};
use tracing::{debug, instrument};

use crate::buffer::GyroSampleBuffer;
use crate::cache::ResultCache;
use crate::correlator::{Correlated, Correlator};
use crate::novelty::NoveltyTracker;
use crate::sampler::{GyroSampler, SharedGyroBuffer};
use crate::transform::PoseCenterTransform;

/// Per-camera state owned by the engine
#[derive(Debug)]
struct CameraState {
    id: CameraId,
    strobe_enabled: AtomicBool,
    gyro: SharedGyroBuffer,
}

/// Running totals since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub accepted: u64,
    pub stale: u64,
    pub gyro_matched: u64,
    pub gyro_fallback: u64,
}

#[derive(Debug, Default)]
struct EngineCounters {
    accepted: AtomicU64,
    stale: AtomicU64,
    gyro_matched: AtomicU64,
    gyro_fallback: AtomicU64,
}

/// Vision/gyro fusion engine
///
/// Decoders feed it through [`FrameSink`]; the rest of the robot program
/// reads it through [`get_result`](Self::get_result),
/// [`has_new_update`](Self::has_new_update),
/// [`set_camera_to_center`](Self::set_camera_to_center) and
/// [`camera_pose_to_robot_center`](Self::camera_pose_to_robot_center).
pub struct FusionEngine {
    cameras: HashMap<u32, CameraState>,
    cache: ResultCache,
    transforms: PoseCenterTransform,
    /// Last sequence handed out by `get_result`, per camera
    read_cursors: Mutex<HashMap<u32, u64>>,
    table: RwLock<Option<Arc<dyn TableTransport>>>,
    counters: EngineCounters,
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("cameras", &self.camera_indices())
            .field("cache", &self.cache)
            .finish()
    }
}

impl FusionEngine {
    /// Build the engine for every configured camera.
    pub fn new(config: &FusionConfig) -> Self {
        let cameras = config
            .cameras
            .iter()
            .map(|c| {
                let state = CameraState {
                    id: config.camera_id(c.index),
                    strobe_enabled: AtomicBool::new(c.strobe_enabled),
                    gyro: Arc::new(RwLock::new(GyroSampleBuffer::new(config.gyro.capacity))),
                };
                (c.index, state)
            })
            .collect();

        let transforms = PoseCenterTransform::with_transforms(
            config
                .cameras
                .iter()
                .filter_map(|c| c.camera_to_center.map(|t| (c.index, t))),
        );

        debug!(
            cameras = config.cameras.len(),
            gyro_capacity = config.gyro.capacity,
            "fusion engine created"
        );

        Self {
            cameras,
            cache: ResultCache::new(),
            transforms,
            read_cursors: Mutex::new(HashMap::new()),
            table: RwLock::new(None),
            counters: EngineCounters::default(),
        }
    }

    /// Attach the table transport used for connection status.
    pub fn attach_table(&self, table: Arc<dyn TableTransport>) {
        let mut slot = match self.table.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(table);
    }

    /// Configured camera indices, ascending.
    pub fn camera_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.cameras.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn camera_id(&self, camera: u32) -> Option<&CameraId> {
        self.cameras.get(&camera).map(|c| &c.id)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Independent novelty cursor for `camera`.
    pub fn novelty_tracker(&self, camera: u32) -> NoveltyTracker {
        NoveltyTracker::new(camera)
    }

    // ===== Gyro side =====

    pub fn gyro_buffer(&self, camera: u32) -> Option<SharedGyroBuffer> {
        self.cameras.get(&camera).map(|c| Arc::clone(&c.gyro))
    }

    /// Push a gyro sample directly, bypassing the strobe sampler.
    pub fn record_gyro(&self, camera: u32, angle: f64, timestamp: i64) -> bool {
        let Some(state) = self.cameras.get(&camera) else {
            return false;
        };
        let mut buffer = match state.gyro.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffer.push(angle, timestamp);
        observability::record_buffer_depth(camera, buffer.len());
        true
    }

    /// Strobe sampler writing into `camera`'s history.
    pub fn sampler(
        &self,
        camera: u32,
        strobe: Arc<dyn StrobeInput>,
        gyro: Arc<dyn GyroSource>,
        clock: Arc<dyn Clock>,
    ) -> Option<GyroSampler> {
        self.gyro_buffer(camera)
            .map(|buffer| GyroSampler::new(camera, strobe, gyro, clock, buffer))
    }

    pub fn set_strobe_enabled(&self, camera: u32, enabled: bool) {
        if let Some(state) = self.cameras.get(&camera) {
            state.strobe_enabled.store(enabled, Ordering::SeqCst);
        }
    }

    pub fn strobe_enabled(&self, camera: u32) -> bool {
        self.cameras
            .get(&camera)
            .map(|c| c.strobe_enabled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    // ===== Vision side =====

    /// Correlate `frame` with the gyro history and offer it to the cache.
    #[instrument(
        level = "trace",
        name = "fusion_engine_ingest",
        skip(self, frame),
        fields(camera = frame.camera_index, update_seq = frame.update_seq)
    )]
    pub fn ingest(&self, frame: VisionFrame) -> UpdateOutcome {
        let camera = frame.camera_index;

        // Cheap pre-check so stale frames skip the gyro scan
        let current = self.cache.update_number(camera);
        if current > 0 && frame.update_seq <= current {
            self.counters.stale.fetch_add(1, Ordering::Relaxed);
            observability::record_frame_stale(camera);
            return UpdateOutcome::Stale { current };
        }

        let Correlated { frame, lag_us } = self.correlate(frame);
        let accepted = frame.clone();

        let outcome = self.cache.update(frame);
        match outcome {
            UpdateOutcome::Accepted => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                match accepted.yaw_source {
                    YawSource::Vision => {}
                    YawSource::Gyro => {
                        self.counters.gyro_matched.fetch_add(1, Ordering::Relaxed);
                    }
                    YawSource::GyroFallback => {
                        self.counters.gyro_fallback.fetch_add(1, Ordering::Relaxed);
                        observability::record_gyro_fallback(camera);
                    }
                }
                observability::record_frame_accepted(&accepted, lag_us);
            }
            UpdateOutcome::Stale { .. } => {
                self.counters.stale.fetch_add(1, Ordering::Relaxed);
                observability::record_frame_stale(camera);
            }
        }
        outcome
    }

    fn correlate(&self, frame: VisionFrame) -> Correlated {
        let Some(state) = self.cameras.get(&frame.camera_index) else {
            return Correlated {
                frame,
                lag_us: None,
            };
        };
        let strobe_enabled = state.strobe_enabled.load(Ordering::SeqCst);
        let buffer = match state.gyro.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Correlator::new(&buffer).correlate(frame, strobe_enabled)
    }

    // ===== Outbound API =====

    /// Latest result for `camera`; marks it read for [`has_new_update`](Self::has_new_update).
    pub fn get_result(&self, camera: u32) -> VisionResult {
        let result = self.cache.get(camera);
        let mut cursors = match self.read_cursors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cursor = cursors.entry(camera).or_insert(0);
        *cursor = (*cursor).max(result.last_observed_seq);
        result
    }

    /// Whether `camera` has a result newer than the last `get_result`.
    pub fn has_new_update(&self, camera: u32) -> bool {
        let last_seen = match self.read_cursors.lock() {
            Ok(guard) => guard.get(&camera).copied().unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(&camera).copied().unwrap_or(0),
        };
        self.cache.has_new_update(camera, last_seen)
    }

    pub fn set_camera_to_center(&self, camera: u32, transform: Transform3) {
        debug!(camera, ?transform, "camera to center transform set");
        self.transforms.set_transform(camera, transform);
    }

    /// Robot-center pose from a camera pose, or the sentinel pose when
    /// no transform is configured for `camera`.
    pub fn camera_pose_to_robot_center(&self, camera: u32, pose: &Pose3) -> Pose3 {
        self.transforms.to_robot_center(camera, pose)
    }

    /// Robot-center pose of the latest result, if it carries a pose.
    pub fn robot_center_pose(&self, camera: u32) -> Option<Pose3> {
        let result = self.cache.get(camera);
        if !result.has_data() {
            return None;
        }
        result
            .camera_pose()
            .map(|pose| self.camera_pose_to_robot_center(camera, pose))
    }

    /// Connection flag reported by the camera.
    ///
    /// Without a table transport a camera counts as connected once it has
    /// produced a result.
    pub fn is_camera_connected(&self, camera: u32) -> bool {
        let table = match self.table.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match (table, self.cameras.get(&camera)) {
            (Some(table), Some(state)) => table.is_connected(&state.id),
            (Some(_), None) => false,
            (None, _) => self.cache.update_number(camera) > 0,
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            gyro_matched: self.counters.gyro_matched.load(Ordering::Relaxed),
            gyro_fallback: self.counters.gyro_fallback.load(Ordering::Relaxed),
        }
    }
}

impl FrameSink for FusionEngine {
    fn accept(&self, frame: VisionFrame) -> UpdateOutcome {
        self.ingest(frame)
    }
}
