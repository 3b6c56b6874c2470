//! Polling-array ingestion
//!
//! Each poll reads every camera's update counter and only decodes the array
//! when the counter moved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use contracts::{CameraId, Clock, FrameSink, TableTransport, TransportKind, UpdateOutcome};
use tracing::{debug, trace, warn};

use crate::config::IngestionMetrics;
use crate::decoder::WireDecoder;
use crate::decoders::{ArrayDecoder, ArrayReading};

struct PolledCamera {
    identity: CameraId,
    decoder: ArrayDecoder,
}

/// Polls a [`TableTransport`] and feeds decoded frames to a sink
pub struct TablePoller {
    table: Arc<dyn TableTransport>,
    cameras: Vec<PolledCamera>,
    sink: Arc<dyn FrameSink>,
    clock: Arc<dyn Clock>,
    metrics: Arc<IngestionMetrics>,
    /// Last update counter seen per camera
    seen: Mutex<HashMap<u32, i64>>,
}

impl TablePoller {
    pub fn new(
        table: Arc<dyn TableTransport>,
        sink: Arc<dyn FrameSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            table,
            cameras: Vec::new(),
            sink,
            clock,
            metrics: Arc::new(IngestionMetrics::new()),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Poll `identity` as camera `index`.
    pub fn register_camera(&mut self, index: u32, identity: CameraId) {
        debug!(camera = index, identity = %identity, "table camera registered");
        self.cameras.push(PolledCamera {
            identity,
            decoder: ArrayDecoder::new(index),
        });
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    fn last_seen(&self, camera: u32) -> i64 {
        let seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.get(&camera).copied().unwrap_or(0)
    }

    fn mark_seen(&self, camera: u32, update_number: i64) {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(camera, update_number);
    }

    /// Poll every camera once; returns the number of accepted frames.
    pub fn poll_once(&self) -> usize {
        let now = self.clock.now_micros();
        let mut accepted = 0;

        for cam in &self.cameras {
            let index = cam.decoder.camera_index();
            let update_number = self.table.update_number(&cam.identity);

            if self.last_seen(index) == update_number {
                continue;
            }

            // the counter may be published ahead of the array; retry next poll
            let Some(values) = self.table.read_array(&cam.identity) else {
                continue;
            };
            self.mark_seen(index, update_number);
            self.metrics.record_received();
            observability::record_packet_received(index, TransportKind::Table);

            let reading = ArrayReading::new(values, update_number);
            match cam.decoder.decode(&reading, now) {
                Ok(Some(frame)) => match self.sink.accept(frame) {
                    UpdateOutcome::Accepted => {
                        self.metrics.record_accepted();
                        accepted += 1;
                    }
                    UpdateOutcome::Stale { current } => {
                        self.metrics.record_stale();
                        trace!(camera = index, update_number, current, "stale table update");
                    }
                },
                Ok(None) => {
                    trace!(camera = index, "table entry holds no estimate yet");
                }
                Err(e) => {
                    self.metrics.record_decode_error(&e);
                    observability::record_decode_error(index, e.reason());
                    warn!(camera = index, error = %e, "dropping table entry");
                }
            }
        }

        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryTable;
    use contracts::{ManualClock, VisionFrame};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        frames: StdMutex<Vec<VisionFrame>>,
    }

    impl FrameSink for RecordingSink {
        fn accept(&self, frame: VisionFrame) -> UpdateOutcome {
            self.frames.lock().unwrap().push(frame);
            UpdateOutcome::Accepted
        }
    }

    fn poller(table: Arc<MemoryTable>, sink: Arc<RecordingSink>) -> TablePoller {
        let mut p = TablePoller::new(table, sink, Arc::new(ManualClock::new(0)));
        p.register_camera(0, CameraId::new("cam0"));
        p.register_camera(1, CameraId::new("cam1"));
        p
    }

    #[test]
    fn test_poll_decodes_only_changed_entries() {
        let table = Arc::new(MemoryTable::new());
        let sink = Arc::new(RecordingSink::default());
        let p = poller(table.clone(), sink.clone());

        table.publish("cam0", vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 500.0, 2.0, 7.0, 9.0, 0.5]);
        assert_eq!(p.poll_once(), 1);
        assert_eq!(p.poll_once(), 0);

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].camera_index, 0);
        assert_eq!(frames[0].update_seq, 1);
        assert_eq!(frames[0].tag_ids, vec![7, 9]);
    }

    #[test]
    fn test_malformed_entry_is_counted_and_skipped() {
        let table = Arc::new(MemoryTable::new());
        let sink = Arc::new(RecordingSink::default());
        let p = poller(table.clone(), sink.clone());

        table.publish("cam1", vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 9.0, 0.5]);
        assert_eq!(p.poll_once(), 0);
        assert_eq!(p.metrics().snapshot().malformed_frames, 1);
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    /// Table whose update counter can run ahead of its array
    #[derive(Default)]
    struct SplitTable {
        update: StdMutex<i64>,
        values: StdMutex<Option<Vec<f64>>>,
    }

    impl TableTransport for SplitTable {
        fn read_array(&self, _camera: &str) -> Option<Vec<f64>> {
            self.values.lock().unwrap().clone()
        }

        fn update_number(&self, camera: &str) -> i64 {
            if camera == "cam0" {
                *self.update.lock().unwrap()
            } else {
                0
            }
        }

        fn is_connected(&self, _camera: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_counter_ahead_of_array_is_retried() {
        let table = Arc::new(SplitTable::default());
        let sink = Arc::new(RecordingSink::default());
        let mut p = TablePoller::new(table.clone(), sink.clone(), Arc::new(ManualClock::new(0)));
        p.register_camera(0, CameraId::new("cam0"));

        *table.update.lock().unwrap() = 1;
        assert_eq!(p.poll_once(), 0);

        *table.values.lock().unwrap() =
            Some(vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 500.0, 1.0, 4.0, 0.2]);
        assert_eq!(p.poll_once(), 1);
        assert_eq!(p.poll_once(), 0);

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].update_seq, 1);
        assert_eq!(frames[0].tag_ids, vec![4]);
    }

    #[test]
    fn test_placeholder_is_ignored() {
        let table = Arc::new(MemoryTable::new());
        let sink = Arc::new(RecordingSink::default());
        let p = poller(table.clone(), sink.clone());

        table.publish("cam0", crate::decoders::PLACEHOLDER_ARRAY.to_vec());
        assert_eq!(p.poll_once(), 0);
        assert_eq!(p.metrics().snapshot().decode_errors(), 0);
    }
}
