//! Polling-array decoder
//!
//! Layout: `[x, y, z, roll, pitch, yaw, timestamp, n, tag_0 .. tag_{n-1}, ambiguity]`.
//! The update sequence comes from the table's update counter, not the array.

use contracts::{FrameMode, Pose3, TransportKind, VisionFrame, YawSource, SENTINEL_COORDINATE};

use crate::decoder::{check_tag_count, WireDecoder};
use crate::error::{IngestionError, Result};

/// Array published before the camera's first estimate
pub const PLACEHOLDER_ARRAY: [f64; 7] = [SENTINEL_COORDINATE; 7];

const TIMESTAMP_INDEX: usize = 6;
const COUNT_INDEX: usize = 7;
const FIRST_TAG_INDEX: usize = 8;

/// One poll of a camera's table entry
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayReading {
    pub values: Vec<f64>,
    pub update_number: i64,
}

impl ArrayReading {
    pub fn new(values: Vec<f64>, update_number: i64) -> Self {
        Self {
            values,
            update_number,
        }
    }
}

/// Decoder for polled numeric arrays
#[derive(Debug, Clone)]
pub struct ArrayDecoder {
    camera: u32,
}

impl ArrayDecoder {
    pub fn new(camera: u32) -> Self {
        Self { camera }
    }

    fn integral(&self, value: f64, what: &str) -> Result<i64> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(IngestionError::malformed(
                self.camera,
                format!("{what} must be an integer, got {value}"),
            ));
        }
        if value < i64::MIN as f64 || value >= i64::MAX as f64 {
            return Err(IngestionError::malformed(
                self.camera,
                format!("{what} out of range: {value}"),
            ));
        }
        Ok(value as i64)
    }

    fn tag_id(&self, value: f64) -> Result<i32> {
        let id = self.integral(value, "tag id")?;
        i32::try_from(id).map_err(|_| {
            IngestionError::malformed(self.camera, format!("tag id {id} out of range"))
        })
    }
}

impl WireDecoder for ArrayDecoder {
    type Input = ArrayReading;

    fn transport(&self) -> TransportKind {
        TransportKind::Table
    }

    fn camera_index(&self) -> u32 {
        self.camera
    }

    fn decode(&self, input: &ArrayReading, _received_at_us: i64) -> Result<Option<VisionFrame>> {
        let values = &input.values;

        if input.update_number <= 0 || values.is_empty() || values[..] == PLACEHOLDER_ARRAY[..] {
            return Ok(None);
        }

        if values.len() <= COUNT_INDEX {
            return Err(IngestionError::malformed(
                self.camera,
                format!("array too short: {} values", values.len()),
            ));
        }

        let declared = self.integral(values[COUNT_INDEX], "tag count")?;
        if declared < 0 {
            return Err(IngestionError::malformed(
                self.camera,
                format!("negative tag count {declared}"),
            ));
        }
        let declared = usize::try_from(declared).unwrap_or(usize::MAX);

        let ambiguity_index = FIRST_TAG_INDEX.saturating_add(declared);
        if ambiguity_index >= values.len() {
            return Err(IngestionError::malformed(
                self.camera,
                format!(
                    "{declared} tags declared but array holds {} values",
                    values.len()
                ),
            ));
        }

        let tag_ids = values[FIRST_TAG_INDEX..ambiguity_index]
            .iter()
            .map(|&v| self.tag_id(v))
            .collect::<Result<Vec<i32>>>()?;
        check_tag_count(self.camera, declared, &tag_ids)?;

        let pose = Pose3::from_components([
            values[0], values[1], values[2], values[3], values[4], values[5],
        ]);

        Ok(Some(VisionFrame {
            camera_index: self.camera,
            update_seq: input.update_number as u64,
            capture_timestamp: self.integral(values[TIMESTAMP_INDEX].round(), "timestamp")?,
            mode: FrameMode::pose(pose, None, values[ambiguity_index]),
            tag_ids,
            tag_corners: Vec::new(),
            yaw_source: YawSource::Vision,
        }))
    }
}
