//! JSON UDP decoder
//!
//! One datagram carries an object keyed by camera identity:
//!
//! ```json
//! {"cam0": {"Mode": 0, "Update": 12, "Timestamp": 4.5, "Tags": [3, 7],
//!           "Pose1": {"tX": 1.0, ...}, "Pose2": {...}, "Ambig": 0.1}}
//! ```
//!
//! Publishers are inconsistent about scalar encoding, so every number may
//! also arrive as a string, and `Tags` may be a rendering like `"[3 7]"`.

use contracts::{
    CameraId, FrameMode, Point2, Pose3, TagCorners, TransportKind, VisionFrame, YawSource,
};
use serde_json::{Map, Value};

use crate::decoder::{check_tag_count, WireDecoder};
use crate::error::{IngestionError, Result};

const POSE_KEYS: [&str; 6] = ["tX", "tY", "tZ", "rX", "rY", "rZ"];

/// Decoder for JSON datagrams addressed to one camera
#[derive(Debug, Clone)]
pub struct JsonDecoder {
    camera: u32,
    identity: CameraId,
}

impl JsonDecoder {
    pub fn new(camera: u32, identity: CameraId) -> Self {
        Self { camera, identity }
    }

    pub fn identity(&self) -> &CameraId {
        &self.identity
    }

    /// Decode an already parsed document.
    pub fn decode_value(&self, doc: &Value, received_at_us: i64) -> Result<Option<VisionFrame>> {
        let root = doc
            .as_object()
            .ok_or_else(|| self.malformed("top level is not an object"))?;

        let Some(entry) = root.get(self.identity.as_str()) else {
            return Ok(None);
        };
        let data = entry
            .as_object()
            .ok_or_else(|| self.malformed("camera entry is not an object"))?;

        let mode_code = self.integer(data, "Mode")?;
        let update = self.integer(data, "Update")?;
        if update < 0 {
            return Err(self.malformed(format!("negative update number {update}")));
        }

        let capture_timestamp = self.capture_timestamp(data, received_at_us)?;

        let tag_ids = self.tags(require(data, "Tags").map_err(|k| self.missing(k))?)?;
        if data.contains_key("NumTags") {
            let declared = self.integer(data, "NumTags")?;
            if declared < 0 {
                return Err(self.malformed(format!("negative tag count {declared}")));
            }
            check_tag_count(self.camera, declared as usize, &tag_ids)?;
        }

        let tag_corners = match data.get("TagCorners") {
            Some(v) => self.corners(v)?,
            None => Vec::new(),
        };
        if !tag_corners.is_empty() && tag_corners.len() != tag_ids.len() {
            return Err(self.malformed(format!(
                "{} tag corner sets for {} tags",
                tag_corners.len(),
                tag_ids.len()
            )));
        }

        let mode = match mode_code {
            0 => {
                let primary = self.pose(require(data, "Pose1").map_err(|k| self.missing(k))?)?;
                let alternate = data.get("Pose2").map(|v| self.pose(v)).transpose()?;
                let ambiguity = self.number(data, "Ambig")?;
                FrameMode::pose(primary, alternate, ambiguity)
            }
            1 => FrameMode::Tags,
            other => return Err(self.malformed(format!("unknown mode {other}"))),
        };

        Ok(Some(VisionFrame {
            camera_index: self.camera,
            update_seq: update as u64,
            capture_timestamp,
            mode,
            tag_ids,
            tag_corners,
            yaw_source: YawSource::Vision,
        }))
    }

    fn malformed(&self, message: impl Into<String>) -> IngestionError {
        IngestionError::malformed(self.camera, message)
    }

    fn missing(&self, key: &str) -> IngestionError {
        self.malformed(format!("missing field '{key}'"))
    }

    fn number(&self, data: &Map<String, Value>, key: &str) -> Result<f64> {
        let value = require(data, key).map_err(|k| self.missing(k))?;
        scalar(value).ok_or_else(|| self.malformed(format!("'{key}' is not a number: {value}")))
    }

    fn integer(&self, data: &Map<String, Value>, key: &str) -> Result<i64> {
        let n = self.number(data, key)?;
        if !n.is_finite() || n.fract() != 0.0 {
            return Err(self.malformed(format!("'{key}' is not an integer: {n}")));
        }
        if n < i64::MIN as f64 || n >= i64::MAX as f64 {
            return Err(self.malformed(format!("'{key}' out of range: {n}")));
        }
        Ok(n as i64)
    }

    /// `Timestamp` is the frame age in ms at send time.
    fn capture_timestamp(&self, data: &Map<String, Value>, received_at_us: i64) -> Result<i64> {
        let age_ms = self.number(data, "Timestamp")?;
        let age_us = (age_ms * 1000.0).round();
        if !age_us.is_finite() || age_us < i64::MIN as f64 || age_us >= i64::MAX as f64 {
            return Err(self.malformed(format!("'Timestamp' out of range: {age_ms}")));
        }
        received_at_us
            .checked_sub(age_us as i64)
            .ok_or_else(|| self.malformed(format!("'Timestamp' out of range: {age_ms}")))
    }

    fn pose(&self, value: &Value) -> Result<Pose3> {
        let obj = value
            .as_object()
            .ok_or_else(|| self.malformed("pose is not an object"))?;
        let mut c = [0.0; 6];
        for (slot, key) in c.iter_mut().zip(POSE_KEYS) {
            *slot = self.number(obj, key)?;
        }
        Ok(Pose3::from_components(c))
    }

    fn tags(&self, value: &Value) -> Result<Vec<i32>> {
        let parse = |s: &str| {
            s.parse::<i32>()
                .map_err(|_| self.malformed(format!("bad tag id '{s}'")))
        };

        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    scalar(item)
                        .and_then(tag_id)
                        .ok_or_else(|| self.malformed(format!("bad tag id {item}")))
                })
                .collect(),
            Value::String(s) => s
                .trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace())
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(parse)
                .collect(),
            other => Err(self.malformed(format!("'Tags' has unexpected type: {other}"))),
        }
    }

    fn corners(&self, value: &Value) -> Result<Vec<TagCorners>> {
        let parsed: std::result::Result<Vec<[[f64; 2]; 4]>, _> = match value {
            Value::String(s) => serde_json::from_str(s),
            other => serde_json::from_value(other.clone()),
        };
        let sets = parsed.map_err(|e| self.malformed(format!("bad 'TagCorners': {e}")))?;

        Ok(sets
            .into_iter()
            .map(|set| TagCorners::new(set.map(|[x, y]| Point2::new(x, y))))
            .collect())
    }
}

fn require<'a>(data: &'a Map<String, Value>, key: &'a str) -> std::result::Result<&'a Value, &'a str> {
    data.get(key).ok_or(key)
}

fn tag_id(n: f64) -> Option<i32> {
    if n.fract() != 0.0 || n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return None;
    }
    Some(n as i32)
}

/// A number, or a string holding one
fn scalar(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl WireDecoder for JsonDecoder {
    type Input = [u8];

    fn transport(&self) -> TransportKind {
        TransportKind::JsonUdp
    }

    fn camera_index(&self) -> u32 {
        self.camera
    }

    fn decode(&self, input: &[u8], received_at_us: i64) -> Result<Option<VisionFrame>> {
        let doc: Value = serde_json::from_slice(input)
            .map_err(|e| self.malformed(format!("invalid JSON: {e}")))?;
        self.decode_value(&doc, received_at_us)
    }
}
