//! Camera-side encoders
//!
//! Produce datagrams in the same formats the decoders read, for bench
//! publishing and tests.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{CameraId, FrameMode, Pose3, VisionFrame};
use serde_json::{json, Map, Value};

use crate::decoders::TAG_TERMINATOR;

fn put_pose(buf: &mut BytesMut, pose: &Pose3) {
    for v in pose.components() {
        buf.put_f64(v);
    }
}

/// Encode `frame` as a binary datagram for `identity`.
///
/// `age_us` is how long ago the frame was captured, as seen by the sender.
pub fn encode_binary_frame(identity: &CameraId, frame: &VisionFrame, age_us: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(identity.len() + 160 + frame.tag_ids.len() * 68);
    buf.put_slice(identity.as_bytes());
    buf.put_u8(0);
    buf.put_u32(frame.update_seq as u32);
    buf.put_u32(frame.mode.code());

    match &frame.mode {
        FrameMode::Pose {
            primary,
            alternate,
            ambiguity,
        } => {
            put_pose(&mut buf, primary);
            put_pose(&mut buf, alternate.as_ref().unwrap_or(primary));
            buf.put_f64(*ambiguity);
            buf.put_i64(age_us);
            for &id in &frame.tag_ids {
                buf.put_i32(id);
            }
            buf.put_i32(TAG_TERMINATOR);
        }
        FrameMode::Tags => {
            buf.put_i64(age_us);
            for &id in &frame.tag_ids {
                buf.put_i32(id);
            }
            buf.put_i32(TAG_TERMINATOR);
            for corners in &frame.tag_corners {
                for p in corners.corners() {
                    buf.put_f64(p.x);
                    buf.put_f64(p.y);
                }
            }
        }
    }

    buf.freeze()
}

fn pose_json(pose: &Pose3) -> Value {
    let [x, y, z, rx, ry, rz] = pose.components();
    json!({"tX": x, "tY": y, "tZ": z, "rX": rx, "rY": ry, "rZ": rz})
}

/// JSON object describing one camera's frame, without the identity key.
pub fn encode_json_entry(frame: &VisionFrame, age_ms: f64) -> Value {
    let mut entry = Map::new();
    entry.insert("Mode".into(), json!(frame.mode.code()));
    entry.insert("Update".into(), json!(frame.update_seq));
    entry.insert("Timestamp".into(), json!(age_ms));
    entry.insert("NumTags".into(), json!(frame.tag_ids.len()));
    entry.insert("Tags".into(), json!(frame.tag_ids));

    if !frame.tag_corners.is_empty() {
        let corners: Vec<Vec<[f64; 2]>> = frame
            .tag_corners
            .iter()
            .map(|c| c.corners().iter().map(|p| [p.x, p.y]).collect())
            .collect();
        entry.insert("TagCorners".into(), json!(corners));
    }

    if let FrameMode::Pose {
        primary,
        alternate,
        ambiguity,
    } = &frame.mode
    {
        entry.insert("Pose1".into(), pose_json(primary));
        if let Some(alt) = alternate {
            entry.insert("Pose2".into(), pose_json(alt));
        }
        entry.insert("Ambig".into(), json!(ambiguity));
    }

    Value::Object(entry)
}

/// Encode a single-camera JSON datagram.
pub fn encode_json_frame(identity: &CameraId, frame: &VisionFrame, age_ms: f64) -> Bytes {
    let mut doc = Map::new();
    doc.insert(identity.to_string(), encode_json_entry(frame, age_ms));
    Bytes::from(Value::Object(doc).to_string())
}
