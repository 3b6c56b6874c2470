//! Raw binary UDP decoder
//!
//! Frame layout, all integers and floats big-endian:
//!
//! ```text
//! identity NUL | u32 update | u32 mode | payload
//! mode 0: 6 x f64 primary | 6 x f64 alternate | f64 ambiguity | i64 age_us | i32 tag.. | i32 -1
//! mode 1: i64 age_us | i32 tag.. | i32 -1 | per tag 4 x (f64 x, f64 y)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Buf;
use contracts::{
    CameraId, FrameMode, Point2, Pose3, TagCorners, TransportKind, VisionFrame, YawSource,
};

use crate::decoder::WireDecoder;
use crate::error::{IngestionError, Result};

/// Tag list terminator
pub const TAG_TERMINATOR: i32 = -1;

/// Decoder for binary datagrams addressed to one camera
#[derive(Debug)]
pub struct BinaryDecoder {
    camera: u32,
    identity: CameraId,
    /// Highest update number accepted so far
    high_water: AtomicU64,
}

impl BinaryDecoder {
    pub fn new(camera: u32, identity: CameraId) -> Self {
        Self {
            camera,
            identity,
            high_water: AtomicU64::new(0),
        }
    }

    pub fn identity(&self) -> &CameraId {
        &self.identity
    }

    pub fn last_update(&self) -> u64 {
        self.high_water.load(Ordering::Acquire)
    }

    /// Strip the identity prefix, failing unless it occurs exactly once at the start.
    fn strip_identity<'a>(&self, input: &'a [u8]) -> Result<&'a [u8]> {
        let mut needle = Vec::with_capacity(self.identity.len() + 1);
        needle.extend_from_slice(self.identity.as_bytes());
        needle.push(0);

        let occurrences = input
            .windows(needle.len())
            .filter(|w| *w == needle.as_slice())
            .count();

        if occurrences != 1 || !input.starts_with(&needle) {
            return Err(IngestionError::identity_mismatch(
                self.camera,
                self.identity.as_str(),
                occurrences,
            ));
        }
        Ok(&input[needle.len()..])
    }
}

/// Bounds-checked reads over a byte slice
struct FrameReader<'a> {
    camera: u32,
    buf: &'a [u8],
}

impl<'a> FrameReader<'a> {
    fn new(camera: u32, buf: &'a [u8]) -> Self {
        Self { camera, buf }
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(IngestionError::malformed(
                self.camera,
                format!(
                    "truncated frame reading {what}: need {n} bytes, {} left",
                    self.buf.remaining()
                ),
            ));
        }
        Ok(())
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.need(4, what)?;
        Ok(self.buf.get_u32())
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        self.need(4, what)?;
        Ok(self.buf.get_i32())
    }

    fn i64(&mut self, what: &str) -> Result<i64> {
        self.need(8, what)?;
        Ok(self.buf.get_i64())
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        self.need(8, what)?;
        Ok(self.buf.get_f64())
    }

    fn pose(&mut self) -> Result<Pose3> {
        let mut c = [0.0; 6];
        for v in c.iter_mut() {
            *v = self.f64("pose")?;
        }
        Ok(Pose3::from_components(c))
    }

    fn tag_ids(&mut self) -> Result<Vec<i32>> {
        let mut ids = Vec::new();
        loop {
            if self.buf.remaining() < 4 {
                return Err(IngestionError::malformed(
                    self.camera,
                    "tag list missing -1 terminator",
                ));
            }
            match self.buf.get_i32() {
                TAG_TERMINATOR => return Ok(ids),
                id => ids.push(id),
            }
        }
    }

    fn corners(&mut self) -> Result<TagCorners> {
        let mut points = [Point2::default(); 4];
        for p in points.iter_mut() {
            *p = Point2::new(self.f64("corner x")?, self.f64("corner y")?);
        }
        Ok(TagCorners::new(points))
    }
}

impl WireDecoder for BinaryDecoder {
    type Input = [u8];

    fn transport(&self) -> TransportKind {
        TransportKind::BinaryUdp
    }

    fn camera_index(&self) -> u32 {
        self.camera
    }

    fn decode(&self, input: &[u8], received_at_us: i64) -> Result<Option<VisionFrame>> {
        let body = self.strip_identity(input)?;
        let mut reader = FrameReader::new(self.camera, body);

        let update = u64::from(reader.u32("update number")?);
        let last = self.last_update();
        if update <= last {
            return Err(IngestionError::StaleUpdate {
                camera: self.camera,
                update,
                last,
            });
        }

        let mode_code = reader.u32("mode")?;
        let (mode, age_us, tag_ids, tag_corners) = match mode_code {
            0 => {
                let primary = reader.pose()?;
                let alternate = reader.pose()?;
                let ambiguity = reader.f64("ambiguity")?;
                let age_us = reader.i64("timestamp")?;
                let tag_ids = reader.tag_ids()?;
                (
                    FrameMode::pose(primary, Some(alternate), ambiguity),
                    age_us,
                    tag_ids,
                    Vec::new(),
                )
            }
            1 => {
                let age_us = reader.i64("timestamp")?;
                let tag_ids = reader.tag_ids()?;
                let tag_corners = tag_ids
                    .iter()
                    .map(|_| reader.corners())
                    .collect::<Result<Vec<_>>>()?;
                (FrameMode::Tags, age_us, tag_ids, tag_corners)
            }
            other => {
                return Err(IngestionError::malformed(
                    self.camera,
                    format!("unknown mode {other}"),
                ))
            }
        };

        let capture_timestamp = received_at_us.checked_sub(age_us).ok_or_else(|| {
            IngestionError::malformed(self.camera, format!("frame age {age_us} us out of range"))
        })?;

        self.high_water.fetch_max(update, Ordering::AcqRel);

        Ok(Some(VisionFrame {
            camera_index: self.camera,
            update_seq: update,
            capture_timestamp,
            mode,
            tag_ids,
            tag_corners,
            yaw_source: YawSource::Vision,
        }))
    }
}
