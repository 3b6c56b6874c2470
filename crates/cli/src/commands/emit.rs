//! `emit` command implementation.
//!
//! Plays the camera side: publishes synthetic pose frames for one camera so a
//! running `vision-fusion run` can be exercised without hardware.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{CameraId, FrameMode, Point2, Pose3, TagCorners, VisionFrame, YawSource};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::cli::{EmitArgs, EmitMode};

/// Simulated pipeline latency reported with every frame
const FRAME_AGE_US: i64 = 25_000;

/// Execute the `emit` command
pub async fn run_emit(args: &EmitArgs) -> Result<()> {
    let identity = CameraId::for_camera(&args.table_name, args.camera);
    let socket = bind_for(args.target).await?;

    info!(
        target = %args.target,
        identity = %identity,
        mode = ?args.mode,
        count = args.count,
        "Emitting synthetic frames"
    );

    let mut sent = 0u64;
    for step in 0..args.count {
        let frame = synthetic_frame(args.camera, args.start_update + step, step);
        let payload = encode_frame(args.mode, &identity, &frame);
        socket
            .send_to(&payload, args.target)
            .await
            .with_context(|| format!("Failed to send frame to {}", args.target))?;
        sent += 1;
        debug!(update_seq = frame.update_seq, bytes = payload.len(), "Frame sent");

        if args.interval_ms > 0 && step + 1 < args.count {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    info!(sent, "Emit finished");
    Ok(())
}

async fn bind_for(target: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    UdpSocket::bind(local)
        .await
        .with_context(|| format!("Failed to bind local socket {}", local))
}

/// Robot driving along +x while slowly turning; two tags in view.
fn synthetic_frame(camera: u32, update_seq: u64, step: u64) -> VisionFrame {
    let t = step as f64;
    let primary = Pose3::from_components([1.0 + 0.05 * t, 2.0, 0.0, 0.0, 0.0, 0.01 * t]);
    let alternate = Pose3::from_components([1.0 + 0.05 * t, 2.1, 0.0, 0.0, 0.0, 0.01 * t + 0.2]);

    VisionFrame {
        camera_index: camera,
        update_seq,
        capture_timestamp: 0,
        mode: FrameMode::pose(primary, Some(alternate), 0.05),
        tag_ids: vec![3, 7],
        tag_corners: vec![square(100.0, 120.0, 20.0), square(300.0, 110.0, 24.0)],
        yaw_source: YawSource::Vision,
    }
}

fn square(x: f64, y: f64, side: f64) -> TagCorners {
    TagCorners([
        Point2 { x, y },
        Point2 { x: x + side, y },
        Point2 {
            x: x + side,
            y: y + side,
        },
        Point2 { x, y: y + side },
    ])
}

fn encode_frame(mode: EmitMode, identity: &CameraId, frame: &VisionFrame) -> Bytes {
    match mode {
        EmitMode::Json => {
            ingestion::encode_json_frame(identity, frame, FRAME_AGE_US as f64 / 1000.0)
        }
        EmitMode::Binary => ingestion::encode_binary_frame(identity, frame, FRAME_AGE_US),
    }
}
