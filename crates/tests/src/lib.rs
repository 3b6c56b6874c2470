//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 内存传输 e2e 测试（无需网络与相机）
//! - 本地 UDP 回环测试

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CameraId, Pose3, TransportKind, VisionResult, SENTINEL_COORDINATE};

    #[test]
    fn test_camera_identity_format() {
        assert_eq!(CameraId::for_camera("limelight", 3), "limelight3");
    }

    #[test]
    fn test_no_data_result_is_sentinel() {
        let result = VisionResult::no_data(2);
        assert!(!result.has_data());
        assert_eq!(result.frame.camera_index, 2);
        assert_eq!(Pose3::sentinel().translation.x, SENTINEL_COORDINATE);
    }

    #[test]
    fn test_config_snapshot() {
        let config = ConfigLoader::load_from_str(
            r#"
table_name = "limelight"

[transport]
kind = "binary_udp"
bind_addr = "0.0.0.0:5800"

[[cameras]]
index = 0
strobe_enabled = true
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&ConfigLoader::to_json(&config).unwrap()).unwrap();
        assert_eq!(json["transport"]["kind"], "binary_udp");
        assert_eq!(json["transport"]["drop_policy"], "drop_oldest");
        assert_eq!(json["gyro"]["capacity"], 100);
        assert_eq!(json["cameras"][0]["strobe_enabled"], true);
        assert_eq!(config.transport.kind, TransportKind::BinaryUdp);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::f64::consts::FRAC_PI_2;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Clock, FrameMode, FrameSink, FusionConfig, GyroSource, ManualClock, MonotonicClock,
        Pose3, Rotation3, Transform3, Translation3, UpdateOutcome, VisionFrame, YawSource,
    };
    use ingestion::{
        encode_binary_frame, encode_json_frame, ChannelTransport, IngestionPipeline, MemoryTable,
        TablePoller,
    };
    use observability::FusionMetricsAggregator;
    use sync_engine::{FusionEngine, ManualScheduler, Scheduler, TokioScheduler};
    use tokio::net::UdpSocket;

    const EPS: f64 = 1e-9;

    fn config(kind: &str, strobe: bool) -> FusionConfig {
        ConfigLoader::load_from_str(
            &format!(
                r#"
table_name = "limelight"

[transport]
kind = "{kind}"
bind_addr = "127.0.0.1:0"
read_timeout_ms = 10
poll_period_ms = 5

[gyro]
capacity = 4

[[cameras]]
index = 0
strobe_enabled = {strobe}

[[cameras]]
index = 1
"#
            ),
            ConfigFormat::Toml,
        )
        .unwrap()
    }

    fn pose_frame(camera: u32, update_seq: u64, x: f64, yaw: f64) -> VisionFrame {
        VisionFrame {
            camera_index: camera,
            update_seq,
            capture_timestamp: 0,
            mode: FrameMode::pose(
                Pose3::from_components([x, 2.0, 0.0, 0.0, 0.0, yaw]),
                None,
                0.1,
            ),
            tag_ids: vec![4, 5],
            tag_corners: Vec::new(),
            yaw_source: YawSource::Vision,
        }
    }

    /// Poll `cond` until it holds or two seconds pass.
    async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cond()
    }

    /// End-to-end: JSON datagrams -> IngestionPipeline -> FusionEngine -> readers
    #[tokio::test]
    async fn test_e2e_json_pipeline() {
        let config = config("json_udp", false);
        let engine = Arc::new(FusionEngine::new(&config));
        let clock = ManualClock::new(1_000_000);

        let (injector, transport) = ChannelTransport::pair(Arc::new(clock.clone()));
        let mut pipeline = IngestionPipeline::new(&config, engine.clone());
        pipeline.start(transport);

        let cam0 = config.camera_id(0);
        for update in 1..=3 {
            let frame = pose_frame(0, update, update as f64, 0.2);
            assert!(injector.inject(encode_json_frame(&cam0, &frame, 10.0)));
        }

        assert!(wait_until(|| engine.cache().update_number(0) == 3).await);
        assert!(engine.has_new_update(0));
        assert!(!engine.has_new_update(1));

        let result = engine.get_result(0);
        assert_eq!(result.update_seq(), 3);
        assert_eq!(result.frame.capture_timestamp, 1_000_000 - 10_000);
        assert_eq!(result.frame.tag_ids, vec![4, 5]);
        assert!(!engine.has_new_update(0));

        // Camera 1 never published
        let empty = engine.get_result(1);
        assert!(!empty.has_data());
        assert!(empty.camera_pose().map_or(true, |p| p.is_sentinel()));
        assert!(!engine.is_camera_connected(1));
        assert!(engine.is_camera_connected(0));

        pipeline.shutdown().await;
        assert_eq!(pipeline.metrics().snapshot().frames_accepted, 3);
    }

    /// A repeated update number is dropped and the earlier frame survives.
    #[tokio::test]
    async fn test_duplicate_update_is_rejected() {
        let config = config("json_udp", false);
        let engine = Arc::new(FusionEngine::new(&config));
        let (injector, transport) = ChannelTransport::pair(Arc::new(ManualClock::new(500_000)));
        let mut pipeline = IngestionPipeline::new(&config, engine.clone());
        pipeline.start(transport);

        let cam1 = config.camera_id(1);
        injector.inject(encode_json_frame(&cam1, &pose_frame(1, 5, 1.0, 0.0), 0.0));
        injector.inject(encode_json_frame(&cam1, &pose_frame(1, 5, 9.0, 0.0), 0.0));

        let metrics = pipeline.metrics();
        assert!(wait_until(|| metrics.snapshot().frames_stale == 1).await);

        let result = engine.get_result(1);
        assert_eq!(result.update_seq(), 5);
        assert_eq!(result.camera_pose().unwrap().translation.x, 1.0);
        assert_eq!(engine.stats().accepted, 1);
        assert_eq!(engine.stats().stale, 1);

        pipeline.shutdown().await;
    }

    /// Strobe-sampled gyro history supplies the yaw of lagging frames.
    #[test]
    fn test_gyro_correlation_through_engine() {
        let config = config("table", true);
        let engine = Arc::new(FusionEngine::new(&config));
        let clock = ManualClock::new(0);
        let strobe = Arc::new(AtomicBool::new(false));
        let yaw_bits = Arc::new(AtomicU64::new(0f64.to_bits()));

        let gyro_yaw = yaw_bits.clone();
        let gyro: Arc<dyn GyroSource> =
            Arc::new(move || f64::from_bits(gyro_yaw.load(Ordering::SeqCst)));
        let sampler = engine
            .sampler(0, strobe.clone(), gyro, Arc::new(clock.clone()))
            .unwrap();

        let scheduler = ManualScheduler::new();
        let _task = scheduler.schedule_repeating(
            "gyro_sampler",
            Duration::from_micros(config.gyro.sample_period_us),
            Box::new(move || {
                sampler.poll();
            }),
        );

        // Four exposures at 1ms..4ms with yaw 0.0, 0.1, 0.2, 0.3
        for i in 0..4 {
            clock.set(1_000 * (i + 1));
            yaw_bits.store((0.1 * i as f64).to_bits(), Ordering::SeqCst);
            strobe.store(true, Ordering::SeqCst);
            scheduler.tick();
            scheduler.tick(); // held line: no second sample
            strobe.store(false, Ordering::SeqCst);
            scheduler.tick();
        }
        let history = engine.gyro_buffer(0).unwrap();
        assert!(history.read().unwrap().is_full());

        let table = Arc::new(MemoryTable::new());
        let mut poller = TablePoller::new(table.clone(), engine.clone(), Arc::new(clock.clone()));
        poller.register_camera(0, config.camera_id(0));

        // Captured at 2.5ms: takes the 2ms sample
        table.publish("limelight0", vec![1.0, 2.0, 0.0, 0.3, 0.2, 1.4, 2_500.0, 1.0, 7.0, 0.2]);
        assert_eq!(poller.poll_once(), 1);
        let result = engine.get_result(0);
        let pose = result.camera_pose().unwrap();
        assert_eq!(result.frame.yaw_source, YawSource::Gyro);
        assert_eq!(result.frame.capture_timestamp, 2_000);
        assert!((pose.rotation.yaw - 0.1).abs() < EPS);
        assert_eq!(pose.rotation.roll, 0.0);
        assert_eq!(pose.rotation.pitch, 0.0);
        assert_eq!(pose.translation.x, 1.0);

        // Older than the whole history: vision yaw, original timestamp
        table.publish("limelight0", vec![1.0, 2.0, 0.0, 0.0, 0.0, 1.4, 500.0, 1.0, 7.0, 0.2]);
        assert_eq!(poller.poll_once(), 1);
        let result = engine.get_result(0);
        assert_eq!(result.frame.yaw_source, YawSource::GyroFallback);
        assert_eq!(result.frame.capture_timestamp, 500);
        assert!((result.camera_pose().unwrap().rotation.yaw - 1.4).abs() < EPS);

        // Newer than the newest sample: untouched
        table.publish("limelight0", vec![1.0, 2.0, 0.0, 0.0, 0.0, 1.4, 9_000.0, 1.0, 7.0, 0.2]);
        assert_eq!(poller.poll_once(), 1);
        let result = engine.get_result(0);
        assert_eq!(result.frame.yaw_source, YawSource::Vision);
        assert_eq!(result.frame.capture_timestamp, 9_000);

        let stats = engine.stats();
        assert_eq!(stats.gyro_matched, 1);
        assert_eq!(stats.gyro_fallback, 1);
    }

    /// Table poller driven by the tokio scheduler; connection flag comes from the table.
    #[tokio::test]
    async fn test_table_poller_with_tokio_scheduler() {
        let config = config("table", false);
        let engine = Arc::new(FusionEngine::new(&config));
        let table = Arc::new(MemoryTable::new());
        engine.attach_table(table.clone());

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let mut poller = TablePoller::new(table.clone(), engine.clone(), clock);
        for cam in &config.cameras {
            poller.register_camera(cam.index, config.camera_id(cam.index));
        }

        let mut task = TokioScheduler.schedule_repeating(
            "table_poller",
            Duration::from_millis(config.transport.poll_period_ms),
            Box::new(move || {
                poller.poll_once();
            }),
        );

        assert!(!engine.is_camera_connected(1));
        table.publish("limelight1", vec![0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 100.0, 2.0, 1.0, 2.0, 0.3]);
        assert!(wait_until(|| engine.has_new_update(1)).await);
        assert!(engine.is_camera_connected(1));

        let result = engine.get_result(1);
        assert_eq!(result.update_seq(), 1);
        assert_eq!(result.frame.tag_ids, vec![1, 2]);
        assert_eq!(result.frame.ambiguity(), Some(0.3));

        table.set_connected("limelight1", false);
        assert!(!engine.is_camera_connected(1));

        task.stop();
        assert!(!task.is_running());
    }

    /// Binary frames over a real loopback socket; frames for another table are ignored.
    #[tokio::test]
    async fn test_e2e_binary_udp() {
        let config = config("binary_udp", false);
        let engine = Arc::new(FusionEngine::new(&config));
        let mut pipeline = IngestionPipeline::new(&config, engine.clone());
        let addr = pipeline
            .bind_udp("127.0.0.1:0".parse().unwrap(), Arc::new(MonotonicClock::new()))
            .await
            .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let cam0 = config.camera_id(0);
        let mut frame = pose_frame(0, 1, 3.0, 0.4);
        frame.tag_ids = vec![11];
        sender
            .send_to(&encode_binary_frame(&cam0, &frame, 0), addr)
            .await
            .unwrap();

        let foreign = contracts::CameraId::new("other0");
        sender
            .send_to(&encode_binary_frame(&foreign, &pose_frame(0, 2, 0.0, 0.0), 0), addr)
            .await
            .unwrap();

        let metrics = pipeline.metrics();
        assert!(
            wait_until(|| {
                let snapshot = metrics.snapshot();
                snapshot.packets_received == 2 && snapshot.identity_mismatches == 1
            })
            .await
        );

        let result = engine.get_result(0);
        assert_eq!(result.update_seq(), 1);
        assert_eq!(result.frame.tag_ids, vec![11]);
        assert_eq!(result.camera_pose().unwrap().translation.x, 3.0);
        assert!(!engine.get_result(1).has_data());

        pipeline.shutdown().await;
        assert!(!pipeline.is_running());
    }

    /// Mounting transforms, from config and set at runtime.
    #[test]
    fn test_camera_pose_to_robot_center() {
        let config = config("json_udp", false);
        let engine = FusionEngine::new(&config);
        let pose = Pose3::from_components([1.0, 2.0, 0.0, 0.0, 0.0, FRAC_PI_2]);

        // No transform configured: sentinel
        assert!(engine.camera_pose_to_robot_center(0, &pose).is_sentinel());
        assert!(engine.robot_center_pose(0).is_none());

        engine.set_camera_to_center(
            0,
            Transform3::new(Translation3::new(0.5, 0.0, 0.0), Rotation3::new(0.0, 0.0, 0.0)),
        );
        let robot = engine.camera_pose_to_robot_center(0, &pose);
        assert!((robot.translation.x - 1.0).abs() < EPS);
        assert!((robot.translation.y - 2.5).abs() < EPS);
        assert!((robot.rotation.yaw - FRAC_PI_2).abs() < EPS);

        assert_eq!(
            engine.accept(pose_frame(0, 1, 1.0, FRAC_PI_2)),
            UpdateOutcome::Accepted
        );
        let from_result = engine.robot_center_pose(0).unwrap();
        assert!((from_result.translation.y - 2.5).abs() < EPS);

        // Camera 1 still has none
        assert!(engine.camera_pose_to_robot_center(1, &pose).is_sentinel());
    }

    /// Independent readers keep their own novelty cursors.
    #[test]
    fn test_independent_novelty_readers() {
        let config = config("json_udp", false);
        let engine = FusionEngine::new(&config);
        let mut logger = engine.novelty_tracker(0);
        let mut estimator = engine.novelty_tracker(0);
        let mut aggregator = FusionMetricsAggregator::new();

        engine.accept(pose_frame(0, 1, 1.0, 0.0));
        let seen = logger.observe(engine.cache()).unwrap();
        aggregator.record_accepted(&seen.frame, None);
        assert!(!logger.has_new_update(engine.cache()));
        assert!(estimator.has_new_update(engine.cache()));
        assert!(engine.has_new_update(0));

        engine.accept(pose_frame(0, 2, 1.5, 0.0));
        assert_eq!(estimator.observe(engine.cache()).unwrap().update_seq(), 2);
        let seen = logger.observe(engine.cache()).unwrap();
        aggregator.record_accepted(&seen.frame, None);
        assert!(logger.observe(engine.cache()).is_none());

        let summary = aggregator.summary();
        assert_eq!(summary.accepted_frames, 2);
        assert_eq!(aggregator.per_camera.get(&0), Some(&2));
    }
}
