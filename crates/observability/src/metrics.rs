//! 融合层指标收集模块
//!
//! 记录帧接收、陈旧帧丢弃、解码失败与陀螺仪时间关联的运行指标。

use std::collections::HashMap;

use contracts::{TransportKind, VisionFrame, YawSource};
use metrics::{counter, gauge, histogram};

/// 记录被结果缓存接受的帧
///
/// `lag_us` 为视觉捕获时间与最新陀螺仪样本之间的时间差 (仅当发生关联时)。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_accepted;
///
/// if engine.accept(frame.clone()).is_accepted() {
///     record_frame_accepted(&frame, None);
/// }
/// ```
pub fn record_frame_accepted(frame: &VisionFrame, lag_us: Option<i64>) {
    let camera = frame.camera_index.to_string();

    counter!(
        "vision_fusion_frames_accepted_total",
        "camera" => camera.clone(),
        "yaw_source" => yaw_source_label(frame.yaw_source)
    )
    .increment(1);

    // 帧序号 (用于检测跳帧)
    gauge!("vision_fusion_last_update_seq", "camera" => camera.clone())
        .set(frame.update_seq as f64);

    gauge!("vision_fusion_tag_count", "camera" => camera.clone()).set(frame.tag_count() as f64);

    if let Some(ambiguity) = frame.ambiguity() {
        histogram!("vision_fusion_pose_ambiguity", "camera" => camera.clone()).record(ambiguity);
    }

    if let Some(lag) = lag_us {
        record_correlation_lag_us(frame.camera_index, lag);
    }
}

/// 记录陈旧帧 (update 序号未增长)
pub fn record_frame_stale(camera_index: u32) {
    counter!(
        "vision_fusion_frames_stale_total",
        "camera" => camera_index.to_string()
    )
    .increment(1);
}

/// 记录解码失败
pub fn record_decode_error(camera_index: u32, reason: &'static str) {
    counter!(
        "vision_fusion_decode_errors_total",
        "camera" => camera_index.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录陀螺仪关联退化 (无足够早的样本)
pub fn record_gyro_fallback(camera_index: u32) {
    counter!(
        "vision_fusion_gyro_fallback_total",
        "camera" => camera_index.to_string()
    )
    .increment(1);
}

/// 记录视觉捕获时间落后于陀螺仪流的时长
pub fn record_correlation_lag_us(camera_index: u32, lag_us: i64) {
    histogram!(
        "vision_fusion_correlation_lag_us",
        "camera" => camera_index.to_string()
    )
    .record(lag_us as f64);
}

/// 记录原始数据包接收
pub fn record_packet_received(camera_index: u32, transport: TransportKind) {
    counter!(
        "vision_fusion_packets_received_total",
        "camera" => camera_index.to_string(),
        "transport" => transport.as_str()
    )
    .increment(1);
}

/// 记录陀螺仪缓冲区深度
pub fn record_buffer_depth(camera_index: u32, depth: usize) {
    gauge!(
        "vision_fusion_gyro_buffer_depth",
        "camera" => camera_index.to_string()
    )
    .set(depth as f64);
}

fn yaw_source_label(source: YawSource) -> &'static str {
    match source {
        YawSource::Vision => "vision",
        YawSource::Gyro => "gyro",
        YawSource::GyroFallback => "gyro_fallback",
    }
}

/// 融合指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FusionMetricsAggregator {
    /// 接受的帧数
    pub accepted_frames: u64,

    /// 陈旧帧数
    pub stale_frames: u64,

    /// 解码失败数 (按原因)
    pub decode_errors: HashMap<&'static str, u64>,

    /// 使用陀螺仪航向的帧数
    pub gyro_yaw_frames: u64,

    /// 关联退化的帧数
    pub fallback_frames: u64,

    /// 关联时间差统计 (毫秒)
    pub lag_stats: RunningStats,

    /// 歧义度统计
    pub ambiguity_stats: RunningStats,

    /// 各相机接受帧数
    pub per_camera: HashMap<u32, u64>,
}

impl FusionMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计 (接受的帧)
    pub fn record_accepted(&mut self, frame: &VisionFrame, lag_us: Option<i64>) {
        self.accepted_frames += 1;
        *self.per_camera.entry(frame.camera_index).or_insert(0) += 1;

        match frame.yaw_source {
            YawSource::Vision => {}
            YawSource::Gyro => self.gyro_yaw_frames += 1,
            YawSource::GyroFallback => self.fallback_frames += 1,
        }

        if let Some(lag) = lag_us {
            self.lag_stats.push(lag as f64 / 1000.0);
        }
        if let Some(ambiguity) = frame.ambiguity() {
            self.ambiguity_stats.push(ambiguity);
        }
    }

    /// 更新聚合统计 (陈旧帧)
    pub fn record_stale(&mut self) {
        self.stale_frames += 1;
    }

    /// 更新聚合统计 (解码失败)
    pub fn record_decode_error(&mut self, reason: &'static str) {
        *self.decode_errors.entry(reason).or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let total_errors: u64 = self.decode_errors.values().sum();
        let offered = self.accepted_frames + self.stale_frames + total_errors;
        MetricsSummary {
            accepted_frames: self.accepted_frames,
            stale_frames: self.stale_frames,
            decode_errors: total_errors,
            gyro_yaw_frames: self.gyro_yaw_frames,
            fallback_frames: self.fallback_frames,
            rejection_rate: if offered > 0 {
                (self.stale_frames + total_errors) as f64 / offered as f64 * 100.0
            } else {
                0.0
            },
            correlation_lag_ms: StatsSummary::from(&self.lag_stats),
            ambiguity: StatsSummary::from(&self.ambiguity_stats),
            decode_error_reasons: self.decode_errors.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub accepted_frames: u64,
    pub stale_frames: u64,
    pub decode_errors: u64,
    pub gyro_yaw_frames: u64,
    pub fallback_frames: u64,
    pub rejection_rate: f64,
    pub correlation_lag_ms: StatsSummary,
    pub ambiguity: StatsSummary,
    pub decode_error_reasons: HashMap<&'static str, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(f, "Accepted frames: {}", self.accepted_frames)?;
        writeln!(
            f,
            "Rejected frames: {} stale, {} decode errors ({:.2}%)",
            self.stale_frames, self.decode_errors, self.rejection_rate
        )?;
        writeln!(
            f,
            "Gyro yaw: {} matched, {} fallback",
            self.gyro_yaw_frames, self.fallback_frames
        )?;
        writeln!(f, "Correlation lag (ms): {}", self.correlation_lag_ms)?;
        writeln!(f, "Ambiguity: {}", self.ambiguity)?;

        if !self.decode_error_reasons.is_empty() {
            writeln!(f, "Decode errors by reason:")?;
            for (reason, count) in &self.decode_error_reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FrameMode, Pose3};

    fn frame(camera_index: u32, yaw_source: YawSource, ambiguity: f64) -> VisionFrame {
        VisionFrame {
            camera_index,
            update_seq: 7,
            capture_timestamp: 1_000,
            mode: FrameMode::pose(Pose3::default(), None, ambiguity),
            tag_ids: vec![1],
            tag_corners: Vec::new(),
            yaw_source,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts_yaw_sources() {
        let mut aggregator = FusionMetricsAggregator::new();

        aggregator.record_accepted(&frame(0, YawSource::Vision, 0.1), None);
        aggregator.record_accepted(&frame(0, YawSource::Gyro, 0.2), Some(4_000));
        aggregator.record_accepted(&frame(1, YawSource::GyroFallback, 0.3), None);
        aggregator.record_stale();
        aggregator.record_decode_error("malformed");

        assert_eq!(aggregator.accepted_frames, 3);
        assert_eq!(aggregator.gyro_yaw_frames, 1);
        assert_eq!(aggregator.fallback_frames, 1);
        assert_eq!(aggregator.per_camera.get(&0), Some(&2));
        assert_eq!(aggregator.lag_stats.count(), 1);
        assert!((aggregator.lag_stats.mean() - 4.0).abs() < 1e-10);

        let summary = aggregator.summary();
        assert_eq!(summary.decode_errors, 1);
        assert!((summary.rejection_rate - 40.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            accepted_frames: 100,
            stale_frames: 5,
            decode_errors: 0,
            gyro_yaw_frames: 90,
            fallback_frames: 2,
            rejection_rate: 4.76,
            correlation_lag_ms: StatsSummary {
                count: 90,
                min: 1.0,
                max: 30.0,
                mean: 12.0,
                std_dev: 4.0,
            },
            ambiguity: StatsSummary::default(),
            decode_error_reasons: HashMap::new(),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Accepted frames: 100"));
        assert!(output.contains("4.76%"));
        assert!(output.contains("Ambiguity: N/A"));
    }

    #[test]
    fn test_reset() {
        let mut aggregator = FusionMetricsAggregator::new();
        aggregator.record_stale();
        aggregator.reset();
        assert_eq!(aggregator.stale_frames, 0);
    }
}
