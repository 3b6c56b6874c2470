//! # Sync Engine
//!
//! 视觉/陀螺仪融合核心。
//!
//! 负责：
//! - 有界陀螺仪历史 (`GyroSampleBuffer`)
//! - 视觉帧与陀螺仪样本的时间关联 (`Correlator`)
//! - 每相机最新结果缓存与新数据检测 (`ResultCache`, `NoveltyTracker`)
//! - 相机位姿到机器人中心的变换 (`PoseCenterTransform`)
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::FusionEngine;
//!
//! let engine = FusionEngine::new(&config);
//!
//! // Gyro side: strobe sampler driven by a scheduler
//! let sampler = engine.sampler(0, strobe, gyro, clock).unwrap();
//! let _task = TokioScheduler.schedule_repeating("gyro", period, Box::new(move || {
//!     sampler.poll();
//! }));
//!
//! // Vision side: decoders push frames
//! engine.accept(frame);
//!
//! // Readers
//! if engine.has_new_update(0) {
//!     let result = engine.get_result(0);
//! }
//! ```

mod buffer;
mod cache;
mod correlator;
mod engine;
mod novelty;
mod sampler;
mod scheduler;
mod transform;

pub use buffer::GyroSampleBuffer;
pub use cache::ResultCache;
pub use correlator::{Correlated, Correlator};
pub use engine::{EngineStats, FusionEngine};
pub use novelty::NoveltyTracker;
pub use sampler::{GyroSampler, SharedGyroBuffer};
pub use scheduler::{ManualScheduler, RepeatingTask, ScheduledTask, Scheduler, TokioScheduler};
pub use transform::{compose, PoseCenterTransform};

// Re-export contracts types
pub use contracts::{FusionConfig, GyroSample, UpdateOutcome, VisionFrame, VisionResult};
