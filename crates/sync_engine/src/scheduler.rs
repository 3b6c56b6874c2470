//! Repeating-task scheduling.
//!
//! The sampler and table poller are plain `FnMut` tasks; who drives them is
//! injected. Production uses [`TokioScheduler`], tests use
//! [`ManualScheduler`] and call `tick()` by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Task body run on every tick
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Repeating-task executor
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period` until the returned handle is stopped.
    fn schedule_repeating(
        &self,
        name: &'static str,
        period: Duration,
        task: RepeatingTask,
    ) -> ScheduledTask;
}

/// Handle to a scheduled task
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the task; the current tick, if any, completes.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `tokio::time::interval` based scheduler
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(
        &self,
        name: &'static str,
        period: Duration,
        mut task: RepeatingTask,
    ) -> ScheduledTask {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let period = period.max(Duration::from_micros(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(task = name, period_us = period.as_micros() as u64, "scheduled task started");

            while flag.load(Ordering::Relaxed) {
                interval.tick().await;
                task();
            }

            debug!(task = name, "scheduled task stopped");
        });

        ScheduledTask {
            name,
            running,
            handle: Some(handle),
        }
    }
}

/// Hand-driven scheduler for deterministic tests
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<(Arc<AtomicBool>, RepeatingTask)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live task once. Returns how many ran.
    pub fn tick(&self) -> usize {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.retain(|(running, _)| running.load(Ordering::SeqCst));
        for (_, task) in tasks.iter_mut() {
            task();
        }
        tasks.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(
        &self,
        name: &'static str,
        _period: Duration,
        task: RepeatingTask,
    ) -> ScheduledTask {
        let running = Arc::new(AtomicBool::new(true));
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.push((running.clone(), task));
        ScheduledTask {
            name,
            running,
            handle: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_manual_tick_runs_tasks() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let mut handle = scheduler.schedule_repeating(
            "counter",
            Duration::from_millis(1),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(scheduler.tick(), 1);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.stop();
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_repeats_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let mut handle = TokioScheduler.schedule_repeating(
            "counter",
            Duration::from_millis(2),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 2, "ran {seen} times");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
        assert!(!handle.is_running());
    }
}
