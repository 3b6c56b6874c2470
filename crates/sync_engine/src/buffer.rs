//! Bounded gyro history.
//!
//! Backed by a `HeapRb`: the ring reports `is_full()` itself, so a slot that
//! was never written can never be observed by the correlator.

use std::fmt;

use contracts::GyroSample;
use ringbuf::{traits::*, HeapRb};

/// Fixed-capacity ring of gyro samples, oldest overwritten first.
pub struct GyroSampleBuffer {
    ring: HeapRb<GyroSample>,
    capacity: usize,
    overwritten_count: u64,
    out_of_order_count: u64,
    last_timestamp: Option<i64>,
}

impl fmt::Debug for GyroSampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GyroSampleBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("overwritten", &self.overwritten_count)
            .finish()
    }
}

impl GyroSampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    ///
    /// A capacity of zero is raised to one.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            overwritten_count: 0,
            out_of_order_count: 0,
            last_timestamp: None,
        }
    }

    /// Append a sample.
    ///
    /// If the buffer is full, overwrites the oldest sample.
    #[inline]
    pub fn push(&mut self, angle: f64, timestamp: i64) {
        // Accepted anyway; the correlator tolerates it, the counter reports it
        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_timestamp = Some(timestamp);

        if self.ring.is_full() {
            let _ = self.ring.try_pop();
            self.overwritten_count += 1;
        }
        let _ = self.ring.try_push(GyroSample::new(angle, timestamp));
    }

    /// Most recently written sample.
    #[inline]
    pub fn latest(&self) -> Option<GyroSample> {
        self.iter_newest_first().next().copied()
    }

    /// Samples from newest to oldest.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &GyroSample> + '_ {
        let (head, tail) = self.ring.as_slices();
        tail.iter().rev().chain(head.iter().rev())
    }

    /// Copy of the history, oldest first.
    pub fn samples(&self) -> Vec<GyroSample> {
        self.ring.iter().copied().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples discarded to make room.
    #[inline]
    pub fn overwritten_count(&self) -> u64 {
        self.overwritten_count
    }

    /// Pushes older than their predecessor.
    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_empty_buffer() {
        let buffer = GyroSampleBuffer::new(4);
        assert!(buffer.latest().is_none());
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.iter_newest_first().count(), 0);
    }

    #[test]
    fn test_latest_tracks_last_push() {
        let mut buffer = GyroSampleBuffer::new(3);
        buffer.push(0.1, 10);
        buffer.push(0.2, 20);
        assert_eq!(buffer.latest(), Some(GyroSample::new(0.2, 20)));
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_capacity_overwrites_oldest() {
        let mut buffer = GyroSampleBuffer::new(3);
        for i in 1..=4 {
            buffer.push(i as f64, i * 10);
        }

        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.overwritten_count(), 1);
        let timestamps: Vec<i64> = buffer.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![20, 30, 40]);
    }

    #[test]
    fn test_iter_newest_first_across_wrap() {
        let mut buffer = GyroSampleBuffer::new(4);
        for i in 0..7 {
            buffer.push(0.0, i);
        }
        let order: Vec<i64> = buffer.iter_newest_first().map(|s| s.timestamp).collect();
        assert_eq!(order, vec![6, 5, 4, 3]);
    }

    #[test]
    fn test_out_of_order_detection() {
        let mut buffer = GyroSampleBuffer::new(10);
        buffer.push(0.0, 100);
        buffer.push(0.0, 300);
        buffer.push(0.0, 200);
        assert_eq!(buffer.out_of_order_count(), 1);
        assert_eq!(buffer.latest().unwrap().timestamp, 200);
    }

    #[test]
    fn test_random_pushes_keep_last_n() {
        let mut rng = rand::rng();
        let capacity = rng.random_range(2..32);
        let pushes = rng.random_range(capacity..capacity * 4);
        let mut buffer = GyroSampleBuffer::new(capacity);

        let mut ts = 0i64;
        let mut expected = Vec::new();
        for _ in 0..pushes {
            ts += rng.random_range(0..1_000);
            let angle: f64 = rng.random_range(-3.0..3.0);
            buffer.push(angle, ts);
            expected.push(GyroSample::new(angle, ts));
        }

        let tail = &expected[expected.len() - capacity..];
        assert_eq!(buffer.samples(), tail);
        assert_eq!(buffer.latest(), expected.last().copied());
        assert_eq!(buffer.len(), capacity);
    }
}
