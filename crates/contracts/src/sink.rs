//! Frame sink and datagram source interfaces

use std::io;

use crate::VisionFrame;

/// Result of offering a frame to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Frame replaced the cached result
    Accepted,
    /// Frame was not newer than the cached sequence
    Stale { current: u64 },
}

impl UpdateOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Decoded-frame consumer
///
/// Called from the decode path. Implementations must not block for long.
pub trait FrameSink: Send + Sync {
    fn accept(&self, frame: VisionFrame) -> UpdateOutcome;
}

impl<T: FrameSink + ?Sized> FrameSink for std::sync::Arc<T> {
    fn accept(&self, frame: VisionFrame) -> UpdateOutcome {
        (**self).accept(frame)
    }
}

/// Datagram source
///
/// All implementations must implement this trait.
#[trait_variant::make(DatagramTransport: Send)]
pub trait LocalDatagramTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Receive one datagram into `buf`
    ///
    /// Returns the byte count and the local receive time in µs.
    ///
    /// # Errors
    /// Returns the underlying socket error
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, i64)>;
}
