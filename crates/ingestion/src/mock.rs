//! 内存传输
//!
//! 用于无网络、无表服务环境的测试与回放。

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};

use async_channel::{unbounded, Receiver, Sender};
use bytes::Bytes;
use contracts::{Clock, DatagramTransport, TableTransport};
use tracing::trace;

/// 内存发布/订阅表
///
/// 每次 `publish` 使该条目的 update 计数加一，与相机端行为一致。
#[derive(Debug, Default)]
pub struct MemoryTable {
    entries: RwLock<HashMap<String, TableEntry>>,
}

#[derive(Debug, Clone)]
struct TableEntry {
    values: Vec<f64>,
    update: i64,
    connected: bool,
}

impl Default for TableEntry {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            update: 0,
            connected: true,
        }
    }
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布新数组，返回新的 update 计数
    pub fn publish(&self, camera: &str, values: Vec<f64>) -> i64 {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries.entry(camera.to_string()).or_default();
        entry.values = values;
        entry.update += 1;
        trace!(camera = %camera, update = entry.update, "table entry published");
        entry.update
    }

    pub fn set_connected(&self, camera: &str, connected: bool) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.entry(camera.to_string()).or_default().connected = connected;
    }

    fn with_entry<R>(&self, camera: &str, f: impl FnOnce(&TableEntry) -> R) -> Option<R> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(camera).map(f)
    }
}

impl TableTransport for MemoryTable {
    fn read_array(&self, camera: &str) -> Option<Vec<f64>> {
        self.with_entry(camera, |e| e.values.clone())
    }

    fn update_number(&self, camera: &str) -> i64 {
        self.with_entry(camera, |e| e.update).unwrap_or(0)
    }

    fn is_connected(&self, camera: &str) -> bool {
        self.with_entry(camera, |e| e.connected).unwrap_or(false)
    }
}

/// 内存数据报源
///
/// 由 [`DatagramInjector`] 注入，接收时间取自注入的时钟。
pub struct ChannelTransport {
    rx: Receiver<Bytes>,
    clock: Arc<dyn Clock>,
}

/// [`ChannelTransport`] 的发送端
#[derive(Clone)]
pub struct DatagramInjector {
    tx: Sender<Bytes>,
}

impl DatagramInjector {
    /// 注入一个数据报；接收端已关闭时返回 false
    pub fn inject(&self, datagram: impl Into<Bytes>) -> bool {
        self.tx.try_send(datagram.into()).is_ok()
    }
}

impl ChannelTransport {
    pub fn pair(clock: Arc<dyn Clock>) -> (DatagramInjector, Self) {
        let (tx, rx) = unbounded();
        (DatagramInjector { tx }, Self { rx, clock })
    }
}

impl DatagramTransport for ChannelTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, i64)> {
        let Ok(bytes) = self.rx.recv().await else {
            // all injectors gone: behave like an idle socket
            return std::future::pending().await;
        };
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok((len, self.clock.now_micros()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ManualClock;

    #[test]
    fn test_memory_table_counts_updates() {
        let table = MemoryTable::new();
        assert_eq!(table.update_number("cam0"), 0);
        assert!(table.read_array("cam0").is_none());
        assert!(!table.is_connected("cam0"));

        table.publish("cam0", vec![1.0]);
        assert_eq!(table.publish("cam0", vec![2.0]), 2);
        assert_eq!(table.read_array("cam0"), Some(vec![2.0]));
        assert!(table.is_connected("cam0"));

        table.set_connected("cam0", false);
        assert!(!table.is_connected("cam0"));
    }

    #[tokio::test]
    async fn test_channel_transport_stamps_receive_time() {
        let clock = ManualClock::new(42);
        let (injector, mut transport) = ChannelTransport::pair(Arc::new(clock.clone()));

        assert!(injector.inject(&b"abc"[..]));
        clock.set(50);

        let mut buf = [0u8; 8];
        let (len, at) = transport.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"abc");
        assert_eq!(at, 50);
    }
}
