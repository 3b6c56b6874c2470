//! UDP 监听
//!
//! 独立任务中阻塞接收数据报，带读超时以便观察停止标志，
//! 再按背压策略写入 async-channel。

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Sender, TrySendError};
use bytes::Bytes;
use contracts::{Clock, DatagramTransport, DropPolicy};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::IngestionMetrics;

/// Largest datagram accepted
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// 已接收的数据报
#[derive(Debug, Clone)]
pub struct Datagram {
    pub bytes: Bytes,
    /// 本地接收时间 (µs)
    pub received_at_us: i64,
}

/// 基于 tokio UdpSocket 的数据报源
pub struct UdpTransport {
    name: String,
    socket: UdpSocket,
    clock: Arc<dyn Clock>,
}

impl UdpTransport {
    /// 绑定本地地址
    pub async fn bind(addr: SocketAddr, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let name = format!("udp://{}", socket.local_addr()?);
        debug!(transport = %name, "udp socket bound");
        Ok(Self {
            name,
            socket,
            clock,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, i64)> {
        let (len, _peer) = self.socket.recv_from(buf).await?;
        Ok((len, self.clock.now_micros()))
    }
}

/// 发送数据报，处理背压策略
pub(crate) fn send_datagram(
    tx: &Sender<Datagram>,
    datagram: Datagram,
    metrics: &IngestionMetrics,
    transport: &str,
    drop_policy: DropPolicy,
) -> bool {
    let result = match drop_policy {
        DropPolicy::DropNewest => match tx.try_send(datagram) {
            Ok(()) => Ok(false),
            Err(TrySendError::Full(_)) => Ok(true),
            Err(TrySendError::Closed(_)) => Err(()),
        },
        DropPolicy::DropOldest => match tx.force_send(datagram) {
            Ok(displaced) => Ok(displaced.is_some()),
            Err(_) => Err(()),
        },
    };

    match result {
        Ok(false) => {
            trace!(transport = %transport, "datagram queued");
            true
        }
        Ok(true) => {
            metrics.record_dropped();
            metrics::counter!(
                "vision_fusion_datagrams_dropped_total",
                "policy" => drop_policy_label(drop_policy)
            )
            .increment(1);
            trace!(transport = %transport, policy = drop_policy_label(drop_policy), "datagram dropped");
            true
        }
        Err(()) => {
            debug!(transport = %transport, "datagram channel closed");
            false
        }
    }
}

fn drop_policy_label(policy: DropPolicy) -> &'static str {
    match policy {
        DropPolicy::DropOldest => "drop_oldest",
        DropPolicy::DropNewest => "drop_newest",
    }
}

/// 启动监听任务
///
/// 每次接收最多等待 `read_timeout`，超时后检查 `running`。
pub fn spawn_listener<T>(
    mut transport: T,
    tx: Sender<Datagram>,
    metrics: Arc<IngestionMetrics>,
    drop_policy: DropPolicy,
    read_timeout: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    T: DatagramTransport + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let name = transport.name().to_string();
        debug!(transport = %name, timeout_ms = read_timeout.as_millis() as u64, "listener started");

        while running.load(Ordering::Relaxed) {
            match tokio::time::timeout(read_timeout, transport.recv(&mut buf)).await {
                Ok(Ok((len, received_at_us))) => {
                    metrics.record_received();
                    let datagram = Datagram {
                        bytes: Bytes::copy_from_slice(&buf[..len]),
                        received_at_us,
                    };
                    if !send_datagram(&tx, datagram, &metrics, &name, drop_policy) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    metrics.record_transport_error();
                    warn!(transport = %name, error = %e, "datagram receive failed");
                }
                Err(_elapsed) => {}
            }
        }

        debug!(transport = %name, "listener stopped");
    })
}
