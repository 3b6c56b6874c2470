//! # Ingestion Pipeline
//!
//! Vision result ingestion.
//!
//! Responsibilities:
//! - Decode the three wire encodings (polling array, binary UDP, JSON UDP)
//!   into `VisionFrame`
//! - Receive datagrams with a read timeout and a backpressure drop policy
//! - Poll table transports for changed entries
//! - Absorb decode errors so a bad packet never reaches the cache
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestionPipeline;
//!
//! let mut pipeline = IngestionPipeline::new(&config, engine.clone());
//! let addr = pipeline.bind_udp(config.transport.bind_addr.parse()?, clock).await?;
//! // ...
//! pipeline.shutdown().await;
//! ```
//!
//! ## In-memory transports
//!
//! ```ignore
//! use ingestion::{ChannelTransport, MemoryTable};
//!
//! let (injector, transport) = ChannelTransport::pair(clock);
//! pipeline.start(transport);
//! injector.inject(encode_json_frame(&id, &frame, 0.0));
//! ```

mod config;
mod decoder;
mod decoders;
pub mod encode;
mod error;
mod listener;
mod mock;
mod pipeline;
mod table;

// Re-exports
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use decoder::WireDecoder;
pub use decoders::{
    ArrayDecoder, ArrayReading, BinaryDecoder, JsonDecoder, PLACEHOLDER_ARRAY, TAG_TERMINATOR,
};
pub use encode::{encode_binary_frame, encode_json_entry, encode_json_frame};
pub use error::{IngestionError, Result};
pub use listener::{spawn_listener, Datagram, UdpTransport, MAX_DATAGRAM_SIZE};
pub use mock::{ChannelTransport, DatagramInjector, MemoryTable};
pub use pipeline::{DatagramRouter, IngestionPipeline};
pub use table::TablePoller;
