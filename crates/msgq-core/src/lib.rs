//! msgq-core — kernel message queue metrics for Prometheus.
//!
//! Provides:
//! - `source` — snapshot sources (`ipcs -q`, caching wrapper, mock)
//! - `parser` — `ipcs -q` report parsing into queue records
//! - `projector` — queue records to labeled gauge samples
//! - `collector` — per-scrape `prometheus_client` collector and registry setup
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐  RawSnapshot  ┌─────────────┐  QueueRecord  ┌───────────┐
//! │ SnapshotSource │ ────────────► │ QueueParser │ ────────────► │ projector │
//! │   (ipcs -q)    │               │ (IpcsParser)│               └─────┬─────┘
//! └────────────────┘               └─────────────┘                     │
//!                                                        MetricSample  │
//!                                                                      ▼
//!                               ┌──────────────────────────────────────────┐
//!                               │ QueueCollector (encodes on every scrape) │
//!                               │   <ns>_message_queue_length{id, owner}   │
//!                               │   <ns>_message_queue_up                  │
//!                               └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use msgq_core::collector::{QueueCollector, new_registry};
//! use msgq_core::parser::IpcsParser;
//! use msgq_core::source::MockSource;
//!
//! let collector = QueueCollector::new(MockSource::typical_queues(), IpcsParser::new());
//! let registry = new_registry("nagios", collector);
//!
//! let mut out = String::new();
//! prometheus_client::encoding::text::encode(&mut out, &registry).unwrap();
//! assert!(out.contains("nagios_message_queue_up 1"));
//! ```

pub mod collector;
pub mod parser;
pub mod projector;
pub mod source;

/// Crate version, shared with the exporter binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
