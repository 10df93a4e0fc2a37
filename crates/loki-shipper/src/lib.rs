//! # loki-shipper
//!
//! Ships application log records to a Grafana Loki push endpoint.
//!
//! Each record handed to the shipper is turned into a labeled, timestamped
//! entry, grouped with stream-mates sharing the same label set, serialized
//! into the configured push payload shape, and POSTed to the endpoint.
//!
//! ## Architecture
//!
//! ```text
//!    LogRecord
//!        │
//!        v
//!   ┌─────────────┐
//!   │  Formatter  │  (severity/logger labels, capture timestamp)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Resolver   │  (defaults < tags < extras, computed sources)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  (Queue)    │  (optional relay worker, FIFO)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │   Encoder   │  (v0 legacy / v1 streams payload)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │   Client    │  (HTTP POST, Basic auth, 2xx = success)
//!   └─────────────┘
//! ```
//!
//! Delivery is best effort: a failed push is reported through `tracing` and
//! never raised back into the caller, and a lost entry is not retried.
//!
//! ## Components
//!
//! - [`config`]: construction-time handler configuration
//! - [`entry`]: record boundary type, severity mapping, formatted entries
//! - [`labels`]: label sources and layered label resolution
//! - [`batch`]: grouping of entries into label-identical streams
//! - [`wire`]: version-dependent push payload encoding
//! - [`client`]: HTTP delivery with failure classification
//! - [`handler`]: synchronous (blocking) delivery path
//! - [`relay`]: queued delivery path with a dedicated worker

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod client;
pub mod config;
pub mod entry;
pub mod handler;
pub mod labels;
pub mod relay;
pub mod wire;

pub use client::{DeliveryClient, DeliveryError};
pub use config::{Config, ConfigError};
pub use entry::{Level, LogEntry, LogRecord};
pub use handler::LokiHandler;
pub use labels::{LabelSet, LabelValue};
pub use relay::QueuedRelay;
pub use wire::PayloadVersion;
