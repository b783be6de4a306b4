//! Muxbatch: a dual-limit batching buffer for multiplexed dispatch.
//!
//! Messages are staged in memory until either a message-count limit or a
//! cumulative byte-size limit is reached, then drained as one batch and
//! handed to a dispatcher.
//!
//! # Architecture
//!
//! - **Pre-admission gate**: limits are checked against the buffer contents
//!   before a candidate is admitted, never trimmed afterwards
//! - **Explicit sizing**: every message reports its own byte size
//! - **Single writer**: one batching task owns the accumulate/drain cycle
//! - **Observable**: tracing spans and OpenTelemetry metrics
//!
//! # Modules
//!
//! - [`batch`]: The batching buffer and its shared, lock-guarded handle
//! - [`config`]: CLI and environment configuration
//! - [`flow`]: Batching loop and dispatcher seam
//! - [`message`]: Measured messages and the envelope type
//! - [`observability`]: Metrics and tracing setup

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // batch::buffer::BatchBuffer is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod batch;
pub mod config;
pub mod flow;
pub mod message;
pub mod observability;

pub use batch::buffer::{BatchBuffer, BufferLimits, LimitsError};
pub use batch::shared::SharedBuffer;
pub use flow::batcher::{
    Batcher, BatcherConfig, BatcherError, BatcherHandle, BatcherStats, BatcherTask,
};
pub use flow::dispatch::{Batch, ChannelDispatcher, DispatchError, Dispatcher, FlushReason};
pub use message::{Envelope, Measured};

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) correlation ID.
///
/// The demultiplexing side uses this handle to route a response back to
/// the producer of the message.
///
/// # Example
///
/// ```
/// let id = muxbatch::generate_correlation_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_correlation_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
