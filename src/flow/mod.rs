//! Batch flow from producers to the transport.
//!
//! - [`batcher`]: The batching loop task and its handle
//! - [`dispatch`]: Dispatcher trait and channel-backed dispatcher

pub mod batcher;
pub mod dispatch;
