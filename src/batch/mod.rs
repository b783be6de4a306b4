//! Dual-limit batching buffer.
//!
//! - [`buffer`]: Single-writer buffer with count and byte-size limits
//! - [`shared`]: Mutex-guarded handle for concurrent producers

pub mod buffer;
pub mod shared;
