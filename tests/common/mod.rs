//! Test utilities for muxbatch integration tests.
//!
//! Provides:
//! - A recording dispatcher that keeps every batch it receives
//! - A dispatcher that fails on selected batches
//! - Polling helper for asynchronous conditions

#![allow(dead_code)]

use muxbatch::{Batch, DispatchError, Dispatcher};
use std::sync::{Arc, Mutex};

/// Dispatcher that stores every batch for later inspection.
///
/// Clones share the same record, so the test keeps one clone while the
/// batching loop owns the other.
#[derive(Clone)]
pub struct RecordingDispatcher<M> {
    batches: Arc<Mutex<Vec<Batch<M>>>>,
    fail_sequences: Arc<Vec<u64>>,
}

impl<M> RecordingDispatcher<M> {
    /// Create a dispatcher that accepts every batch.
    pub fn new() -> Self {
        Self::failing_on(Vec::new())
    }

    /// Create a dispatcher that reports a transport error for the given
    /// batch sequence numbers. Failed batches are still recorded.
    pub fn failing_on(sequences: Vec<u64>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            fail_sequences: Arc::new(sequences),
        }
    }

    /// Number of batches received so far.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl<M: Clone> RecordingDispatcher<M> {
    /// Snapshot of the received batches.
    pub fn batches(&self) -> Vec<Batch<M>> {
        self.batches.lock().unwrap().clone()
    }
}

impl<M: Send + 'static> Dispatcher<M> for RecordingDispatcher<M> {
    async fn dispatch(&mut self, batch: Batch<M>) -> Result<(), DispatchError> {
        let sequence = batch.sequence;
        self.batches.lock().unwrap().push(batch);
        if self.fail_sequences.contains(&sequence) {
            return Err(DispatchError::Transport(format!(
                "injected failure for batch {sequence}"
            )));
        }
        Ok(())
    }
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
