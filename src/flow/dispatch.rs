//! Dispatcher seam between the batching loop and the transport.
//!
//! The loop hands each drained batch to a [`Dispatcher`]; what happens to a
//! batch after that, including failure handling, is the dispatcher's job.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch channel closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Why a batch boundary was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// The buffer rejected a message.
    Full,
    /// The flush interval elapsed with messages pending.
    Interval,
    /// A handle requested a flush.
    Manual,
    /// The batching loop is stopping.
    Shutdown,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Interval => "interval",
            Self::Manual => "manual",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A drained batch ready for the transport.
#[derive(Debug, Clone)]
pub struct Batch<M> {
    /// Sequence number, starting at 1 for each batching loop.
    pub sequence: u64,
    pub reason: FlushReason,
    /// Summed payload size of `messages`.
    pub size_bytes: usize,
    pub messages: Vec<M>,
}

impl<M> Batch<M> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Downstream consumer of drained batches.
pub trait Dispatcher<M>: Send + 'static {
    /// Take ownership of a batch and send it on.
    fn dispatch(
        &mut self,
        batch: Batch<M>,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Dispatcher that forwards batches into a bounded channel.
///
/// Sending waits for channel capacity, so a slow consumer applies
/// backpressure to the batching loop.
#[derive(Debug)]
pub struct ChannelDispatcher<M> {
    sender: mpsc::Sender<Batch<M>>,
}

impl<M> Clone for ChannelDispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M: Send + 'static> ChannelDispatcher<M> {
    /// Create a dispatcher and the receiver its batches arrive on.
    ///
    /// A zero capacity is raised to 1.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Batch<M>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl<M: Send + 'static> Dispatcher<M> for ChannelDispatcher<M> {
    async fn dispatch(&mut self, batch: Batch<M>) -> Result<(), DispatchError> {
        self.sender
            .send(batch)
            .await
            .map_err(|_| DispatchError::Closed)
    }
}
