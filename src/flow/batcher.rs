//! Batching loop that owns the accumulate/drain cycle.
//!
//! A single task is the only writer of its [`BatchBuffer`]:
//! - Producers submit through a bounded channel (backpressure)
//! - A rejected message triggers a flush, then is admitted into the fresh buffer
//! - A timer flushes pending messages every `flush_interval`

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::dispatch::{Batch, Dispatcher, FlushReason};
use crate::batch::buffer::{BatchBuffer, BufferLimits, LimitsError};
use crate::message::Measured;
use crate::observability::metrics::{
    record_admitted, record_batch, record_dispatch_failure, record_rejection,
};

/// Error type for batcher handle operations.
#[derive(Debug, Error)]
pub enum BatcherError {
    #[error("Batching loop has stopped")]
    ChannelClosed,

    #[error("Batching task panicked")]
    TaskPanic,
}

/// Configuration for a batching loop.
#[derive(Debug, Clone, Copy)]
pub struct BatcherConfig {
    /// Capacity limits of the staging buffer
    pub limits: BufferLimits,
    /// Pending messages are flushed at least this often
    pub flush_interval: Duration,
    /// Capacity of the submission channel
    pub channel_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            limits: BufferLimits::default(),
            flush_interval: Duration::from_millis(50),
            channel_size: 1024,
        }
    }
}

impl BatcherConfig {
    /// Create a BatcherConfig from application config values.
    pub fn from_config(
        max_elements: usize,
        max_size_bytes: usize,
        flush_interval_ms: u64,
        channel_size: usize,
    ) -> Result<Self, LimitsError> {
        Ok(Self {
            limits: BufferLimits::new(max_elements, max_size_bytes)?,
            flush_interval: Duration::from_millis(flush_interval_ms.max(1)),
            channel_size: channel_size.max(1),
        })
    }
}

/// Counters reported when a batching loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatcherStats {
    /// Batches handed to the dispatcher
    pub batches: u64,
    /// Messages admitted into the buffer
    pub messages: u64,
    /// Admission attempts refused because a limit was reached
    pub rejections: u64,
    /// Batches the dispatcher failed to send
    pub dispatch_failures: u64,
}

enum Command<M> {
    Submit(M),
    Flush(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle for submitting messages to a running batching loop.
#[derive(Debug)]
pub struct BatcherHandle<M> {
    sender: mpsc::Sender<Command<M>>,
}

impl<M> Clone for BatcherHandle<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> std::fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit(_) => f.write_str("Submit"),
            Self::Flush(_) => f.write_str("Flush"),
            Self::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl<M> BatcherHandle<M> {
    /// Submit a message for batching.
    ///
    /// Waits while the submission channel is full.
    pub async fn submit(&self, message: M) -> Result<(), BatcherError> {
        self.sender
            .send(Command::Submit(message))
            .await
            .map_err(|_| BatcherError::ChannelClosed)
    }

    /// Flush pending messages now.
    ///
    /// Returns the number of messages in the flushed batch (0 if the buffer
    /// was empty).
    pub async fn flush(&self) -> Result<usize, BatcherError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Flush(tx))
            .await
            .map_err(|_| BatcherError::ChannelClosed)?;
        rx.await.map_err(|_| BatcherError::ChannelClosed)
    }

    /// Flush what remains and stop the batching loop.
    pub async fn shutdown(&self) -> Result<(), BatcherError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Shutdown(tx))
            .await
            .map_err(|_| BatcherError::ChannelClosed)?;
        rx.await.map_err(|_| BatcherError::ChannelClosed)
    }

    /// Check whether the batching loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Join handle for a spawned batching loop.
#[derive(Debug)]
pub struct BatcherTask {
    handle: JoinHandle<BatcherStats>,
}

impl BatcherTask {
    /// Wait for the loop to stop and collect its counters.
    pub async fn join(self) -> Result<BatcherStats, BatcherError> {
        self.handle.await.map_err(|_| BatcherError::TaskPanic)
    }
}

/// Batching loop state, owned by the spawned task.
pub struct Batcher<M, D> {
    buffer: BatchBuffer<M>,
    dispatcher: D,
    sequence: u64,
    stats: BatcherStats,
}

impl<M, D> Batcher<M, D>
where
    M: Measured + Clone + Send + 'static,
    D: Dispatcher<M>,
{
    /// Spawn a batching loop on the current tokio runtime.
    ///
    /// The loop stops after [`BatcherHandle::shutdown`] or once every
    /// handle has been dropped; either way pending messages are flushed.
    pub fn spawn(config: BatcherConfig, dispatcher: D) -> (BatcherHandle<M>, BatcherTask) {
        let (sender, receiver) = mpsc::channel(config.channel_size.max(1));
        let batcher = Self {
            buffer: BatchBuffer::new(config.limits),
            dispatcher,
            sequence: 0,
            stats: BatcherStats::default(),
        };
        let flush_interval = config.flush_interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(batcher.run(receiver, flush_interval));
        (BatcherHandle { sender }, BatcherTask { handle })
    }

    #[tracing::instrument(
        name = "batcher",
        skip_all,
        fields(
            max_elements = self.buffer.limits().max_elements(),
            max_size_bytes = self.buffer.limits().max_size_bytes()
        )
    )]
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command<M>>,
        flush_interval: Duration,
    ) -> BatcherStats {
        let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            flush_interval_ms = flush_interval.as_millis() as u64,
            "Batching loop started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit(message)) => self.admit(message).await,
                    Some(Command::Flush(ack)) => {
                        let flushed = self.flush(FlushReason::Manual).await;
                        let _ = ack.send(flushed);
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.flush(FlushReason::Shutdown).await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.flush(FlushReason::Shutdown).await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush(FlushReason::Interval).await;
                }
            }
        }

        tracing::info!(
            batches = self.stats.batches,
            messages = self.stats.messages,
            rejections = self.stats.rejections,
            dispatch_failures = self.stats.dispatch_failures,
            "Batching loop stopped"
        );
        self.stats
    }

    /// Admit a message, draining the buffer first if it is full.
    async fn admit(&mut self, message: M) {
        let mut pending = message;
        loop {
            match self.buffer.try_add(pending) {
                Ok(()) => {
                    self.stats.messages += 1;
                    record_admitted();
                    return;
                }
                Err(rejected) => {
                    // Limits are positive, so the buffer is non-empty here and
                    // the flush leaves room for the retry.
                    self.stats.rejections += 1;
                    record_rejection();
                    pending = rejected;
                    self.flush(FlushReason::Full).await;
                }
            }
        }
    }

    /// Copy the buffer into a batch, dispatch it, then reset the buffer.
    async fn flush(&mut self, reason: FlushReason) -> usize {
        if self.buffer.is_empty() {
            return 0;
        }

        self.sequence += 1;
        let batch = Batch {
            sequence: self.sequence,
            reason,
            size_bytes: self.buffer.size_bytes(),
            messages: self.buffer.copy(),
        };
        let count = batch.len();
        let size_bytes = batch.size_bytes;

        tracing::debug!(
            batch = batch.sequence,
            reason = reason.as_str(),
            messages = count,
            bytes = size_bytes,
            "Flushing batch"
        );
        record_batch(reason, count, size_bytes);

        if let Err(e) = self.dispatcher.dispatch(batch).await {
            self.stats.dispatch_failures += 1;
            record_dispatch_failure(reason);
            tracing::warn!(error = %e, batch = self.sequence, "Batch dispatch failed");
        }

        // The dispatcher owns the batch now, success or not.
        self.buffer.reset();
        self.stats.batches += 1;
        count
    }
}
