//! Muxbatch: stage newline-delimited messages into dual-limit batches.
//!
//! # Usage
//!
//! ```bash
//! tail -f events.log | muxbatch --max-elements 500 --max-size-bytes 65536
//! ```
//!
//! Each line on stdin becomes one message; lines are raw bytes and need not
//! be valid UTF-8. One JSON summary line is written to stdout per dispatched
//! batch.
//!
//! Environment variables can also be used:
//! - `MUXBATCH_MAX_ELEMENTS`: Maximum messages per batch
//! - `MUXBATCH_MAX_SIZE_BYTES`: Maximum payload bytes per batch
//! - `MUXBATCH_FLUSH_INTERVAL_MS`: Periodic flush interval
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use muxbatch::config::Config;
use muxbatch::observability::metrics::init_metrics_with_endpoint;
use muxbatch::observability::tracing::init_tracing;
use muxbatch::{Batch, Batcher, ChannelDispatcher, Envelope, FlushReason};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio_stream::wrappers::SplitStream;
use tokio_stream::StreamExt;

/// One line of batch output.
#[derive(Debug, Serialize)]
struct BatchSummary<'a> {
    batch: u64,
    reason: FlushReason,
    messages: usize,
    bytes: usize,
    ids: Vec<&'a str>,
}

impl<'a> BatchSummary<'a> {
    fn from_batch(batch: &'a Batch<Envelope>) -> Self {
        Self {
            batch: batch.sequence,
            reason: batch.reason,
            messages: batch.len(),
            bytes: batch.size_bytes,
            ids: batch.messages.iter().map(Envelope::correlation_id).collect(),
        }
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) and flip the shutdown flag.
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating shutdown...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = shutdown_tx.send(true);
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    init_tracing(&config.log_level, config.log_json);
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    let batcher_config = config
        .batcher_config()
        .context("invalid batching configuration")?;

    tracing::info!(
        max_elements = batcher_config.limits.max_elements(),
        max_size_bytes = batcher_config.limits.max_size_bytes(),
        flush_interval_ms = config.flush_interval_ms,
        "Starting muxbatch"
    );

    let (dispatcher, mut batches) = ChannelDispatcher::channel(16);
    let (handle, task) = Batcher::spawn(batcher_config, dispatcher);

    // Writer task: one JSON line per batch
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(batch) = batches.recv().await {
            let mut line = serde_json::to_vec(&BatchSummary::from_batch(&batch))?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    // Raw byte lines: payloads are opaque, so invalid UTF-8 is still a message
    let mut lines = SplitStream::new(BufReader::new(tokio::io::stdin()).split(b'\n'));
    let mut input_error = None;
    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(mut line)) => {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    let envelope = match &config.topic {
                        Some(topic) => Envelope::new(line).with_topic(topic.clone()),
                        None => Envelope::new(line),
                    };
                    handle.submit(envelope).await?;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Failed to read stdin, initiating shutdown...");
                    input_error = Some(e);
                    break;
                }
                None => {
                    tracing::info!("End of input, initiating shutdown...");
                    break;
                }
            },
            _ = shutdown_rx.changed() => break,
        }
    }

    handle.shutdown().await?;
    let stats = task.join().await?;
    writer.await.context("writer task panicked")??;

    tracing::info!(
        batches = stats.batches,
        messages = stats.messages,
        rejections = stats.rejections,
        "Muxbatch shutdown complete"
    );

    // Pending messages are flushed before a read failure is reported
    match input_error {
        Some(e) => Err(anyhow::Error::new(e).context("failed to read stdin")),
        None => Ok(()),
    }
}
