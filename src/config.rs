//! Configuration parsing for the muxbatch binary.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;

use crate::batch::buffer::LimitsError;
use crate::flow::batcher::BatcherConfig;

/// Muxbatch: stage messages into dual-limit batches for multiplexed dispatch.
#[derive(Parser, Debug, Clone)]
#[command(name = "muxbatch")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Maximum number of messages per batch
    #[arg(long, env = "MUXBATCH_MAX_ELEMENTS", default_value_t = 100)]
    pub max_elements: usize,

    /// Maximum cumulative payload bytes per batch
    #[arg(long, env = "MUXBATCH_MAX_SIZE_BYTES", default_value_t = 1024 * 1024)]
    pub max_size_bytes: usize,

    /// Flush pending messages at least this often (milliseconds)
    #[arg(long, env = "MUXBATCH_FLUSH_INTERVAL_MS", default_value_t = 50)]
    pub flush_interval_ms: u64,

    /// Size of the submission channel (backpressure control)
    #[arg(long, env = "MUXBATCH_CHANNEL_SIZE", default_value_t = 1024)]
    pub channel_size: usize,

    /// Topic label attached to every envelope
    #[arg(short, long, env = "MUXBATCH_TOPIC")]
    pub topic: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "MUXBATCH_LOG_JSON")]
    pub log_json: bool,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the batching settings.
    pub fn batcher_config(&self) -> Result<BatcherConfig, LimitsError> {
        BatcherConfig::from_config(
            self.max_elements,
            self.max_size_bytes,
            self.flush_interval_ms,
            self.channel_size,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_elements: 100,
            max_size_bytes: 1024 * 1024,
            flush_interval_ms: 50,
            channel_size: 1024,
            topic: None,
            log_level: "info".into(),
            log_json: false,
            otel_endpoint: None,
        }
    }
}
