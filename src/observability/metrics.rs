//! OTLP metrics implementation.
//!
//! Key metrics:
//! - muxbatch_messages_total: Counter for admitted messages
//! - muxbatch_rejections_total: Counter for refused admissions
//! - muxbatch_batches_total: Counter for flushed batches, by reason
//! - muxbatch_batch_messages: Histogram of messages per batch
//! - muxbatch_batch_bytes: Histogram of payload bytes per batch
//! - muxbatch_dispatch_failures_total: Counter for failed dispatches

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

use crate::flow::dispatch::FlushReason;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Muxbatch metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Messages admitted into a buffer.
    pub messages_total: Counter<u64>,
    /// Admission attempts refused because a limit was reached.
    pub rejections_total: Counter<u64>,
    /// Batches flushed, labelled by reason.
    pub batches_total: Counter<u64>,
    /// Messages per flushed batch.
    pub batch_messages: Histogram<u64>,
    /// Payload bytes per flushed batch.
    pub batch_bytes: Histogram<u64>,
    /// Batches the dispatcher failed to send.
    pub dispatch_failures_total: Counter<u64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            messages_total: meter
                .u64_counter("muxbatch_messages_total")
                .with_description("Total number of admitted messages")
                .with_unit("1")
                .init(),
            rejections_total: meter
                .u64_counter("muxbatch_rejections_total")
                .with_description("Admissions refused because a buffer limit was reached")
                .with_unit("1")
                .init(),
            batches_total: meter
                .u64_counter("muxbatch_batches_total")
                .with_description("Total number of flushed batches")
                .with_unit("1")
                .init(),
            batch_messages: meter
                .u64_histogram("muxbatch_batch_messages")
                .with_description("Number of messages in a flushed batch")
                .with_unit("1")
                .init(),
            batch_bytes: meter
                .u64_histogram("muxbatch_batch_bytes")
                .with_description("Summed payload size of a flushed batch")
                .with_unit("By")
                .init(),
            dispatch_failures_total: meter
                .u64_counter("muxbatch_dispatch_failures_total")
                .with_description("Batches the dispatcher failed to send")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, using no-op metrics");
                    install_manual_provider();
                }
            }
        } else {
            // Recorded but not exported
            install_manual_provider();
        }

        let meter = global::meter("muxbatch");
        Metrics::new(&meter)
    });
}

fn install_manual_provider() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record an admitted message.
pub fn record_admitted() {
    if let Some(m) = METRICS.get() {
        m.messages_total.add(1, &[]);
    }
}

/// Record a refused admission.
pub fn record_rejection() {
    if let Some(m) = METRICS.get() {
        m.rejections_total.add(1, &[]);
    }
}

/// Record a flushed batch.
pub fn record_batch(reason: FlushReason, messages: usize, size_bytes: usize) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("reason", reason.as_str())];
        m.batches_total.add(1, &attrs);
        m.batch_messages.record(messages as u64, &attrs);
        m.batch_bytes.record(size_bytes as u64, &attrs);
    }
}

/// Record a batch the dispatcher failed to send.
pub fn record_dispatch_failure(reason: FlushReason) {
    if let Some(m) = METRICS.get() {
        m.dispatch_failures_total
            .add(1, &[KeyValue::new("reason", reason.as_str())]);
    }
}
