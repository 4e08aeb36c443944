//! Prometheus metrics for the worker loop.
//!
//! [`WorkerMetrics`] owns a dedicated [`Registry`] that the HTTP `/metrics`
//! endpoint encodes into the text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

pub struct WorkerMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub messages_received: IntCounter,
    pub messages_succeeded: IntCounter,
    pub messages_failed: IntCounter,
    pub empty_polls: IntCounter,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one handler invocation, in seconds.
    pub handler_duration_seconds: Histogram,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_received = register_int_counter_with_registry!(
            Opts::new(
                "tokengrid_worker_messages_received_total",
                "Messages leased from the work queue"
            ),
            registry
        )
        .expect("failed to register messages_received counter");

        let messages_succeeded = register_int_counter_with_registry!(
            Opts::new(
                "tokengrid_worker_messages_succeeded_total",
                "Messages handled and acknowledged"
            ),
            registry
        )
        .expect("failed to register messages_succeeded counter");

        let messages_failed = register_int_counter_with_registry!(
            Opts::new(
                "tokengrid_worker_messages_failed_total",
                "Messages whose handler failed; left for redelivery"
            ),
            registry
        )
        .expect("failed to register messages_failed counter");

        let empty_polls = register_int_counter_with_registry!(
            Opts::new(
                "tokengrid_worker_empty_polls_total",
                "Long polls that returned no message"
            ),
            registry
        )
        .expect("failed to register empty_polls counter");

        // 10 ms → ~5.5 min; a full token scan can be slow.
        let handler_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "tokengrid_worker_handler_duration_seconds",
                "Handler duration in seconds"
            )
            .buckets(prometheus::exponential_buckets(0.01, 2.0, 16).unwrap()),
            registry
        )
        .expect("failed to register handler_duration_seconds histogram");

        Self {
            registry,
            messages_received,
            messages_succeeded,
            messages_failed,
            empty_polls,
            handler_duration_seconds,
        }
    }

    /// Prometheus text exposition of every metric in the registry.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
