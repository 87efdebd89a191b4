//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the runtime:
//! - Store actions and reducer latency
//! - Effect execution
//! - Bus publish / delivery / loss
//!
//! Domain crates record their own counters through the re-exported macros.
//!
//! # Example
//!
//! ```rust,no_run
//! use queue_relay_runtime::metrics::MetricsRecorder;
//!
//! let mut recorder = MetricsRecorder::new();
//! recorder.start()?;
//! println!("{}", recorder.render().unwrap_or_default());
//! # Ok::<(), queue_relay_runtime::metrics::MetricsError>(())
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Process-wide Prometheus recorder.
///
/// Installs a global recorder and renders the Prometheus text format on demand.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (common in tests) is logged and tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_1, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("store_actions_total", "Total number of actions reduced");
    describe_counter!(
        "store_actions_rejected_total",
        "Actions rejected because the store was shutting down"
    );
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time taken to run the reducer for one action"
    );
    describe_counter!("store_effects_total", "Total number of effects executed");
    describe_counter!("store_effects_failed_total", "Effects that failed");

    describe_counter!("bus_messages_published_total", "Envelopes handed to the bus");
    describe_counter!(
        "bus_messages_unheard_total",
        "Envelopes published while nobody was subscribed"
    );
    describe_counter!("bus_messages_delivered_total", "Envelopes delivered to a subscriber");
    describe_counter!(
        "bus_messages_lost_total",
        "Envelopes a lagging subscriber never received"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one reduced action.
    pub fn record_action(duration: Duration, effect_count: usize) {
        counter!("store_actions_total").increment(1);
        histogram!("store_reducer_duration_seconds").record(duration.as_secs_f64());
        tracing::trace!(effect_count, "Action reduced");
    }

    /// Record an action rejected during shutdown.
    pub fn record_rejected() {
        counter!("store_actions_rejected_total").increment(1);
    }

    /// Record an executed effect.
    pub fn record_effect(kind: &'static str) {
        counter!("store_effects_total", "type" => kind).increment(1);
    }

    /// Record a failed effect.
    pub fn record_effect_failure(kind: &'static str) {
        counter!("store_effects_failed_total", "type" => kind).increment(1);
    }
}

/// Bus metrics recorder.
pub struct BusMetrics;

impl BusMetrics {
    /// Record a publish and how many subscribers it reached.
    pub fn record_publish(receivers: usize) {
        counter!("bus_messages_published_total").increment(1);
        if receivers == 0 {
            counter!("bus_messages_unheard_total").increment(1);
        }
    }

    /// Record a delivery to one subscriber.
    pub fn record_delivery() {
        counter!("bus_messages_delivered_total").increment(1);
    }

    /// Record envelopes skipped by a lagging subscriber.
    pub fn record_lost(count: u64) {
        counter!("bus_messages_lost_total").increment(count);
    }
}
