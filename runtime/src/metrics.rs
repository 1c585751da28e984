//! Prometheus metrics for the conference backend.
//!
//! Metric recorders are zero-sized structs grouped by concern; [`MetricsServer`]
//! installs the Prometheus recorder and renders the scrape output.
//!
//! # Example
//!
//! ```rust,no_run
//! use conference_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

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

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should be bound to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe every metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder that is
    /// already installed (several servers in one test binary) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                register_metrics();
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "conference_registrations_total",
        "Registration attempts by outcome"
    );
    describe_counter!(
        "conference_unregistrations_total",
        "Unregistration attempts by outcome"
    );
    describe_counter!(
        "conference_transaction_conflicts_total",
        "Transaction attempts aborted by a concurrent modification"
    );
    describe_histogram!(
        "conference_transaction_duration_seconds",
        "Time spent in a transaction including retries"
    );
    describe_counter!(
        "conference_conferences_created_total",
        "Conferences created"
    );
    describe_counter!("conference_sessions_created_total", "Sessions created");
    describe_counter!(
        "conference_tasks_total",
        "Background tasks processed by kind and outcome"
    );
}

/// Registration ledger metrics recorder.
pub struct RegistrationMetrics;

impl RegistrationMetrics {
    /// Record a register call.
    pub fn record_register(outcome: &'static str) {
        counter!("conference_registrations_total", "outcome" => outcome).increment(1);
    }

    /// Record an unregister call.
    pub fn record_unregister(outcome: &'static str) {
        counter!("conference_unregistrations_total", "outcome" => outcome).increment(1);
    }
}

/// Transaction runner metrics recorder.
pub struct TransactionMetrics;

impl TransactionMetrics {
    /// Record a conflicting attempt.
    pub fn record_conflict() {
        counter!("conference_transaction_conflicts_total").increment(1);
    }

    /// Record a finished transaction (committed or not).
    pub fn record_duration(duration: Duration) {
        histogram!("conference_transaction_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Creation metrics recorder.
pub struct CatalogMetrics;

impl CatalogMetrics {
    /// Record a conference creation.
    pub fn record_conference_created() {
        counter!("conference_conferences_created_total").increment(1);
    }

    /// Record a session creation.
    pub fn record_session_created() {
        counter!("conference_sessions_created_total").increment(1);
    }
}

/// Background task metrics recorder.
pub struct TaskMetrics;

impl TaskMetrics {
    /// Record a processed task.
    pub fn record(kind: &'static str, outcome: &'static str) {
        counter!("conference_tasks_total", "kind" => kind, "outcome" => outcome).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_render() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        RegistrationMetrics::record_register("registered");
        TransactionMetrics::record_conflict();
        TaskMetrics::record("send_confirmation_email", "ok");

        // Another test may have installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("conference_registrations_total"));
            assert!(rendered.contains("conference_transaction_conflicts_total"));
            assert!(rendered.contains("conference_tasks_total"));
        }
    }
}
