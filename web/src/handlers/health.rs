//! Health check endpoints.
//!
//! Load balancers poll these to route traffic.

use axum::{Json, http::StatusCode};
use conference_runtime::{HealthCheck, HealthReport};

/// Liveness: the process is up. Does NOT check dependencies.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness response for a set of dependency checks.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded (a degraded advisory cache does not stop traffic)
/// - 503 Service Unavailable: Unhealthy
///
/// ```json
/// {
///   "status": "degraded",
///   "checks": [
///     { "component": "store", "status": "healthy" },
///     { "component": "cache", "status": "degraded", "message": "connection refused" }
///   ],
///   "timestamp": "2026-01-01T00:00:00Z"
/// }
/// ```
#[must_use]
pub fn readiness(checks: Vec<HealthCheck>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::new(checks);
    let status = if report.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
