//! Readiness endpoint backed by live dependency checks.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use conference_runtime::HealthReport;
use conference_web::handlers::readiness;

/// Readiness check endpoint.
///
/// Checks the entity store and the cache. A failing cache only degrades the report.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"healthy","checks":[{"component":"store","status":"healthy"},...],"timestamp":"..."}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    readiness(state.services.health_checks().await)
}
