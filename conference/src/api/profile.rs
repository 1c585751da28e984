//! Profile API endpoints.
//!
//! - GET /api/profile - The caller's profile, created on first access
//! - POST /api/profile - Update display name and tee-shirt size

use crate::forms::ProfileMiniForm;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use conference_core::Profile;
use conference_web::{AppError, CurrentUser};

/// Get the caller's profile.
///
/// ```bash
/// curl http://localhost:8080/api/profile \
///   -H "X-User-Id: alice" -H "X-User-Email: alice@example.com"
/// ```
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.services.profiles.get_profile(&caller).await?))
}

/// Update the caller's profile.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/profile \
///   -H "X-User-Id: alice" -H "X-User-Email: alice@example.com" \
///   -H "Content-Type: application/json" \
///   -d '{"displayName": "Alice", "teeShirtSize": "M_W"}'
/// ```
pub async fn save_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(form): Json<ProfileMiniForm>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.services.profiles.save_profile(&caller, form).await?))
}
