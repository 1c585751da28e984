//! Conference API endpoints.
//!
//! - POST /api/conferences - Create a conference (requires identity)
//! - POST /api/conferences/query - Filter conferences
//! - GET /api/conferences/created - Conferences organised by the caller
//! - GET /api/conferences/attending - Conferences the caller registered for
//! - GET /api/conferences/announcement - Nearly-sold-out announcement
//! - GET /api/conferences/:key - Conference details
//! - PUT /api/conferences/:key - Update (organizer only)
//! - POST /api/conferences/:key/registration - Register
//! - DELETE /api/conferences/:key/registration - Unregister

use crate::forms::{BooleanMessage, ConferenceForm, ConferenceQueryForm, ConferenceView, StringMessage};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conference_web::{AppError, CorrelationId, CurrentUser};

/// Create a conference organised by the caller.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/conferences \
///   -H "X-User-Id: alice" -H "X-User-Email: alice@example.com" \
///   -H "Content-Type: application/json" \
///   -d '{"name": "RustConf", "city": "Portland", "maxAttendees": 500, "startDate": "2026-09-08"}'
/// ```
pub async fn create_conference(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    correlation_id: CorrelationId,
    Json(form): Json<ConferenceForm>,
) -> Result<(StatusCode, Json<ConferenceView>), AppError> {
    tracing::debug!(correlation_id = %correlation_id.0, user_id = %caller.user_id, "Creating conference");
    let view = state
        .services
        .conferences
        .create_conference(&caller, form)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Query conferences with filter triples.
///
/// Public endpoint - no identity required.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/conferences/query \
///   -H "Content-Type: application/json" \
///   -d '{"filters": [{"field": "CITY", "operator": "EQ", "value": "London"},
///                    {"field": "MAX_ATTENDEES", "operator": "GT", "value": "10"}]}'
/// ```
pub async fn query_conferences(
    State(state): State<AppState>,
    Json(form): Json<ConferenceQueryForm>,
) -> Result<Json<Vec<ConferenceView>>, AppError> {
    let conferences = state
        .services
        .conferences
        .query_conferences(&form.filters)
        .await?;
    Ok(Json(conferences))
}

/// Conferences organised by the caller.
pub async fn conferences_created(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<ConferenceView>>, AppError> {
    Ok(Json(
        state.services.conferences.conferences_created(&caller).await?,
    ))
}

/// Conferences the caller is registered for.
pub async fn conferences_to_attend(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<ConferenceView>>, AppError> {
    Ok(Json(
        state
            .services
            .conferences
            .conferences_to_attend(&caller)
            .await?,
    ))
}

/// The cached announcement, empty if none.
pub async fn announcement(State(state): State<AppState>) -> Json<StringMessage> {
    Json(StringMessage {
        data: state.services.announcements.announcement().await,
    })
}

/// Get a conference by websafe key.
///
/// Public endpoint - no identity required.
pub async fn get_conference(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ConferenceView>, AppError> {
    Ok(Json(state.services.conferences.get_conference(&key).await?))
}

/// Update a conference organised by the caller.
///
/// ```bash
/// curl -X PUT http://localhost:8080/api/conferences/<websafeKey> \
///   -H "X-User-Id: alice" -H "X-User-Email: alice@example.com" \
///   -H "Content-Type: application/json" \
///   -d '{"maxAttendees": 800}'
/// ```
pub async fn update_conference(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(key): Path<String>,
    Json(form): Json<ConferenceForm>,
) -> Result<Json<ConferenceView>, AppError> {
    let view = state
        .services
        .conferences
        .update_conference(&caller, &key, form)
        .await?;
    Ok(Json(view))
}

/// Register the caller for a conference.
pub async fn register(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    correlation_id: CorrelationId,
    Path(key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    tracing::debug!(correlation_id = %correlation_id.0, user_id = %caller.user_id, "Registering");
    let data = state.services.conferences.register(&caller, &key).await?;
    Ok(Json(BooleanMessage { data }))
}

/// Cancel the caller's registration.
///
/// `{"data": false}` if the caller was not registered.
pub async fn unregister(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    let data = state.services.conferences.unregister(&caller, &key).await?;
    Ok(Json(BooleanMessage { data }))
}
