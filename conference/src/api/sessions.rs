//! Session API endpoints.
//!
//! - POST /api/conferences/:key/sessions - Create a session (organizer only)
//! - GET /api/conferences/:key/sessions - Sessions of a conference
//! - GET /api/conferences/:key/sessions/type/:type - Sessions of a conference by type
//! - GET /api/sessions/speaker/:speaker - Sessions by speaker
//! - GET /api/sessions/by-speaker-duration?speaker=..&duration=.. - Speaker, bounded length
//! - GET /api/sessions/by-type-date?typeOfSession=..&date=.. - Type on a date
//! - GET /api/sessions/before-seven - Non-workshops starting before 19:00
//! - GET /api/sessions/featured-speaker - Cached featured speaker message

use crate::forms::{SessionForm, SessionView, SpeakerDurationQuery, StringMessage, TypeDateQuery};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conference_web::{AppError, CurrentUser, QueryParams};

/// Add a session to a conference.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/conferences/<websafeKey>/sessions \
///   -H "X-User-Id: alice" -H "X-User-Email: alice@example.com" \
///   -H "Content-Type: application/json" \
///   -d '{"name": "Async Rust", "speaker": "Ferris", "duration": 45,
///        "typeOfSession": "Talk", "date": "2026-09-08", "startTime": "10:00"}'
/// ```
pub async fn create_session(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(conference_key): Path<String>,
    Json(form): Json<SessionForm>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state
        .services
        .sessions
        .create_session(&caller, &conference_key, form)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Sessions of a conference.
pub async fn conference_sessions(
    State(state): State<AppState>,
    Path(conference_key): Path<String>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(
        state
            .services
            .sessions
            .conference_sessions(&conference_key)
            .await?,
    ))
}

/// Sessions of a conference with one type.
pub async fn conference_sessions_by_type(
    State(state): State<AppState>,
    Path((conference_key, type_of_session)): Path<(String, String)>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(
        state
            .services
            .sessions
            .conference_sessions_by_type(&conference_key, &type_of_session)
            .await?,
    ))
}

/// Sessions given by one speaker.
pub async fn sessions_by_speaker(
    State(state): State<AppState>,
    Path(speaker): Path<String>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(
        state.services.sessions.sessions_by_speaker(&speaker).await?,
    ))
}

/// Sessions of one speaker up to a maximum duration.
pub async fn sessions_by_speaker_within_duration(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SpeakerDurationQuery>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(
        state
            .services
            .sessions
            .sessions_by_speaker_within_duration(&query.speaker, query.duration)
            .await?,
    ))
}

/// Sessions of one type on one date.
pub async fn sessions_by_type_on_date(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TypeDateQuery>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(
        state
            .services
            .sessions
            .sessions_by_type_on_date(&query.type_of_session, &query.date)
            .await?,
    ))
}

/// Non-workshop sessions before 19:00.
pub async fn sessions_before_seven(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(
        state
            .services
            .sessions
            .sessions_before_seven_excluding_workshops()
            .await?,
    ))
}

/// The cached featured speaker message, empty if none.
pub async fn featured_speaker(State(state): State<AppState>) -> Json<StringMessage> {
    Json(StringMessage {
        data: state.services.announcements.featured_speaker().await,
    })
}
