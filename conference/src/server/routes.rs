//! Router configuration for the conference server.

use super::health::readiness_check;
use super::state::AppState;
use crate::api::{conferences, profile, sessions, wishlist};
use axum::{
    Router,
    routing::{delete, get, post},
};
use conference_web::correlation_id_layer;
use conference_web::handlers::health_check;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/ready` (no identity)
/// - profile, conference, session and wishlist endpoints under `/api`
///
/// Every request gets a correlation id and a trace span.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Profile
        .route(
            "/profile",
            get(profile::get_profile).post(profile::save_profile),
        )
        // Conferences
        .route("/conferences", post(conferences::create_conference))
        .route("/conferences/query", post(conferences::query_conferences))
        .route("/conferences/created", get(conferences::conferences_created))
        .route(
            "/conferences/attending",
            get(conferences::conferences_to_attend),
        )
        .route("/conferences/announcement", get(conferences::announcement))
        .route(
            "/conferences/:key",
            get(conferences::get_conference).put(conferences::update_conference),
        )
        .route(
            "/conferences/:key/registration",
            post(conferences::register).delete(conferences::unregister),
        )
        // Sessions
        .route(
            "/conferences/:key/sessions",
            post(sessions::create_session).get(sessions::conference_sessions),
        )
        .route(
            "/conferences/:key/sessions/type/:type_of_session",
            get(sessions::conference_sessions_by_type),
        )
        .route("/sessions/speaker/:speaker", get(sessions::sessions_by_speaker))
        .route(
            "/sessions/by-speaker-duration",
            get(sessions::sessions_by_speaker_within_duration),
        )
        .route("/sessions/by-type-date", get(sessions::sessions_by_type_on_date))
        .route("/sessions/before-seven", get(sessions::sessions_before_seven))
        .route("/sessions/featured-speaker", get(sessions::featured_speaker))
        // Wishlist
        .route(
            "/wishlist",
            post(wishlist::add_to_wishlist).get(wishlist::wishlist),
        )
        .route(
            "/wishlist/:session_key",
            delete(wishlist::remove_from_wishlist),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
