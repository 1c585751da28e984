//! Wishlist API endpoints.
//!
//! - POST /api/wishlist - Add a session
//! - GET /api/wishlist - The caller's wishlist
//! - DELETE /api/wishlist/:session_key - Remove a session

use crate::forms::{BooleanMessage, WishlistForm, WishlistView};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conference_web::{AppError, CurrentUser};

/// Add a session to the caller's wishlist.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/wishlist \
///   -H "X-User-Id: alice" -H "X-User-Email: alice@example.com" \
///   -H "Content-Type: application/json" \
///   -d '{"sessionKey": "<websafeKey>"}'
/// ```
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(form): Json<WishlistForm>,
) -> Result<(StatusCode, Json<WishlistView>), AppError> {
    let view = state
        .services
        .wishlist
        .add_to_wishlist(&caller, &form.session_key)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// The caller's wishlist.
pub async fn wishlist(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<WishlistView>>, AppError> {
    Ok(Json(state.services.wishlist.wishlist(&caller).await?))
}

/// Remove a session from the caller's wishlist.
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(session_key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    let data = state
        .services
        .wishlist
        .remove_from_wishlist(&caller, &session_key)
        .await?;
    Ok(Json(BooleanMessage { data }))
}
