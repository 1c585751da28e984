//! Custom Axum extractors.
//!
//! - `CurrentUser`: caller identity forwarded by the fronting identity proxy
//! - `CorrelationId`: extract or generate request correlation IDs
//! - `QueryParams`: query string deserialization with JSON error bodies
//!
//! # Examples
//!
//! ```ignore
//! use conference_web::extractors::{CorrelationId, CurrentUser};
//!
//! async fn handler(
//!     State(app): State<AppState>,
//!     CurrentUser(caller): CurrentUser,
//!     correlation_id: CorrelationId,
//! ) -> Result<Json<Profile>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, user_id = %caller.user_id, "Loading profile");
//!     Ok(Json(app.profiles.get_profile(&caller).await?))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{HeaderMap, request::Parts},
};
use conference_core::{Caller, ConferenceError};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Header carrying the authenticated user's email address.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
/// Header carrying the authenticated user's display name (optional).
pub const USER_NAME_HEADER: &str = "X-User-Name";

/// The authenticated caller.
///
/// Authentication happens in front of the service; the proxy forwards the identity in
/// [`USER_ID_HEADER`], [`USER_EMAIL_HEADER`] and, optionally, [`USER_NAME_HEADER`].
/// A request without a user id or email is rejected with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Caller);

impl CurrentUser {
    /// Read the caller from request headers.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Unauthenticated`] if the id or email header is missing or blank.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ConferenceError> {
        let user_id = header(headers, USER_ID_HEADER).ok_or(ConferenceError::Unauthenticated)?;
        let email = header(headers, USER_EMAIL_HEADER).ok_or(ConferenceError::Unauthenticated)?;

        let mut caller = Caller::new(user_id, email);
        caller.display_name = header(headers, USER_NAME_HEADER).map(str::to_string);
        Ok(Self(caller))
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).map_err(AppError::from)
    }
}

/// Correlation ID for request tracing.
///
/// Uses the id stored by the correlation-id middleware when installed, otherwise the
/// `X-Correlation-ID` header, otherwise a fresh UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Query string parameters.
///
/// Same as [`Query`], but a missing or malformed parameter is rejected with an
/// [`AppError`] body instead of plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(params))
    }
}
