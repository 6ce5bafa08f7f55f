//! `session_id` cookie handling.
//!
//! Sessions are anonymous: the cookie value is a UUID that doubles as the
//! user id. [`Session`] is an extractor that rejects requests without a
//! valid cookie with `401`.

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use parcel_types::UserId;

use crate::error::ApiError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// The caller's user id, taken from the `session_id` cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers)
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("missing or invalid session cookie".to_owned()))
    }
}

/// The user id in the request's `session_id` cookie, if present and valid.
pub fn session_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// A `Set-Cookie` header carrying `user` as the session id.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] if the header value cannot be built.
pub fn session_cookie(user: UserId) -> Result<(axum::http::HeaderName, HeaderValue), ApiError> {
    let value = format!("{SESSION_COOKIE}={user}; Path=/; HttpOnly; SameSite=Lax");
    let value = HeaderValue::from_str(&value)
        .map_err(|e| ApiError::Internal(format!("invalid cookie header: {e}")))?;
    Ok((SET_COOKIE, value))
}
