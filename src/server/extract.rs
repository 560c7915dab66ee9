//! Request extractors.

use super::error::ApiError;
use super::AppState;
use crate::auth::{Identity, Operation};
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;

/// Name of the session cookie set at login
pub const SESSION_COOKIE: &str = "session";

/// Authenticated caller.
///
/// The session token is taken from `Authorization: Bearer <token>` or,
/// failing that, the `session` cookie.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub token: String,
}

impl Caller {
    /// Reject unless the caller's role may perform `op`.
    pub fn authorize(&self, op: Operation) -> Result<&Identity, ApiError> {
        self.identity.authorize(op)?;
        Ok(&self.identity)
    }
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let identity = state
            .sessions
            .resolve(&token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Caller { identity, token })
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
