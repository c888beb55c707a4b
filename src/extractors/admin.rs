//! Bearer-token guard for the admin API.

use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

/// Proof that the request carried the configured admin token.
#[derive(Clone, Copy, Debug)]
pub struct AdminAuth;

/// Compares every byte so the time taken does not reveal the matching prefix.
fn token_matches(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let expected = app
            .admin_token
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("admin API disabled: ADMIN_TOKEN is not set".into()))?;
        let given = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("expected Authorization: Bearer <token>".into()))?;
        if !token_matches(given, expected) {
            tracing::warn!(path = %parts.uri.path(), "admin request with invalid token");
            return Err(AppError::Unauthorized("invalid admin token".into()));
        }
        Ok(AdminAuth)
    }
}
