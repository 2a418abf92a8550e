//! Bearer-token gate for the category sub-services
//!
//! The token is the SHA-256 hex digest of the shared pass key.

use crate::config::AppConfig;
use crate::error::AggregatorError;
use crate::Result;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

/// SHA-256 hex digest of a shared secret
pub fn pass_hash(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// `Authorization: Bearer <token>` → `<token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

pub fn check_bearer(headers: &HeaderMap, expected: &str) -> Result<()> {
    match bearer_token(headers) {
        Some(token) if !expected.is_empty() && token == expected => Ok(()),
        Some(_) => Err(AggregatorError::AuthFailure("bearer token mismatch".to_string())),
        None => Err(AggregatorError::AuthFailure(
            "missing bearer token".to_string(),
        )),
    }
}

/// Rejects the request with 401 before it reaches a sub-service handler
pub async fn require_bearer(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = check_bearer(request.headers(), &config.pass_hash) {
        warn!(path = %request.uri().path(), "Rejected sub-service call: {}", e);
        return e.into_response();
    }

    next.run(request).await
}
