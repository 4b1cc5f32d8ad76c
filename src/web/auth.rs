//! HTTP Basic authentication against the stored admin password.
//!
//! The username is ignored. With no admin password configured every
//! request is rejected.

use super::api::ApiError;
use crate::context::AppContext;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub async fn require_basic_auth(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = ctx.config.reload().await?;

    if config.admin_password.is_empty() {
        tracing::error!("No admin password configured, rejecting request");
        return Err(ApiError::Unauthorized);
    }

    let supplied = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(basic_password);

    match supplied {
        Some(password) if password == config.admin_password => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Password part of a `Basic` authorization header.
fn basic_password(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_, password) = decoded.split_once(':')?;
    Some(password.to_string())
}
