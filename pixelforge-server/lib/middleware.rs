//! Middleware components for the pixelforge server.
//!
//! This module handles:
//! - Authentication and acting-user resolution
//! - Request tracing and logging
//!
//! The auth middleware resolves the acting user before any mutating handler
//! runs; ownership checks against that user happen in pixelforge-core.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
};

use pixelforge_utils::DEFAULT_DEV_USER_ID;

use crate::{config, state::AppState, ServerError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The user a request authenticated as, inserted as a request extension
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

//--------------------------------------------------------------------------------------------------
// Middleware Functions
//--------------------------------------------------------------------------------------------------

/// Resolves the acting user from the `Authorization` header.
///
/// With a server key configured, a valid bearer API key is required. In dev
/// mode without a key, unauthenticated requests act as the fixed dev user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<impl IntoResponse, ServerError> {
    let token = bearer_token(&req);

    let user_id = match (state.get_config().get_key(), token) {
        (Some(server_key), Some(token)) => config::verify_api_key(server_key, token)?,
        (Some(_), None) => {
            return Err(ServerError::AuthError(
                "missing Authorization bearer token".to_string(),
            ));
        }
        (None, _) => DEFAULT_DEV_USER_ID.to_string(),
    };

    req.extensions_mut().insert(AuthenticatedUser(user_id));

    Ok(next.run(req).await)
}

/// Log incoming requests
pub async fn logging_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::info!("Request: {} {}", method, uri);

    let response = next.run(req).await;

    tracing::info!("Response: {} {}: {}", method, uri, response.status());

    Ok(response)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
