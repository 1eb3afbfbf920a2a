//! Router configuration for the pixelforge server.
//!
//! This module handles:
//! - API route definitions
//! - Router configuration and setup
//!
//! The JSON-RPC surface sits behind the auth middleware; hosted invocation
//! routes are public, since a deployed project's endpoint is meant to be
//! called by end users.

use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{handler, middleware as app_middleware, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Create a new router with the given state
pub fn create_router(state: AppState) -> Router {
    // Create REST API routes
    let rest_api = Router::new().route("/health", get(handler::health));

    // Create JSON-RPC routes, authenticated
    let rpc_api = Router::new()
        .route("/rpc", post(handler::json_rpc_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ));

    // Create hosted invocation routes - public endpoints for deployed projects
    let hosted_routes = Router::new()
        .route("/hosted/{project_id}", any(handler::hosted_root))
        .route("/hosted/{project_id}/{*path}", any(handler::hosted_path));

    // Combine all routes with logging middleware
    Router::new()
        .nest("/api/v1", rest_api.merge(rpc_api))
        .merge(hosted_routes)
        .layer(middleware::from_fn(app_middleware::logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
