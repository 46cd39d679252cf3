use crate::handlers;
use crate::middleware;
use crate::ws;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Policy lookup (pure; no session state involved)
        .route(
            "/api/policy",
            get(handlers::policy::compute)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        // Session lifecycle
        .route(
            "/api/sessions/register",
            post(handlers::sessions::register)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        .route(
            "/api/sessions/heartbeat",
            post(handlers::sessions::heartbeat)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        .route(
            "/api/sessions/revoke",
            post(handlers::sessions::revoke)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        .route(
            "/api/sessions/trust",
            post(handlers::sessions::trust)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        .route(
            "/api/sessions",
            get(handlers::sessions::list_sessions)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        // Live revocation feed
        .route(
            "/api/sessions/events",
            get(ws::revocation_events)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        // Admin maintenance
        .route(
            "/api/admin/sessions/normalize",
            post(handlers::sessions::normalize)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_admin)),
        )
        .with_state(state)
}
