use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub channel: &'static str,
}

/// Probe Postgres and Redis; degraded dependencies turn the whole check
/// unhealthy so the load balancer stops routing here.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "database health probe failed");
            "down"
        }
    };

    let channel = match state.redis.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "redis health probe failed");
            "down"
        }
    };

    let healthy = database == "up" && channel == "up";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            database,
            channel,
        }),
    )
}
