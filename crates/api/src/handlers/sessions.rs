use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use devtrust_models::{DeviceSignals, Session, TokenPolicy};
use devtrust_session::{Actor, SessionError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map session-layer errors to HTTP. A failed revoke must show the human a
/// reason: not found vs. unauthorized vs. try again.
fn map_error(err: SessionError) -> ApiError {
    let (status, code) = match &err {
        SessionError::InvalidSignals(_) => (StatusCode::BAD_REQUEST, "invalid_signals"),
        SessionError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SessionError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
        SessionError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "session operation failed");
    }

    (status, Json(ErrorResponse::new(code, &err.to_string())))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(nested)]
    pub signals: DeviceSignals,

    /// Whether the identity provider reports MFA as satisfied for this
    /// session.
    #[serde(default)]
    pub mfa_satisfied: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub session: Session,
    pub is_new_device: bool,
    pub policy: TokenPolicy,
}

/// Client IP from the proxy header; absent when the service is reached
/// directly.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Register (or re-register) the calling device.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    request.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("invalid_signals", &e.to_string())),
        )
    })?;

    let outcome = state
        .manager
        .register(
            auth.user_id,
            auth.role,
            &request.signals,
            client_ip(&headers).as_deref(),
            request.mfa_satisfied,
        )
        .await
        .map_err(map_error)?;

    Ok(Json(RegisterResponse {
        session: outcome.session,
        is_new_device: outcome.is_new_device,
        policy: outcome.policy,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub device_stable_id: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Record activity. Always 200: store failures are retried silently on the
/// client's next interval and must stay invisible to the user.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<HeartbeatRequest>,
) -> Json<OkResponse> {
    state
        .manager
        .heartbeat(auth.user_id, &request.device_stable_id)
        .await;

    Json(OkResponse { ok: true })
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// Owner of the targeted session. Defaults to the actor; only admin
    /// roles may target other users.
    pub user_id: Option<Uuid>,
    pub device_stable_id: String,
}

/// Revoke the session on one device of a user.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<RevokeRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let target_user = request.user_id.unwrap_or(auth.user_id);
    let actor = Actor {
        user_id: auth.user_id,
        role: auth.role,
    };

    state
        .manager
        .revoke(target_user, &request.device_stable_id, actor)
        .await
        .map_err(map_error)?;

    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct TrustRequest {
    pub device_stable_id: String,
}

/// Elevate one of the caller's devices to trusted.
pub async fn trust(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<TrustRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .manager
        .trust_device(auth.user_id, &request.device_stable_id)
        .await
        .map_err(map_error)?;

    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Admin-only: list sessions of another user.
    pub user_id: Option<Uuid>,
}

/// Active sessions, most recently active first.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let target_user = match query.user_id {
        Some(other) if other != auth.user_id => {
            if !auth.role.is_admin() {
                return Err((
                    StatusCode::FORBIDDEN,
                    Json(ErrorResponse::new(
                        "unauthorized",
                        "Listing another user's sessions requires an admin role",
                    )),
                ));
            }
            other
        }
        _ => auth.user_id,
    };

    let sessions = state
        .manager
        .list_sessions(target_user)
        .await
        .map_err(map_error)?;

    Ok(Json(sessions))
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub fixed: u64,
}

/// Admin maintenance: repair malformed device/location fields. Best-effort;
/// never fails.
pub async fn normalize(State(state): State<Arc<AppState>>) -> Json<NormalizeResponse> {
    let fixed = state.manager.normalize().await;
    Json(NormalizeResponse { fixed })
}
