use crate::handlers::sessions::ErrorResponse;
use axum::{extract::Query, http::StatusCode, Json};
use devtrust_models::{Role, TokenPolicy};
use devtrust_policy::compute_policy;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PolicyQuery {
    pub role: String,
    #[serde(default)]
    pub is_new_device: bool,
    #[serde(default)]
    pub is_device_trusted: bool,
}

/// Compute the token lifetime policy for a role and device state. Pure; the
/// only failure is an unknown role string.
pub async fn compute(
    Query(query): Query<PolicyQuery>,
) -> Result<Json<TokenPolicy>, (StatusCode, Json<ErrorResponse>)> {
    let role: Role = query.role.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "unknown_role",
                &format!("Unknown role: {}", query.role),
            )),
        )
    })?;

    Ok(Json(compute_policy(
        role,
        query.is_new_device,
        query.is_device_trusted,
    )))
}
