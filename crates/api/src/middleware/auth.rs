//! Bearer-token middleware.
//!
//! The identity provider is external; its signed claims (`sub`, `role`) are
//! consumed as ground truth. This layer only verifies the signature and
//! expiry — no credential handling happens here.

use crate::handlers::sessions::ErrorResponse;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use devtrust_models::Role;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Ok(decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims)
    }
}

/// Authenticated principal attached to the request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

type AuthRejection = (StatusCode, Json<ErrorResponse>);

fn unauthorized(error: &str, message: &str) -> AuthRejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(error, message)),
    )
}

/// Extract the bearer token from the Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthRejection> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| unauthorized("missing_auth_header", "Authorization header is required"))?
        .to_str()
        .map_err(|_| unauthorized("invalid_auth_header", "Invalid Authorization header format"))?;

    if !auth_header.starts_with("Bearer ") {
        return Err(unauthorized(
            "invalid_auth_scheme",
            "Authorization header must use Bearer scheme",
        ));
    }

    Ok(auth_header[7..].to_string())
}

fn authenticate(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> Result<AuthUser, AuthRejection> {
    let token = extract_bearer_token(headers)?;

    let claims = verifier.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "token validation failed");
        unauthorized("invalid_token", "Token is invalid or expired")
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| unauthorized("invalid_token", "Invalid user id in token"))?;

    let role: Role = claims
        .role
        .parse()
        .map_err(|_| unauthorized("invalid_token", "Unknown role in token"))?;

    Ok(AuthUser { user_id, role })
}

/// Middleware requiring a valid bearer token.
pub async fn require_auth(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let user = authenticate(&state.verifier, &headers)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Middleware requiring an admin-grade role.
pub async fn require_admin(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let user = authenticate(&state.verifier, &headers)?;

    if !user.role.is_admin() {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(
                "insufficient_permissions",
                "This action requires an admin role",
            )),
        ));
    }

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        role: String,
        exp: i64,
    }

    fn token(secret: &str, sub: &str, role: &str, exp_offset: i64) -> String {
        let claims = TestClaims {
            sub: sub.to_string(),
            role: role.to_string(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let verifier = TokenVerifier::new("secret");
        let user_id = Uuid::new_v4();
        let token = token("secret", &user_id.to_string(), "admin", 3600);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = TokenVerifier::new("secret");
        let token = token("secret", &Uuid::new_v4().to_string(), "user", -3600);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = TokenVerifier::new("secret");
        let token = token("other-secret", &Uuid::new_v4().to_string(), "user", 3600);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn bearer_extraction_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc");
    }
}
