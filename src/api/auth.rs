//! Bearer token authentication for REST endpoints

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::AppState;

/// User identity extracted from a verified JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub username: Option<String>,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Claims carried by access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    pub role: String,
    pub exp: i64,
}

/// Verify an HS256 token against `secret` and extract the user
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_aud = false;

    let token_data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("JWT verification failed: {}", e);
        ApiError::Unauthorized
    })?;

    Ok(AuthUser {
        user_id: token_data.claims.sub,
        username: token_data.claims.username,
        role: token_data.claims.role,
    })
}

/// Extract bearer token from Authorization header
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Extractor that only admits administrators
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user = verify_token(token, &state.config.jwt_secret)?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, "Non-admin user rejected");
            return Err(ApiError::Forbidden);
        }

        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(role: &str, secret: &str, exp: i64) -> String {
        let claims = AccessTokenClaims {
            sub: "user-1".to_string(),
            username: Some("alice".to_string()),
            role: role.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token() {
        let user = verify_token(&token("admin", "s3cret", in_an_hour()), "s3cret").unwrap();
        assert_eq!(user.user_id, "user-1");
        assert!(user.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let result = verify_token(&token("admin", "s3cret", in_an_hour()), "other");
        assert_matches!(result, Err(ApiError::Unauthorized));
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = chrono::Utc::now().timestamp() - 3600;
        let result = verify_token(&token("admin", "s3cret", expired), "s3cret");
        assert_matches!(result, Err(ApiError::Unauthorized));
    }

    #[test]
    fn test_bearer_prefix_required() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers), Some("abc"));
    }
}
