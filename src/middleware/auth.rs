use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::auth::{allowed_platforms, decode_jwt, Claims, Platform};
use crate::error::ApiError;

/// Authenticated caller extracted from the JWT
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub user_type: i64,
    pub platform: Platform,
}

impl AuthUser {
    pub fn from_claims(claims: Claims, platform: Platform) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            user_type: claims.user_type,
            platform,
        }
    }
}

/// Per-platform authentication settings handed to the middleware
#[derive(Clone, Debug)]
pub struct PlatformAuth {
    pub platform: Platform,
    pub secret: String,
}

/// Validates the bearer token against the platform's secret and login
/// access table, then attaches an [`AuthUser`] to the request
pub async fn authenticate(
    State(auth): State<PlatformAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(ApiError::unauthorized)?;

    let claims = decode_jwt(&token, &auth.secret).map_err(|e| {
        tracing::debug!("Rejected {} token: {}", auth.platform, e);
        ApiError::unauthorized(e.to_string())
    })?;

    if !allowed_platforms(claims.user_type).contains(&auth.platform) {
        return Err(ApiError::unauthorized(format!(
            "User type {} is not allowed on the {} platform",
            claims.user_type, auth.platform
        )));
    }

    request
        .extensions_mut()
        .insert(AuthUser::from_claims(claims, auth.platform));

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
