use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client surface a token was issued for. Each has its own signing secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Device = 1,
    Client = 2,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Device, Platform::Client];

    /// Path prefix, e.g. `device` in `/device/api/v1/...`
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Device => "device",
            Platform::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "device" | "1" => Some(Platform::Device),
            "client" | "2" => Some(Platform::Client),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod user_types {
    pub const USER: i64 = 1;
}

/// Login access table: platforms each user type may call
pub fn allowed_platforms(user_type: i64) -> &'static [Platform] {
    match user_type {
        user_types::USER => &Platform::ALL,
        _ => &[],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    #[serde(rename = "userType")]
    pub user_type: i64,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(id: i64, username: impl Into<String>, user_type: i64, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            id,
            username: username.into(),
            user_type,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_and_secret_isolation() {
        let claims = Claims::new(7, "alice", user_types::USER, 1);
        let token = generate_jwt(&claims, "device-secret").unwrap();

        let decoded = decode_jwt(&token, "device-secret").unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.username, "alice");
        assert_eq!(decoded.user_type, user_types::USER);

        assert!(matches!(decode_jwt(&token, "client-secret"), Err(JwtError::InvalidToken(_))));
        assert!(matches!(generate_jwt(&claims, ""), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut claims = Claims::new(7, "alice", user_types::USER, 1);
        claims.exp = Utc::now().timestamp() - 3600;
        let token = generate_jwt(&claims, "s").unwrap();
        assert!(decode_jwt(&token, "s").is_err());
    }

    #[test]
    fn claims_use_camel_case_user_type() {
        let claims = Claims::new(1, "bob", 1, 1);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["userType"], 1);
    }

    #[test]
    fn login_access() {
        assert_eq!(allowed_platforms(user_types::USER), &[Platform::Device, Platform::Client]);
        assert!(allowed_platforms(99).is_empty());
        assert_eq!(Platform::parse("Client"), Some(Platform::Client));
        assert_eq!(Platform::parse("web"), None);
    }
}
