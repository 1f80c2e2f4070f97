pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, name: impl Into<String>, roles: Vec<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let hours = i64::try_from(expiry_hours).unwrap_or(i64::MAX / 3600);
        Self {
            sub: user_id,
            name: name.into(),
            roles,
            iat: now.timestamp(),
            exp: (now + Duration::hours(hours)).timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(jsonwebtoken::errors::Error),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key).map_err(JwtError::TokenGeneration)
}

/// Decode and verify signature and expiry
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(JwtError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_with_the_same_secret() {
        let claims = Claims::new(7, "Admin", vec!["super-admin".into()], 1);
        let token = generate_jwt(&claims, "secret").unwrap();
        assert_eq!(validate_jwt(&token, "secret").unwrap(), claims);
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        let claims = Claims::new(7, "Admin", vec![], 1);
        let token = generate_jwt(&claims, "secret").unwrap();
        assert!(matches!(validate_jwt(&token, "other"), Err(JwtError::InvalidToken(_))));

        let expired = Claims {
            iat: 0,
            exp: 1,
            ..claims
        };
        let token = generate_jwt(&expired, "secret").unwrap();
        assert!(validate_jwt(&token, "secret").is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::new(1, "x", vec![], 1);
        assert!(matches!(generate_jwt(&claims, ""), Err(JwtError::InvalidSecret)));
    }
}
