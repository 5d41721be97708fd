use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey, Algorithm};
use serde::{Deserialize, Serialize};
use chrono::{Utc, Duration};
use std::env;

// Token lifetimes: short-lived access token, long-lived refresh token.
const ACCESS_TOKEN_MINUTES: i64 = 15;
const REFRESH_TOKEN_DAYS: i64 = 50;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,           // user_id
    pub email: String,
    pub username: String,
    pub token_type: String, // "access" or "refresh"
    pub exp: i64,           // expiration timestamp
}

/// JWT secret from the environment.
fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not found in .env, using default (INSECURE)");
        "default-insecure-key-change-this".to_string()
    })
}

fn generate_token(
    user_id: i32,
    email: &str,
    username: &str,
    token_type: &str,
    lifetime: Duration,
) -> Result<String, String> {
    let expiration = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or("Failed to calculate expiration")?
        .timestamp();

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        username: username.to_string(),
        token_type: token_type.to_string(),
        exp: expiration,
    };

    let secret = get_jwt_secret();

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
        .map_err(|e| format!("Failed to generate token: {}", e))
}

/// Access token for API requests (15 min).
pub fn generate_access_token(user_id: i32, email: &str, username: &str) -> Result<String, String> {
    generate_token(user_id, email, username, "access", Duration::minutes(ACCESS_TOKEN_MINUTES))
}

/// Refresh token, stored on the user row and exchanged for new access tokens (50 days).
pub fn generate_refresh_token(user_id: i32, email: &str, username: &str) -> Result<String, String> {
    generate_token(user_id, email, username, "refresh", Duration::days(REFRESH_TOKEN_DAYS))
}

/// Verify and decode a JWT token.
pub fn verify_token(token: &str) -> Result<Claims, String> {
    let secret = get_jwt_secret();

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_access_token() {
        let token = generate_access_token(123, "student@example.com", "student").unwrap();
        let claims = verify_token(&token).unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.email, "student@example.com");
        assert_eq!(claims.username, "student");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_refresh_token_type() {
        let token = generate_refresh_token(7, "a@b.com", "a").unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.token_type, "refresh");
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token("invalid.token.here");
        assert!(result.is_err());
    }
}
