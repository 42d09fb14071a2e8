use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn sign(claims: &Claims, secret: &str) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Token signing failed");
        AppError::Persistence("token signing failed".into())
    })
}

fn claims(
    user_id: Uuid,
    username: String,
    role: Role,
    ttl: usize,
    token_type: TokenType,
) -> Claims {
    Claims {
        user_id,
        sub: username,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    }
}

pub fn generate_access_token(
    user_id: Uuid,
    username: String,
    role: Role,
    secret: &str,
    ttl: usize,
) -> AppResult<String> {
    sign(&claims(user_id, username, role, ttl, TokenType::Access), secret)
}

/// Returns the claims too, so the caller can persist the `jti`.
pub fn generate_refresh_token(
    user_id: Uuid,
    username: String,
    role: Role,
    secret: &str,
    ttl: usize,
) -> AppResult<(String, Claims)> {
    let claims = claims(user_id, username, role, ttl, TokenType::Refresh);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
