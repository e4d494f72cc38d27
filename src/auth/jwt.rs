use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i32,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
}

pub fn mint(secret: &str, sub: i32, kind: TokenKind, ttl_secs: i64) -> Result<String, TokenError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub,
        kind,
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| TokenError::Invalid)
}

pub fn mint_pair(config: &Config, sub: i32) -> Result<TokenPair, TokenError> {
    Ok(TokenPair {
        access: mint(&config.jwt_secret, sub, TokenKind::Access, config.access_token_ttl_secs)?,
        refresh: mint(&config.jwt_secret, sub, TokenKind::Refresh, config.refresh_token_ttl_secs)?,
    })
}

/// Decode and validate a token, requiring the expected kind. An access token
/// presented where a refresh token is expected (or vice versa) is invalid.
pub fn verify(secret: &str, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if data.claims.kind != expected {
        return Err(TokenError::Invalid);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trips() {
        let token = mint(SECRET, 42, TokenKind::Access, 300).unwrap();
        let claims = verify(SECRET, &token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let token = mint(SECRET, 7, TokenKind::Access, -60).unwrap();
        assert_eq!(
            verify(SECRET, &token, TokenKind::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn refresh_token_does_not_pass_as_access() {
        let token = mint(SECRET, 7, TokenKind::Refresh, 300).unwrap();
        assert_eq!(
            verify(SECRET, &token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn tampered_token_is_invalid() {
        let token = mint(SECRET, 7, TokenKind::Access, 300).unwrap();
        assert_eq!(
            verify("other-secret", &token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }
}
