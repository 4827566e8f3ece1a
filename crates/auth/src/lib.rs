use argon2::Argon2;
use argon2::PasswordHasher;
use argon2::password_hash::SaltString;
use base64::Engine;
use chrono::Utc;
use common::Role;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret.as_bytes()),
            dec: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String, // ties refresh tokens to their stored record
}

/// Access/refresh pair handed to a client at login.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
    #[serde(skip)]
    pub refresh_claims: Claims,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("wrong token type: expected {expected:?}")]
    WrongTokenType { expected: TokenKind },
    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub fn new_jti() -> String {
    let mut bytes = [0u8; 16];
    thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn sign(
    keys: &JwtKeys,
    user_id: Uuid,
    role: Role,
    kind: TokenKind,
    ttl_secs: i64,
) -> Result<(String, Claims), AuthError> {
    let iat = now_ts();
    let claims = Claims {
        sub: user_id,
        role,
        token_type: kind,
        iat,
        exp: iat + ttl_secs,
        jti: new_jti(),
    };
    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.enc)
        .map_err(|_| AuthError::InvalidToken)?;
    Ok((token, claims))
}

pub fn sign_access(
    keys: &JwtKeys,
    user_id: Uuid,
    role: Role,
    ttl_secs: i64,
) -> Result<String, AuthError> {
    sign(keys, user_id, role, TokenKind::Access, ttl_secs).map(|(token, _)| token)
}

pub fn sign_refresh(
    keys: &JwtKeys,
    user_id: Uuid,
    role: Role,
    ttl_secs: i64,
) -> Result<(String, Claims), AuthError> {
    sign(keys, user_id, role, TokenKind::Refresh, ttl_secs)
}

pub fn issue_session(
    keys: &JwtKeys,
    user_id: Uuid,
    role: Role,
    access_ttl: i64,
    refresh_ttl: i64,
) -> Result<SessionTokens, AuthError> {
    let access = sign_access(keys, user_id, role, access_ttl)?;
    let (refresh, refresh_claims) = sign_refresh(keys, user_id, role, refresh_ttl)?;
    Ok(SessionTokens {
        access,
        refresh,
        refresh_claims,
    })
}

pub fn verify(keys: &JwtKeys, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let claims = jsonwebtoken::decode::<Claims>(token, &keys.dec, &validation)
        .map(|d| d.claims)
        .map_err(|_| AuthError::InvalidToken)?;
    if claims.token_type != expected {
        return Err(AuthError::WrongTokenType { expected });
    }
    Ok(claims)
}

pub fn hash_password(raw: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut thread_rng());
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(raw: &str, hash: &str) -> bool {
    use argon2::{PasswordHash, PasswordVerifier};
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok()
    } else {
        false
    }
}

/// Stored form of a refresh token; the raw token is never persisted.
pub fn fingerprint(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(token.as_bytes());
    format!("sha256:{}", hex::encode(h.finalize()))
}
