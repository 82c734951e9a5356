//! Cookie-based sessions.
//!
//! A single operator account is configured through `USER_LOGIN` and
//! `USER_PASSWORD_HASH` (hex SHA-256 of the password). A successful login
//! issues an HS256 JWT stored in the `token` cookie.
//!
//! Tokens are signed and checked with `jsonwebtoken`; expiry is enforced
//! with no leeway.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::AuthSettings;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "token";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid login or password")]
    BadCredentials,
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("not logged in")]
    Missing,
    #[error("could not sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            _ => AuthError::Malformed,
        }
    }
}

/// Hex SHA-256 of `password`, the format expected in `USER_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct Authenticator {
    settings: AuthSettings,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(settings: AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            settings,
        }
    }

    pub fn session_seconds(&self) -> i64 {
        i64::from(self.settings.session_hours) * 3600
    }

    /// Checks credentials and returns a fresh token.
    pub fn login(&self, login: &str, password: &str) -> Result<String, AuthError> {
        let login_ok = login.as_bytes().ct_eq(self.settings.login.as_bytes());
        let pass_ok = hash_password(password)
            .as_bytes()
            .ct_eq(self.settings.password_hash.as_bytes());
        if !bool::from(login_ok & pass_ok) {
            return Err(AuthError::BadCredentials);
        }
        self.issue(login, Utc::now().timestamp())
    }

    /// Signs a token for `sub` issued at `now` (unix seconds).
    pub fn issue(&self, sub: &str, now: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: sub.to_string(),
            iat: now,
            exp: now + self.session_seconds(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verifies signature and expiry against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            COOKIE_NAME,
            token,
            self.session_seconds()
        )
    }
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        COOKIE_NAME
    )
}

/// Extracts the session token from a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == COOKIE_NAME && !value.is_empty()).then_some(value)
    })
}
