use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{
        claims::{AccessClaims, RefreshClaims},
        repo_types::User,
    },
    config::JwtConfig,
    error::AuthError,
    state::AppState,
};

/// Signing and verification material for both token kinds. Access and
/// refresh tokens use distinct secrets, so a token of one kind can never
/// verify as the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::new(&state.config.jwt)
    }
}

fn map_decode_err(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes as u64) * 60),
        }
    }

    fn window(ttl: Duration) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    /// Issue an access token embedding {userId, email, role}.
    pub fn sign_access(&self, user: &User) -> Result<String, AuthError> {
        let (iat, exp) = Self::window(self.access_ttl);
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(AuthError::TokenCreation)?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    /// Issue a refresh token embedding {userId} only.
    pub fn sign_refresh(&self, user: &User) -> Result<String, AuthError> {
        let (iat, exp) = Self::window(self.refresh_ttl);
        let claims = RefreshClaims {
            sub: user.id,
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(AuthError::TokenCreation)?;
        debug!(user_id = %user.id, "refresh token signed");
        Ok(token)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map_err(map_decode_err)?;
        debug!(user_id = %data.claims.sub, "access token verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .map_err(map_decode_err)?;
        debug!(user_id = %data.claims.sub, "refresh token verified");
        Ok(data.claims)
    }
}
