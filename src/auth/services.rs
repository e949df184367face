use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, RefreshResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::CredentialStore,
        repo_types::NewUser,
    },
    error::AuthError,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are matched case-insensitively; every lookup and write goes
/// through this normalization.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a credential record and start a session: hash the password,
/// persist the user, issue both tokens, store the refresh token and stamp
/// last_login_at.
pub async fn register(
    store: &dyn CredentialStore,
    keys: &JwtKeys,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(email);

    if store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;
    let user = store
        .create(NewUser {
            email: &email,
            name,
            password_hash: &password_hash,
        })
        .await?;

    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(&user)?;

    // A failure past this point leaves the client holding tokens whose
    // stored refresh copy never landed; the refresh token then fails on
    // first use, which is the fail-safe outcome.
    store
        .update_refresh_token(user.id, Some(&refresh_token))
        .await?;
    let user = store.update_last_login(user.id).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into_public(),
    })
}

/// Authenticate by password and rotate the session: a fresh token pair is
/// issued and the stored refresh token is overwritten, invalidating the
/// one from the previous login.
pub async fn login(
    store: &dyn CredentialStore,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(email);

    let user = match store.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    // Active status is checked before the password. A deactivated account
    // answers AccountDeactivated regardless of the password supplied.
    if !user.is_active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(AuthError::AccountDeactivated);
    }

    if !verify_password(password, &user.password_hash) {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(&user)?;

    store
        .update_refresh_token(user.id, Some(&refresh_token))
        .await?;
    let user = store.update_last_login(user.id).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into_public(),
    })
}

/// Exchange a refresh token for a new access token. The refresh token is
/// not rotated and the presented value is not compared against the stored
/// copy; the stored copy is correlation state only. A missing or
/// deactivated user answers InvalidToken, same as a bad token, so a caller
/// holding a stale token learns nothing about the account.
pub async fn refresh(
    store: &dyn CredentialStore,
    keys: &JwtKeys,
    refresh_token: &str,
) -> Result<RefreshResponse, AuthError> {
    let claims = keys.verify_refresh(refresh_token)?;

    let user = store
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InvalidToken)?;

    let access_token = keys.sign_access(&user)?;
    info!(user_id = %user.id, "access token refreshed");
    Ok(RefreshResponse { access_token })
}

/// Clear the stored refresh token. Idempotent: succeeds whether or not a
/// token was stored, or the user exists at all. Already-issued tokens stay
/// valid until natural expiry since nothing verifies against the stored
/// copy.
pub async fn logout(store: &dyn CredentialStore, user_id: Uuid) -> Result<(), AuthError> {
    store.update_refresh_token(user_id, None).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}
