use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AckResponse, AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest},
        extractors::{AuthUser, Identity},
        jwt::JwtKeys,
        services,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !services::is_valid_email(&services::normalize_email(email)) {
        return Err(AuthError::Validation("invalid email".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    validate_email(&payload.email)?;
    if payload.password.len() < 8 {
        return Err(AuthError::Validation("password too short".into()));
    }
    if payload.name.trim().is_empty() {
        return Err(AuthError::Validation("name must not be empty".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let session = services::register(
        state.store.as_ref(),
        &keys,
        payload.name.trim(),
        &payload.email,
        &payload.password,
    )
    .await?;
    Ok(Json(session))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    validate_email(&payload.email)?;

    let keys = JwtKeys::from_ref(&state);
    let session =
        services::login(state.store.as_ref(), &keys, &payload.email, &payload.password).await?;
    Ok(Json(session))
}

#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let response = services::refresh(state.store.as_ref(), &keys, &payload.refresh_token).await?;
    Ok(Json(response))
}

#[instrument(skip(state, identity))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<AckResponse>, AuthError> {
    services::logout(state.store.as_ref(), identity.user_id).await?;
    Ok(Json(AckResponse { success: true }))
}

#[instrument(skip(identity))]
async fn get_me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
