use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        dto::AckResponse,
        extractors::AuthUser,
        guards,
        repo_types::{PublicUser, Role},
    },
    error::AuthError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_user))
        .route("/users/:id/deactivate", post(deactivate_user))
}

/// Sanitized profile of a single user. Visible to that user and to admins.
#[instrument(skip(state, identity))]
async fn get_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicUser>, AuthError> {
    let store = state.store.clone();
    guards::require_owner_or_admin(Some(&identity), || async move {
        // A profile is owned by the user it describes.
        match store.find_by_id(user_id).await? {
            Some(user) => Ok(user.id),
            None => Err(AuthError::NotFound),
        }
    })
    .await?;

    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::NotFound)?;
    Ok(Json(user.into_public()))
}

/// Admin-only kill switch. Deactivation is one-way in this API: the user
/// can no longer log in, refresh or pass the request guard.
#[instrument(skip(state, identity))]
async fn deactivate_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AckResponse>, AuthError> {
    guards::require_role(Some(&identity), &[Role::Admin])?;

    if !state.store.deactivate(user_id).await? {
        return Err(AuthError::NotFound);
    }
    info!(admin_id = %identity.user_id, user_id = %user_id, "user deactivated");
    Ok(Json(AckResponse { success: true }))
}
