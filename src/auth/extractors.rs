use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{jwt::JwtKeys, repo_types::Role},
    error::AuthError,
    state::AppState,
};

/// Sanitized request identity attached after authentication. No secret
/// fields; safe to echo back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Extractor for routes that require a valid bearer access token.
pub struct AuthUser(pub Identity);

/// Optional-auth variant: any failure along the way means "proceed
/// anonymously" rather than a rejection. No route uses it yet.
#[allow(dead_code)]
pub struct MaybeAuthUser(pub Option<Identity>);

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Identity, AuthError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthorized)?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify_access(token)?;

    // A token can outlive its user; re-check the record on every request.
    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "token for unknown user");
            AuthError::Unauthorized
        })?;

    if !user.is_active {
        warn!(user_id = %user.id, "token for deactivated user");
        return Err(AuthError::Forbidden);
    }

    Ok(Identity {
        user_id: user.id,
        email: user.email,
        role: user.role,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(authenticate(parts, state).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{repo::CredentialStore, repo_types::NewUser, services};

    fn request_parts(auth_header: Option<String>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = auth_header {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    async fn registered_state() -> (AppState, String, Uuid) {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let session = services::register(
            state.store.as_ref(),
            &keys,
            "Alice",
            "a@x.com",
            "Secret@123",
        )
        .await
        .unwrap();
        (state, session.access_token, session.user.id)
    }

    #[tokio::test]
    async fn attaches_identity_for_valid_token() {
        let (state, token, user_id) = registered_state().await;
        let mut parts = request_parts(Some(format!("Bearer {token}")));
        let AuthUser(identity) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authenticated");
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.role, Role::User);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let (state, token, _) = registered_state().await;

        let mut parts = request_parts(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Unauthorized));

        // Right token, wrong scheme.
        let mut parts = request_parts(Some(format!("Token {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let (state, _, _) = registered_state().await;
        let mut parts = request_parts(Some("Bearer garbage.token.here".into()));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let session = services::register(
            state.store.as_ref(),
            &keys,
            "Alice",
            "a@x.com",
            "Secret@123",
        )
        .await
        .unwrap();

        let mut parts = request_parts(Some(format!("Bearer {}", session.refresh_token)));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn deactivated_user_is_forbidden() {
        let (state, token, user_id) = registered_state().await;
        state.store.deactivate(user_id).await.unwrap();

        let mut parts = request_parts(Some(format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn token_for_deleted_user_is_unauthorized() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        // Sign for a user the store has never seen.
        let ghost = crate::auth::repo_types::User {
            id: Uuid::new_v4(),
            email: "ghost@x.com".into(),
            name: "Ghost".into(),
            password_hash: String::new(),
            role: Role::User,
            is_active: true,
            last_login_at: None,
            refresh_token: None,
            created_at: time::OffsetDateTime::now_utc(),
            updated_at: time::OffsetDateTime::now_utc(),
        };
        let token = keys.sign_access(&ghost).unwrap();

        let mut parts = request_parts(Some(format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn optional_auth_proceeds_anonymously_on_failure() {
        let (state, token, user_id) = registered_state().await;

        let mut parts = request_parts(None);
        let MaybeAuthUser(identity) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(identity.is_none());

        let mut parts = request_parts(Some("Bearer nonsense".into()));
        let MaybeAuthUser(identity) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(identity.is_none());

        let mut parts = request_parts(Some(format!("Bearer {token}")));
        let MaybeAuthUser(identity) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(identity.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn identity_serializes_without_secrets() {
        let store = crate::auth::repo::memory::MemoryStore::new();
        let user = store
            .create(NewUser {
                email: "a@x.com",
                name: "A",
                password_hash: "hash",
            })
            .await
            .unwrap();
        let identity = Identity {
            user_id: user.id,
            email: user.email,
            role: user.role,
        };
        let json = serde_json::to_string(&identity).unwrap();
        assert!(json.contains("a@x.com"));
        assert!(!json.contains("hash"));
    }
}
