use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    error::AuthError,
};

/// Narrow capability interface over the credential records. The session
/// service and request guards only see this trait; the concrete store is
/// constructed once at startup and injected.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Insert a new user. A normalized-email collision surfaces as
    /// `DuplicateEmail`.
    async fn create(&self, new_user: NewUser<'_>) -> Result<User, AuthError>;

    /// Overwrite the stored refresh token. `None` clears it (logout);
    /// `Some` rotates it (login/register). Last writer wins.
    async fn update_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Stamp last_login_at and return the updated record.
    async fn update_last_login(&self, user_id: Uuid) -> Result<User, AuthError>;

    /// Set is_active = false. Returns false if no such user. There is no
    /// reactivation path in this subsystem.
    async fn deactivate(&self, user_id: Uuid) -> Result<bool, AuthError>;
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, is_active, \
     last_login_at, refresh_token, created_at, updated_at";

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser<'_>) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new_user.email)
        .bind(new_user.name)
        .bind(new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Racing registrations hit the unique index even after the
            // service-level pre-check.
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AuthError::DuplicateEmail;
                }
            }
            AuthError::Database(e)
        })?;
        Ok(user)
    }

    async fn update_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        // Unconditional write; affects zero rows for an unknown user, which
        // keeps logout idempotent.
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(refresh_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET last_login_at = now(), updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn deactivate(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
