use std::future::Future;

use uuid::Uuid;

use crate::{
    auth::{extractors::Identity, repo_types::Role},
    error::AuthError,
};

/// Role guard, composable with any handler: no identity answers
/// Unauthorized, a role outside the allowed set answers Forbidden.
pub fn require_role(identity: Option<&Identity>, allowed: &[Role]) -> Result<(), AuthError> {
    let identity = identity.ok_or(AuthError::Unauthorized)?;
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Ownership guard: admins pass without the owner lookup; everyone else
/// must match the owning user id resolved by the caller-supplied lookup.
/// Resolver failures (a missing resource, a store error) propagate
/// unchanged.
pub async fn require_owner_or_admin<F, Fut>(
    identity: Option<&Identity>,
    resolve_owner: F,
) -> Result<(), AuthError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Uuid, AuthError>>,
{
    let identity = identity.ok_or(AuthError::Unauthorized)?;
    if identity.role == Role::Admin {
        return Ok(());
    }
    let owner_id = resolve_owner().await?;
    if owner_id == identity.user_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "a@x.com".into(),
            role,
        }
    }

    #[test]
    fn require_role_without_identity_is_unauthorized() {
        let err = require_role(None, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[test]
    fn require_role_checks_membership() {
        let admin = identity(Role::Admin);
        let user = identity(Role::User);

        assert!(require_role(Some(&admin), &[Role::Admin]).is_ok());
        assert!(require_role(Some(&user), &[Role::Admin, Role::User]).is_ok());
        assert!(matches!(
            require_role(Some(&user), &[Role::Admin]),
            Err(AuthError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn owner_guard_allows_the_owner() {
        let user = identity(Role::User);
        let owner_id = user.user_id;
        require_owner_or_admin(Some(&user), || async move { Ok(owner_id) })
            .await
            .expect("owner passes");
    }

    #[tokio::test]
    async fn owner_guard_rejects_non_owner() {
        let user = identity(Role::User);
        let err = require_owner_or_admin(Some(&user), || async { Ok(Uuid::new_v4()) })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn admin_bypasses_without_resolving() {
        let admin = identity(Role::Admin);
        // Resolver would fail; it must never run for an admin.
        require_owner_or_admin(Some(&admin), || async {
            panic!("resolver invoked for admin")
        })
        .await
        .expect("admin bypasses");
    }

    #[tokio::test]
    async fn resolver_errors_propagate_unchanged() {
        let user = identity(Role::User);
        let err = require_owner_or_admin(Some(&user), || async { Err(AuthError::NotFound) })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn owner_guard_without_identity_is_unauthorized() {
        let err = require_owner_or_admin(None, || async { Ok(Uuid::new_v4()) })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
