//! Authorization gate for privileged routes.
//!
//! Each check runs the same machine: resolve the session with the identity
//! provider, resolve the caller's record through the accessor, then compare
//! the stored role with the required threshold. Only [`Gate::require_admin`]
//! and [`Gate::require_super_admin`] are authorization boundaries; the `is_*`
//! helpers are for conditional UI and swallow failures.

use std::sync::Arc;

use axum::http::HeaderMap;
use warden_common::{AdminUserUpdate, Role, UserRecord};

use super::{IdentityProvider, Session};
use crate::store::StoreError;
use crate::users::{UserAccessor, UserError};

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    /// No valid session
    #[error("Authentication required")]
    NotAuthenticated,
    /// Session is valid but the sign-up trigger has not created the record yet
    #[error("User record not ready")]
    RecordNotReady,
    /// Stored role is below the threshold
    #[error("Insufficient privilege")]
    InsufficientPrivilege,
}

/// Proof that the caller passed the gate. Only the gate constructs one.
#[derive(Debug, Clone)]
pub struct Grant {
    user: UserRecord,
    threshold: Role,
}

impl Grant {
    /// The authorized caller's record.
    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    /// Threshold this grant was issued for.
    pub fn threshold(&self) -> Role {
        self.threshold
    }
}

#[must_use]
#[derive(Debug, Clone)]
pub enum Authorization {
    Granted(Grant),
    Denied(Denial),
}

impl Authorization {
    pub fn is_granted(&self) -> bool {
        matches!(self, Authorization::Granted(_))
    }

    pub fn into_result(self) -> Result<Grant, Denial> {
        match self {
            Authorization::Granted(grant) => Ok(grant),
            Authorization::Denied(denial) => Err(denial),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Denied(#[from] Denial),
    #[error("User not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UserError> for GateError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound(id) => GateError::NotFound(id),
            UserError::Store(e) => GateError::Store(e),
        }
    }
}

#[derive(Clone)]
pub struct Gate {
    identity: Arc<dyn IdentityProvider>,
    users: UserAccessor,
}

impl Gate {
    pub fn new(identity: Arc<dyn IdentityProvider>, users: UserAccessor) -> Self {
        Self { identity, users }
    }

    /// Resolve the current session, treating any provider error as "none".
    pub async fn session(&self, headers: &HeaderMap) -> Option<Session> {
        match self.identity.current_session(headers).await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!("No valid session: {}", e);
                None
            }
        }
    }

    /// Run the gate with an arbitrary minimum role.
    pub async fn authorize(&self, headers: &HeaderMap, required: Role) -> Result<Authorization, StoreError> {
        let Some(session) = self.session(headers).await else {
            return Ok(Authorization::Denied(Denial::NotAuthenticated));
        };

        let Some(user) = self.users.get_by_id(&session.subject_id).await? else {
            tracing::info!("Session {} has no user record yet", session.subject_id);
            return Ok(Authorization::Denied(Denial::RecordNotReady));
        };

        if !user.role.satisfies(required) {
            tracing::warn!(
                user_id = %user.id,
                role = %user.role,
                required = %required,
                "Denied privileged access"
            );
            return Ok(Authorization::Denied(Denial::InsufficientPrivilege));
        }

        Ok(Authorization::Granted(Grant {
            user,
            threshold: required,
        }))
    }

    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<Authorization, StoreError> {
        self.authorize(headers, Role::Admin).await
    }

    pub async fn require_super_admin(&self, headers: &HeaderMap) -> Result<Authorization, StoreError> {
        self.authorize(headers, Role::SuperAdmin).await
    }

    /// Require that the caller is signed in as `id`. The record itself may not
    /// exist yet.
    pub async fn require_self(&self, headers: &HeaderMap, id: &str) -> Result<Session, Denial> {
        let session = self.session(headers).await.ok_or(Denial::NotAuthenticated)?;
        if session.subject_id != id {
            tracing::warn!("Subject {} tried to act on user {}", session.subject_id, id);
            return Err(Denial::InsufficientPrivilege);
        }
        Ok(session)
    }

    pub async fn get_role(&self, id: &str) -> Option<Role> {
        match self.users.get_by_id(id).await {
            Ok(user) => user.map(|u| u.role),
            Err(e) => {
                tracing::error!("Error getting user role for {}: {}", id, e);
                None
            }
        }
    }

    pub async fn is_admin(&self, id: &str) -> bool {
        self.get_role(id).await.is_some_and(|r| r.satisfies(Role::Admin))
    }

    pub async fn is_super_admin(&self, id: &str) -> bool {
        self.get_role(id).await == Some(Role::SuperAdmin)
    }

    pub async fn can_access_admin(&self, id: &str) -> bool {
        self.is_admin(id).await
    }

    fn ensure_super_admin(grant: &Grant) -> Result<(), Denial> {
        if grant.threshold == Role::SuperAdmin && grant.user.role == Role::SuperAdmin {
            Ok(())
        } else {
            Err(Denial::InsufficientPrivilege)
        }
    }

    /// Change role and/or active flag of `id` on behalf of a super admin.
    pub async fn update_user(
        &self,
        grant: &Grant,
        id: &str,
        update: AdminUserUpdate,
    ) -> Result<UserRecord, GateError> {
        Self::ensure_super_admin(grant)?;

        if update.is_empty() {
            return self
                .users
                .get_by_id(id)
                .await?
                .ok_or_else(|| GateError::NotFound(id.to_string()));
        }

        let user = self.users.update_access(id, update.role, update.is_active).await?;
        tracing::info!(
            actor = %grant.user.id,
            target = %id,
            role = ?update.role,
            is_active = ?update.is_active,
            "Super admin updated user"
        );
        Ok(user)
    }

    pub async fn set_role(&self, grant: &Grant, id: &str, role: Role) -> Result<UserRecord, GateError> {
        Self::ensure_super_admin(grant)?;
        let user = self.users.set_role(id, role).await?;
        tracing::info!(actor = %grant.user.id, target = %id, role = %role, "Super admin set role");
        Ok(user)
    }

    /// Soft delete on behalf of a super admin.
    pub async fn deactivate_user(&self, grant: &Grant, id: &str) -> Result<UserRecord, GateError> {
        Self::ensure_super_admin(grant)?;
        let user = self.users.deactivate(id).await?;
        tracing::info!(actor = %grant.user.id, target = %id, "Super admin deactivated user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryUserStore, MockUserStore};
    use crate::test_util::{headers_for, StaticIdentityProvider};
    use chrono::Utc;
    use rstest::rstest;

    async fn gate_with(users: Vec<UserRecord>) -> Gate {
        let store = MemoryUserStore::new();
        for user in users {
            store.materialize(user).await;
        }
        Gate::new(
            Arc::new(StaticIdentityProvider),
            UserAccessor::new(Arc::new(store)),
        )
    }

    fn user(id: &str, role: Role) -> UserRecord {
        UserRecord::new(id, format!("{id}@example.com"), Utc::now()).with_role(role)
    }

    #[rstest]
    #[case(Role::User, false, false)]
    #[case(Role::Admin, true, false)]
    #[case(Role::SuperAdmin, true, true)]
    #[tokio::test]
    async fn test_thresholds(#[case] role: Role, #[case] admin: bool, #[case] super_admin: bool) {
        let gate = gate_with(vec![user("caller", role)]).await;
        let headers = headers_for("caller");

        assert_eq!(gate.require_admin(&headers).await.unwrap().is_granted(), admin);
        assert_eq!(
            gate.require_super_admin(&headers).await.unwrap().is_granted(),
            super_admin
        );
        assert_eq!(gate.is_admin("caller").await, admin);
        assert_eq!(gate.is_super_admin("caller").await, super_admin);
        assert_eq!(gate.can_access_admin("caller").await, admin);
        assert_eq!(gate.get_role("caller").await, Some(role));
    }

    #[tokio::test]
    async fn test_grant_carries_full_record() {
        let gate = gate_with(vec![user("boss", Role::SuperAdmin)]).await;
        let grant = gate
            .require_admin(&headers_for("boss"))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(grant.user().email, "boss@example.com");
        assert_eq!(grant.threshold(), Role::Admin);
    }

    #[tokio::test]
    async fn test_no_session_is_not_authenticated() {
        let gate = gate_with(vec![user("boss", Role::SuperAdmin)]).await;
        let result = gate.require_admin(&HeaderMap::new()).await.unwrap();
        assert!(matches!(result, Authorization::Denied(Denial::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_missing_record_is_not_ready() {
        let gate = gate_with(vec![]).await;
        let result = gate.require_admin(&headers_for("newcomer")).await.unwrap();
        assert!(matches!(result, Authorization::Denied(Denial::RecordNotReady)));
        assert_eq!(gate.get_role("newcomer").await, None);
        assert!(!gate.is_admin("newcomer").await);
    }

    #[tokio::test]
    async fn test_under_privileged_is_insufficient() {
        let gate = gate_with(vec![user("pleb", Role::User)]).await;
        let err = gate
            .require_admin(&headers_for("pleb"))
            .await
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err, Denial::InsufficientPrivilege);
    }

    #[tokio::test]
    async fn test_store_failure_is_error_not_denial() {
        let mut store = MockUserStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::DatabaseError("locked".to_string())));
        let gate = Gate::new(
            Arc::new(StaticIdentityProvider),
            UserAccessor::new(Arc::new(store)),
        );

        assert!(gate.require_admin(&headers_for("anyone")).await.is_err());
        assert!(!gate.is_admin("anyone").await);
        assert!(!gate.is_super_admin("anyone").await);
        assert!(!gate.can_access_admin("anyone").await);
        assert_eq!(gate.get_role("anyone").await, None);
    }

    #[tokio::test]
    async fn test_admin_grant_cannot_mutate() {
        let gate = gate_with(vec![user("admin", Role::Admin), user("target", Role::User)]).await;
        let grant = gate
            .require_admin(&headers_for("admin"))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let err = gate.set_role(&grant, "target", Role::Admin).await.unwrap_err();
        assert!(matches!(err, GateError::Denied(Denial::InsufficientPrivilege)));
        assert_eq!(gate.get_role("target").await, Some(Role::User));
    }

    #[tokio::test]
    async fn test_super_admin_mutations() {
        let gate = gate_with(vec![user("root", Role::SuperAdmin), user("target", Role::User)]).await;
        let grant = gate
            .require_super_admin(&headers_for("root"))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let promoted = gate.set_role(&grant, "target", Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let updated = gate
            .update_user(
                &grant,
                "target",
                AdminUserUpdate {
                    role: Some(Role::User),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::User);
        assert!(!updated.is_active);

        let again = gate.deactivate_user(&grant, "target").await.unwrap();
        assert!(!again.is_active);

        let missing = gate.deactivate_user(&grant, "ghost").await.unwrap_err();
        assert!(matches!(missing, GateError::NotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_empty_update_returns_current_record() {
        let gate = gate_with(vec![user("root", Role::SuperAdmin), user("target", Role::Admin)]).await;
        let grant = gate
            .require_super_admin(&headers_for("root"))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let unchanged = gate
            .update_user(&grant, "target", AdminUserUpdate::default())
            .await
            .unwrap();
        assert_eq!(unchanged.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_require_self() {
        let gate = gate_with(vec![]).await;
        let headers = headers_for("me");

        assert_eq!(gate.require_self(&headers, "me").await.unwrap().subject_id, "me");
        assert_eq!(
            gate.require_self(&headers, "you").await.unwrap_err(),
            Denial::InsufficientPrivilege
        );
        assert_eq!(
            gate.require_self(&HeaderMap::new(), "me").await.unwrap_err(),
            Denial::NotAuthenticated
        );
    }
}
