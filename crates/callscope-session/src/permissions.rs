//! Admin and super-admin checks

use crate::session::SessionView;
use callscope_core::Result;
use callscope_gateway::{DataGateway, MembershipQueries, UserRoleQueries};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the current user may do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    /// Holds the global admin role
    pub is_super_admin: bool,
    /// Administers the current organization (always true for super-admins)
    pub is_org_admin: bool,
}

/// Resolves admin rights against the backend
///
/// Nothing is cached between calls; re-run the checks whenever the user or
/// organization changes. Lookup failures deny access instead of erroring.
#[derive(Debug)]
pub struct PermissionResolver {
    gateway: Arc<dyn DataGateway>,
    session: SessionView,
    has_admin_access: bool,
}

impl PermissionResolver {
    /// Create a resolver reading the session through `session`
    #[must_use]
    pub fn new(gateway: Arc<dyn DataGateway>, session: SessionView) -> Self {
        Self {
            gateway,
            session,
            has_admin_access: false,
        }
    }

    /// Result of the most recent check, for gating admin-only surfaces
    #[must_use]
    pub const fn has_admin_access(&self) -> bool {
        self.has_admin_access
    }

    /// Whether `user_id` administers `organization_id`
    ///
    /// A global admin record grants access without looking at memberships.
    pub async fn check_user_access(&mut self, user_id: &str, organization_id: &str) -> bool {
        let granted = match self.is_super_admin(user_id).await {
            Ok(true) => {
                debug!(user_id, "global admin, access granted");
                true
            }
            Ok(false) => self
                .membership_admin(user_id, organization_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(user_id, organization_id, error = %e, "membership lookup failed");
                    false
                }),
            Err(e) => {
                warn!(user_id, error = %e, "global role lookup failed");
                false
            }
        };

        self.has_admin_access = granted;
        granted
    }

    /// Permissions of the signed-in user in the current organization
    pub async fn check_current_user_permissions(&mut self) -> Permissions {
        let session = self.session.current();
        let Some(user_id) = session.user_id else {
            self.has_admin_access = false;
            return Permissions::default();
        };

        let is_super_admin = self.is_super_admin(&user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "global role lookup failed");
            false
        });

        let org_admin = match session.organization_id.as_deref() {
            Some(organization_id) => self
                .membership_admin(&user_id, organization_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(user_id, organization_id, error = %e, "membership lookup failed");
                    false
                }),
            None => false,
        };

        let permissions = Permissions {
            is_super_admin,
            is_org_admin: org_admin || is_super_admin,
        };
        self.has_admin_access = permissions.is_org_admin;
        debug!(user_id, ?permissions, "resolved permissions");
        permissions
    }

    async fn is_super_admin(&self, user_id: &str) -> Result<bool> {
        Ok(UserRoleQueries::find_admin(self.gateway.as_ref(), user_id)
            .await?
            .is_some())
    }

    async fn membership_admin(&self, user_id: &str, organization_id: &str) -> Result<bool> {
        Ok(
            MembershipQueries::find(self.gateway.as_ref(), user_id, organization_id)
                .await?
                .is_some_and(|m| m.is_admin),
        )
    }
}
