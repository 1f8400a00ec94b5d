//! User rosters and the mutations behind the user management screens

use crate::invitations::{DEFAULT_INVITATION_TTL_DAYS, expiry_from, generate_token};
use crate::notify::Notifier;
use callscope_core::utils::require_id;
use callscope_core::{
    Error, Membership, OrganizationId, OrganizationInvitation, OrganizationUser, Result, Role,
};
use callscope_gateway::{
    DataGateway, InvitationQueries, MembershipQueries, NewInvitation, ProfileQueries,
    UserRoleQueries,
};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use validator::ValidateEmail;

/// Every user of the deployment with their global role
#[derive(Debug)]
pub struct GlobalRoster {
    gateway: Arc<dyn DataGateway>,
    users: Option<Vec<OrganizationUser>>,
}

impl GlobalRoster {
    /// Create an empty roster
    #[must_use]
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self {
            gateway,
            users: None,
        }
    }

    /// Load profiles joined with their global roles
    ///
    /// A loaded roster is returned as is unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns the backend error if either table cannot be read.
    #[instrument(skip(self))]
    pub async fn load(&mut self, force: bool) -> Result<&[OrganizationUser]> {
        if force || self.users.is_none() {
            let gateway = self.gateway.as_ref();
            let profiles = ProfileQueries::list_all(gateway).await?;
            let roles: HashMap<String, Role> = UserRoleQueries::list_all(gateway)
                .await?
                .into_iter()
                .map(|record| (record.user_id, record.role))
                .collect();

            let users: Vec<OrganizationUser> = profiles
                .iter()
                .map(|profile| {
                    let role = roles.get(&profile.id).copied().unwrap_or_default();
                    OrganizationUser::from_profile(profile, role)
                })
                .collect();
            info!(count = users.len(), "loaded global roster");
            self.users = Some(users);
        } else {
            debug!("global roster already loaded");
        }
        Ok(self.users())
    }

    /// Users from the last load
    #[must_use]
    pub fn users(&self) -> &[OrganizationUser] {
        self.users.as_deref().unwrap_or_default()
    }

    /// Whether a load has completed
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.users.is_some()
    }
}

/// Members and pending invitees of one organization
#[derive(Debug)]
pub struct OrganizationRoster {
    gateway: Arc<dyn DataGateway>,
    organization_id: OrganizationId,
    users: Option<Vec<OrganizationUser>>,
}

impl OrganizationRoster {
    /// Create an empty roster for `organization_id`
    #[must_use]
    pub fn new(gateway: Arc<dyn DataGateway>, organization_id: impl Into<OrganizationId>) -> Self {
        Self {
            gateway,
            organization_id: organization_id.into(),
            users: None,
        }
    }

    /// Organization this roster describes
    #[must_use]
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// Load members followed by pending invitations
    ///
    /// A loaded roster is returned as is unless `force` is set. Members
    /// without a profile are left out.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank organization id and the backend
    /// error if a table cannot be read.
    #[instrument(skip(self), fields(organization_id = %self.organization_id))]
    pub async fn load(&mut self, force: bool) -> Result<&[OrganizationUser]> {
        if force || self.users.is_none() {
            let users = self.fetch().await?;
            info!(count = users.len(), "loaded organization roster");
            self.users = Some(users);
        } else {
            debug!("organization roster already loaded");
        }
        Ok(self.users())
    }

    /// Users from the last load
    #[must_use]
    pub fn users(&self) -> &[OrganizationUser] {
        self.users.as_deref().unwrap_or_default()
    }

    /// Whether a load has completed
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.users.is_some()
    }

    async fn fetch(&self) -> Result<Vec<OrganizationUser>> {
        let organization_id = require_id("organization_id", &self.organization_id)?;
        let gateway = self.gateway.as_ref();

        let memberships = MembershipQueries::for_organization(gateway, organization_id).await?;
        let ids: Vec<String> = memberships.iter().map(|m| m.user_id.clone()).collect();
        let profiles = ProfileQueries::list_by_ids(gateway, &ids).await?;

        let mut users = Vec::with_capacity(memberships.len());
        for membership in &memberships {
            match profiles.iter().find(|p| p.id == membership.user_id) {
                Some(profile) => users.push(OrganizationUser::from_profile(
                    profile,
                    Role::from_admin_flag(membership.is_admin),
                )),
                None => warn!(user_id = %membership.user_id, "member has no profile"),
            }
        }

        let invitations =
            InvitationQueries::pending_for_organization(gateway, organization_id).await?;
        users.extend(invitations.iter().map(OrganizationUser::from_invitation));
        Ok(users)
    }
}

/// Callback that reloads whichever roster the caller is showing
pub type RefreshUsers = Box<dyn Fn() + Send + Sync>;

/// Roster mutations
///
/// Every successful mutation notifies and then calls the refresh callback;
/// local roster state is never patched in place.
pub struct UserActions {
    gateway: Arc<dyn DataGateway>,
    notifier: Arc<dyn Notifier>,
    refresh_users: RefreshUsers,
    invitation_ttl_days: i64,
}

impl fmt::Debug for UserActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserActions")
            .field("gateway", &self.gateway.name())
            .field("notifier", &self.notifier)
            .field("invitation_ttl_days", &self.invitation_ttl_days)
            .finish_non_exhaustive()
    }
}

impl UserActions {
    /// Create the action set
    #[must_use]
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        notifier: Arc<dyn Notifier>,
        refresh_users: RefreshUsers,
    ) -> Self {
        Self {
            gateway,
            notifier,
            refresh_users,
            invitation_ttl_days: DEFAULT_INVITATION_TTL_DAYS,
        }
    }

    /// Use a different invitation lifetime
    #[must_use]
    pub const fn with_invitation_ttl_days(mut self, days: i64) -> Self {
        self.invitation_ttl_days = days;
        self
    }

    /// Add the user registered under `email` to an organization
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no profile has this email, a validation error
    /// for blank input, and the backend error if the insert fails.
    #[instrument(skip(self))]
    pub async fn add_user(
        &self,
        email: &str,
        organization_id: &str,
        role: Role,
    ) -> Result<Membership> {
        let result = self.insert_member(email, organization_id, role).await;
        self.settle(result, "Error adding user", |_| {
            ("User added", format!("{} was added to the organization", email.trim()))
        })
    }

    /// Remove a user from an organization
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the user is not a member and the backend error
    /// if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_user(&self, user_id: &str, organization_id: &str) -> Result<()> {
        let result = async {
            let user_id = require_id("user_id", user_id)?;
            let organization_id = require_id("organization_id", organization_id)?;
            let removed =
                MembershipQueries::delete(self.gateway.as_ref(), user_id, organization_id).await?;
            if removed == 0 {
                return Err(Error::not_found(format!(
                    "membership of {user_id} in {organization_id}"
                )));
            }
            Ok::<(), Error>(())
        }
        .await;
        self.settle(result, "Error removing user", |_| {
            ("User removed", "The user was removed from the organization".to_string())
        })
    }

    /// Make a member an admin of the organization; false on failure
    pub async fn promote(&self, user_id: &str, organization_id: &str) -> bool {
        self.set_admin(user_id, organization_id, true).await
    }

    /// Make an admin a regular member of the organization; false on failure
    pub async fn demote(&self, user_id: &str, organization_id: &str) -> bool {
        self.set_admin(user_id, organization_id, false).await
    }

    /// Set a user's global role; false on failure
    #[instrument(skip(self))]
    pub async fn set_global_role(&self, user_id: &str, role: Role) -> bool {
        let result = match require_id("user_id", user_id) {
            Ok(user_id) => UserRoleQueries::upsert(self.gateway.as_ref(), user_id, role).await,
            Err(e) => Err(e),
        };
        self.settle(result, "Error updating role", |record| {
            ("Role updated", format!("Global role is now {}", record.role))
        })
        .is_ok()
    }

    /// Email a password reset link; false on failure
    #[instrument(skip(self))]
    pub async fn reset_password(&self, email: &str) -> bool {
        let result = match check_email(email) {
            Ok(email) => self.gateway.send_password_reset(email).await,
            Err(e) => Err(e),
        };
        self.settle(result, "Error sending reset email", |_| {
            ("Reset email sent", format!("A reset link was sent to {}", email.trim()))
        })
        .is_ok()
    }

    /// Invite an email address to an organization
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email, a blank organization
    /// or an address that already has a pending invitation, and the backend
    /// error if the insert fails.
    #[instrument(skip(self))]
    pub async fn invite_user(
        &self,
        email: &str,
        organization_id: &str,
        role: Role,
    ) -> Result<OrganizationInvitation> {
        let result = self.insert_invitation(email, organization_id, role).await;
        self.settle(result, "Error sending invitation", |invitation| {
            ("Invitation sent", format!("{} was invited", invitation.email))
        })
    }

    /// Issue a fresh token and expiry for a pending invitation; false on failure
    #[instrument(skip(self))]
    pub async fn resend_invite(&self, invitation_id: &str) -> bool {
        let result = match require_id("invitation_id", invitation_id) {
            Ok(id) => {
                let token = generate_token();
                let expires_at = expiry_from(Utc::now(), self.invitation_ttl_days);
                InvitationQueries::renew(self.gateway.as_ref(), id, &token, expires_at).await
            }
            Err(e) => Err(e),
        };
        self.settle(result, "Error resending invitation", |invitation| {
            ("Invitation resent", format!("{} was invited again", invitation.email))
        })
        .is_ok()
    }

    /// Delete an invitation; false on failure
    #[instrument(skip(self))]
    pub async fn cancel_invite(&self, invitation_id: &str) -> bool {
        let result = match require_id("invitation_id", invitation_id) {
            Ok(id) => match InvitationQueries::delete(self.gateway.as_ref(), id).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(Error::not_found(format!("invitation {id}"))),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.settle(result, "Error cancelling invitation", |_| {
            ("Invitation cancelled", "The invitation was withdrawn".to_string())
        })
        .is_ok()
    }

    #[instrument(skip(self))]
    async fn set_admin(&self, user_id: &str, organization_id: &str, is_admin: bool) -> bool {
        let result = async {
            let user_id = require_id("user_id", user_id)?;
            let organization_id = require_id("organization_id", organization_id)?;
            let matched = MembershipQueries::set_admin(
                self.gateway.as_ref(),
                user_id,
                organization_id,
                is_admin,
            )
            .await?;
            if !matched {
                return Err(Error::not_found(format!(
                    "membership of {user_id} in {organization_id}"
                )));
            }
            Ok::<(), Error>(())
        }
        .await;
        let role = Role::from_admin_flag(is_admin);
        self.settle(result, "Error updating role", |_| {
            ("Role updated", format!("Organization role is now {role}"))
        })
        .is_ok()
    }

    async fn insert_member(
        &self,
        email: &str,
        organization_id: &str,
        role: Role,
    ) -> Result<Membership> {
        let email = check_email(email)?;
        let organization_id = require_id("organization_id", organization_id)?;
        let gateway = self.gateway.as_ref();

        let profile = ProfileQueries::find_by_email(gateway, email)
            .await?
            .ok_or_else(|| Error::not_found(format!("user with email {email}")))?;
        MembershipQueries::insert(gateway, &profile.id, organization_id, role.is_admin()).await
    }

    async fn insert_invitation(
        &self,
        email: &str,
        organization_id: &str,
        role: Role,
    ) -> Result<OrganizationInvitation> {
        let email = check_email(email)?;
        let organization_id = require_id("organization_id", organization_id)?;
        let gateway = self.gateway.as_ref();

        let pending = InvitationQueries::pending_for_organization(gateway, organization_id).await?;
        if pending.iter().any(|i| i.email.eq_ignore_ascii_case(email)) {
            return Err(Error::validation(
                "email",
                format!("{email} already has a pending invitation"),
            ));
        }

        let token = generate_token();
        let invitation = NewInvitation {
            email,
            token: &token,
            organization_id,
            role,
            expires_at: expiry_from(Utc::now(), self.invitation_ttl_days),
        };
        InvitationQueries::insert(gateway, &invitation).await
    }

    /// Notify about `result` and refresh the roster on success
    fn settle<T>(
        &self,
        result: Result<T>,
        error_title: &str,
        success: impl FnOnce(&T) -> (&'static str, String),
    ) -> Result<T> {
        match &result {
            Ok(value) => {
                let (title, message) = success(value);
                info!(title, "{message}");
                self.notifier.success(title, &message);
                (self.refresh_users)();
            }
            Err(e) => {
                error!(error = %e, "{error_title}");
                self.notifier.error(error_title, &e.to_string());
            }
        }
        result
    }
}

fn check_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.validate_email() {
        Ok(email)
    } else {
        Err(Error::validation("email", "Enter a valid email address"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use callscope_core::InvitationStatus;
    use callscope_gateway::{MemoryGateway, Table};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile(id: &str, email: &str, name: Option<&str>) -> Value {
        json!({"id": id, "email": email, "full_name": name, "created_at": "2024-01-01T00:00:00Z"})
    }

    fn gateway() -> Arc<MemoryGateway> {
        Arc::new(
            MemoryGateway::new()
                .with_rows(
                    Table::Profiles,
                    vec![
                        profile("u1", "ada@example.com", Some("Ada")),
                        profile("u2", "bob@example.com", None),
                        profile("u3", "cy@example.com", Some("Cy")),
                    ],
                )
                .with_rows(
                    Table::UserRoles,
                    vec![json!({"user_id": "u1", "role": "admin"})],
                )
                .with_rows(
                    Table::UserOrganizations,
                    vec![
                        json!({"user_id": "u1", "organization_id": "o1", "is_admin": true, "created_at": "2024-01-01T00:00:00Z"}),
                        json!({"user_id": "u2", "organization_id": "o1", "is_admin": false, "created_at": "2024-01-02T00:00:00Z"}),
                        json!({"user_id": "u3", "organization_id": "o2", "is_admin": false, "created_at": "2024-01-03T00:00:00Z"}),
                    ],
                ),
        )
    }

    struct Harness {
        gateway: Arc<MemoryGateway>,
        notifier: Arc<RecordingNotifier>,
        refreshes: Arc<AtomicUsize>,
        actions: UserActions,
    }

    fn harness() -> Harness {
        let gateway = gateway();
        let notifier = Arc::new(RecordingNotifier::new());
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let actions = UserActions::new(
            gateway.clone(),
            notifier.clone(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        Harness {
            gateway,
            notifier,
            refreshes,
            actions,
        }
    }

    #[tokio::test]
    async fn test_global_roster_joins_roles() {
        let mut roster = GlobalRoster::new(gateway());

        let users = roster.load(false).await.unwrap();
        let summary: Vec<(&str, &str, Role)> = users
            .iter()
            .map(|u| (u.id.as_str(), u.name.as_str(), u.role))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("u1", "Ada", Role::Admin),
                ("u2", "bob@example.com", Role::User),
                ("u3", "Cy", Role::User),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_is_idempotent_unless_forced() {
        let gateway = gateway();
        let mut roster = GlobalRoster::new(gateway.clone());

        roster.load(false).await.unwrap();
        let after_first = gateway.request_count();
        roster.load(false).await.unwrap();
        assert_eq!(gateway.request_count(), after_first);

        roster.load(true).await.unwrap();
        assert_eq!(gateway.request_count(), after_first * 2);
    }

    #[tokio::test]
    async fn test_organization_roster_includes_pending_invites() {
        let h = harness();
        h.actions
            .invite_user("new@example.com", "o1", Role::Admin)
            .await
            .unwrap();

        let mut roster = OrganizationRoster::new(h.gateway.clone(), "o1");
        let users = roster.load(false).await.unwrap();

        assert_eq!(users.len(), 3);
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(users[1].role, Role::User);
        assert!(users[2].is_pending);
        assert_eq!(users[2].email, "new@example.com");
        assert_eq!(users[2].role, Role::Admin);
    }

    #[tokio::test]
    async fn test_add_user_by_email() {
        let h = harness();

        let membership = h
            .actions
            .add_user("CY@example.com", "o1", Role::User)
            .await
            .unwrap();
        assert_eq!(membership.user_id, "u3");
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);

        let err = h
            .actions
            .add_user("ghost@example.com", "o1", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_add_user_treats_wildcards_literally() {
        let h = harness();

        for email in ["c_@example.com", "%@example.com", "a*a@example.com"] {
            let err = h.actions.add_user(email, "o2", Role::User).await.unwrap_err();
            assert!(matches!(err, Error::NotFound { .. }), "{email} matched a profile");
        }
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.gateway
                .rows(Table::UserOrganizations)
                .iter()
                .filter(|row| row["organization_id"] == "o2")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected_before_request() {
        let h = harness();

        let err = h
            .actions
            .invite_user("not-an-email", "o1", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(h.gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_user() {
        let h = harness();

        h.actions.remove_user("u2", "o1").await.unwrap();
        assert_eq!(h.gateway.rows(Table::UserOrganizations).len(), 2);
        assert!(h.actions.remove_user("u2", "o1").await.is_err());
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_promote_and_demote() {
        let h = harness();

        assert!(h.actions.promote("u2", "o1").await);
        let membership = MembershipQueries::find(h.gateway.as_ref(), "u2", "o1")
            .await
            .unwrap()
            .unwrap();
        assert!(membership.is_admin);

        assert!(h.actions.demote("u2", "o1").await);
        assert!(!h.actions.promote("u2", "o9").await);
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_set_global_role_upserts() {
        let h = harness();

        assert!(h.actions.set_global_role("u3", Role::Admin).await);
        assert!(h.actions.set_global_role("u1", Role::User).await);

        let roles = UserRoleQueries::list_all(h.gateway.as_ref()).await.unwrap();
        assert_eq!(roles.len(), 2);
        assert!(UserRoleQueries::find_admin(h.gateway.as_ref(), "u3").await.unwrap().is_some());
        assert!(UserRoleQueries::find_admin(h.gateway.as_ref(), "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_password() {
        let h = harness();

        assert!(h.actions.reset_password(" ada@example.com ").await);
        assert_eq!(h.gateway.password_resets(), vec!["ada@example.com".to_string()]);
        assert!(!h.actions.reset_password("").await);
    }

    #[tokio::test]
    async fn test_invite_lifecycle() {
        let h = harness();

        let invitation = h
            .actions
            .invite_user("new@example.com", "o1", Role::User)
            .await
            .unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert!(invitation.expires_at > Utc::now());

        let duplicate = h
            .actions
            .invite_user("NEW@example.com", "o1", Role::User)
            .await;
        assert!(matches!(duplicate, Err(Error::Validation { .. })));

        assert!(h.actions.resend_invite(&invitation.id).await);
        let renewed = InvitationQueries::find_by_id(h.gateway.as_ref(), &invitation.id)
            .await
            .unwrap();
        assert_ne!(renewed.token, invitation.token);

        assert!(h.actions.cancel_invite(&invitation.id).await);
        assert!(!h.actions.cancel_invite(&invitation.id).await);
        assert!(!h.actions.resend_invite(&invitation.id).await);
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backend_failure_is_notified_without_refresh() {
        let h = harness();
        h.gateway.fail_table(Table::UserOrganizations, "permission denied");

        assert!(!h.actions.promote("u2", "o1").await);
        let errors = h.notifier.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("permission denied"));
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 0);
    }
}
