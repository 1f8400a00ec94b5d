//! Typed operations on each backend collection

use crate::gateway::DataGateway;
use crate::query::{Filter, QueryResult, Table, TableQuery, decode_rows, literal_pattern};
use callscope_core::pagination::MAX_PAGE_SIZE;
use callscope_core::{
    Call, DateRange, Error, InvitationStatus, Membership, Organization, OrganizationInput,
    OrganizationInvitation, Profile, Result, Role, UserRoleRecord,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Organization operations
#[derive(Debug)]
pub struct OrganizationQueries;

impl OrganizationQueries {
    /// Every organization, ordered by name
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn list_all(gateway: &dyn DataGateway) -> Result<Vec<Organization>> {
        let query = TableQuery::from(Table::Organizations).order("name", true);
        gateway.select(&query).await?.decode()
    }

    /// Organizations with the given ids, ordered by name
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn list_by_ids(
        gateway: &dyn DataGateway,
        ids: &[String],
    ) -> Result<Vec<Organization>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = TableQuery::from(Table::Organizations)
            .filter(Filter::in_list("id", ids.iter().map(String::as_str)))
            .order("name", true);
        gateway.select(&query).await?.decode()
    }

    /// Organization by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no organization has this id.
    pub async fn find_by_id(gateway: &dyn DataGateway, id: &str) -> Result<Organization> {
        let query = TableQuery::from(Table::Organizations).eq("id", id).limit(1);
        gateway
            .select(&query)
            .await?
            .first()?
            .ok_or_else(|| Error::not_found(format!("organization {id}")))
    }

    /// Insert an organization under `slug`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the row (a taken slug, for one).
    pub async fn insert(
        gateway: &dyn DataGateway,
        input: &OrganizationInput,
        slug: &str,
    ) -> Result<Organization> {
        let row = json!({
            "name": input.name.trim(),
            "slug": slug,
            "description": input.description,
            "agent_id": input.agent_id,
        });
        let stored = gateway.insert(Table::Organizations, row).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Apply `patch` to one organization
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no organization has this id.
    pub async fn update(
        gateway: &dyn DataGateway,
        id: &str,
        patch: &OrganizationInput,
    ) -> Result<Organization> {
        let rows = gateway
            .update(
                Table::Organizations,
                &[Filter::eq("id", id)],
                serde_json::to_value(patch)?,
            )
            .await?;
        QueryResult { rows, total: None }
            .first()?
            .ok_or_else(|| Error::not_found(format!("organization {id}")))
    }

    /// Delete one organization; false when nothing matched
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn delete(gateway: &dyn DataGateway, id: &str) -> Result<bool> {
        let removed = gateway
            .delete(Table::Organizations, &[Filter::eq("id", id)])
            .await?;
        Ok(removed > 0)
    }
}

/// Membership (`user_organizations`) operations
#[derive(Debug)]
pub struct MembershipQueries;

impl MembershipQueries {
    /// Memberships of one user
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn for_user(gateway: &dyn DataGateway, user_id: &str) -> Result<Vec<Membership>> {
        let query = TableQuery::from(Table::UserOrganizations).eq("user_id", user_id);
        gateway.select(&query).await?.decode()
    }

    /// Memberships of one organization, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn for_organization(
        gateway: &dyn DataGateway,
        organization_id: &str,
    ) -> Result<Vec<Membership>> {
        let query = TableQuery::from(Table::UserOrganizations)
            .eq("organization_id", organization_id)
            .order("created_at", true);
        gateway.select(&query).await?.decode()
    }

    /// The membership of `user_id` in `organization_id`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or the row cannot be decoded.
    pub async fn find(
        gateway: &dyn DataGateway,
        user_id: &str,
        organization_id: &str,
    ) -> Result<Option<Membership>> {
        let query = TableQuery::from(Table::UserOrganizations)
            .select("user_id,organization_id,is_admin,created_at")
            .eq("user_id", user_id)
            .eq("organization_id", organization_id)
            .limit(1);
        gateway.select(&query).await?.first()
    }

    /// Add a user to an organization
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the row (an existing membership, for one).
    pub async fn insert(
        gateway: &dyn DataGateway,
        user_id: &str,
        organization_id: &str,
        is_admin: bool,
    ) -> Result<Membership> {
        let row = json!({
            "user_id": user_id,
            "organization_id": organization_id,
            "is_admin": is_admin,
        });
        let stored = gateway.insert(Table::UserOrganizations, row).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Set the org-admin flag; false when no membership matched
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn set_admin(
        gateway: &dyn DataGateway,
        user_id: &str,
        organization_id: &str,
        is_admin: bool,
    ) -> Result<bool> {
        let rows = gateway
            .update(
                Table::UserOrganizations,
                &Self::key(user_id, organization_id),
                json!({ "is_admin": is_admin }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Remove a user from an organization
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn delete(
        gateway: &dyn DataGateway,
        user_id: &str,
        organization_id: &str,
    ) -> Result<u64> {
        gateway
            .delete(Table::UserOrganizations, &Self::key(user_id, organization_id))
            .await
    }

    fn key(user_id: &str, organization_id: &str) -> [Filter; 2] {
        [
            Filter::eq("user_id", user_id),
            Filter::eq("organization_id", organization_id),
        ]
    }
}

/// Global role (`user_roles`) operations
#[derive(Debug)]
pub struct UserRoleQueries;

impl UserRoleQueries {
    /// The global admin record of `user_id`, if one exists
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or the row cannot be decoded.
    pub async fn find_admin(
        gateway: &dyn DataGateway,
        user_id: &str,
    ) -> Result<Option<UserRoleRecord>> {
        let query = TableQuery::from(Table::UserRoles)
            .eq("user_id", user_id)
            .eq("role", Role::Admin.to_string())
            .limit(1);
        gateway.select(&query).await?.first()
    }

    /// Every role record
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn list_all(gateway: &dyn DataGateway) -> Result<Vec<UserRoleRecord>> {
        let query = TableQuery::from(Table::UserRoles).select("user_id,role");
        gateway.select(&query).await?.decode()
    }

    /// Set the global role of `user_id`, creating the record when missing
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn upsert(
        gateway: &dyn DataGateway,
        user_id: &str,
        role: Role,
    ) -> Result<UserRoleRecord> {
        let updated = gateway
            .update(
                Table::UserRoles,
                &[Filter::eq("user_id", user_id)],
                json!({ "role": role }),
            )
            .await?;
        if let Some(row) = updated.into_iter().next() {
            return Ok(serde_json::from_value(row)?);
        }

        let stored = gateway
            .insert(Table::UserRoles, json!({ "user_id": user_id, "role": role }))
            .await?;
        Ok(serde_json::from_value(stored)?)
    }
}

/// Profile operations
#[derive(Debug)]
pub struct ProfileQueries;

impl ProfileQueries {
    /// Every profile, ordered by email
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn list_all(gateway: &dyn DataGateway) -> Result<Vec<Profile>> {
        let query = TableQuery::from(Table::Profiles).order("email", true);
        gateway.select(&query).await?.decode()
    }

    /// Profiles with the given ids, ordered by email
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn list_by_ids(gateway: &dyn DataGateway, ids: &[String]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = TableQuery::from(Table::Profiles)
            .filter(Filter::in_list("id", ids.iter().map(String::as_str)))
            .order("email", true);
        gateway.select(&query).await?.decode()
    }

    /// Profile registered under `email`, compared case-insensitively
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or the row cannot be decoded.
    pub async fn find_by_email(gateway: &dyn DataGateway, email: &str) -> Result<Option<Profile>> {
        let email = email.trim().to_lowercase();
        let query = TableQuery::from(Table::Profiles)
            .filter(Filter::ilike("email", literal_pattern(&email)))
            .order("email", true);
        // `*` in an address still matches any single character
        let candidates: Vec<Profile> = gateway.select(&query).await?.decode()?;
        Ok(candidates
            .into_iter()
            .find(|profile| profile.email.to_lowercase() == email))
    }
}

/// Parameter struct for invitation creation
#[derive(Debug)]
pub struct NewInvitation<'a> {
    /// Invited email address
    pub email: &'a str,
    /// Secret link token
    pub token: &'a str,
    /// Owning organization
    pub organization_id: &'a str,
    /// Role granted on acceptance
    pub role: Role,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

/// Invitation operations
#[derive(Debug)]
pub struct InvitationQueries;

impl InvitationQueries {
    /// Pending invitations of one organization, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn pending_for_organization(
        gateway: &dyn DataGateway,
        organization_id: &str,
    ) -> Result<Vec<OrganizationInvitation>> {
        let query = TableQuery::from(Table::OrganizationInvitations)
            .eq("organization_id", organization_id)
            .eq("status", InvitationStatus::Pending.to_string())
            .order("created_at", false);
        gateway.select(&query).await?.decode()
    }

    /// Invitation by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no invitation has this id.
    pub async fn find_by_id(
        gateway: &dyn DataGateway,
        id: &str,
    ) -> Result<OrganizationInvitation> {
        let query = TableQuery::from(Table::OrganizationInvitations)
            .eq("id", id)
            .limit(1);
        gateway
            .select(&query)
            .await?
            .first()?
            .ok_or_else(|| Error::not_found(format!("invitation {id}")))
    }

    /// Invitation carrying `token`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no invitation carries this token.
    pub async fn find_by_token(
        gateway: &dyn DataGateway,
        token: &str,
    ) -> Result<OrganizationInvitation> {
        let query = TableQuery::from(Table::OrganizationInvitations)
            .eq("token", token)
            .limit(1);
        gateway
            .select(&query)
            .await?
            .first()?
            .ok_or_else(|| Error::not_found("invitation for token"))
    }

    /// Store a new pending invitation
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the row.
    pub async fn insert(
        gateway: &dyn DataGateway,
        invitation: &NewInvitation<'_>,
    ) -> Result<OrganizationInvitation> {
        let row = json!({
            "email": invitation.email,
            "token": invitation.token,
            "organization_id": invitation.organization_id,
            "role": invitation.role,
            "status": InvitationStatus::Pending,
            "expires_at": invitation.expires_at,
        });
        let stored = gateway.insert(Table::OrganizationInvitations, row).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Move an invitation to `status`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no invitation has this id.
    pub async fn set_status(
        gateway: &dyn DataGateway,
        id: &str,
        status: InvitationStatus,
    ) -> Result<()> {
        let rows = gateway
            .update(
                Table::OrganizationInvitations,
                &[Filter::eq("id", id)],
                json!({ "status": status }),
            )
            .await?;
        if rows.is_empty() {
            return Err(Error::not_found(format!("invitation {id}")));
        }
        Ok(())
    }

    /// Issue a fresh token and expiry for a pending invitation
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no pending invitation has this id.
    pub async fn renew(
        gateway: &dyn DataGateway,
        id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OrganizationInvitation> {
        let rows = gateway
            .update(
                Table::OrganizationInvitations,
                &[
                    Filter::eq("id", id),
                    Filter::eq("status", InvitationStatus::Pending.to_string()),
                ],
                json!({ "token": token, "expires_at": expires_at }),
            )
            .await?;
        QueryResult { rows, total: None }
            .first()?
            .ok_or_else(|| Error::not_found(format!("pending invitation {id}")))
    }

    /// Delete an invitation; false when nothing matched
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn delete(gateway: &dyn DataGateway, id: &str) -> Result<bool> {
        let removed = gateway
            .delete(Table::OrganizationInvitations, &[Filter::eq("id", id)])
            .await?;
        Ok(removed > 0)
    }
}

/// Parameter struct for filtering calls
#[derive(Debug, Clone, Copy)]
pub struct CallFilter<'a> {
    /// Owning organization's slug
    pub organization_slug: &'a str,
    /// Inclusive day range on the call date
    pub date_range: Option<DateRange>,
}

impl CallFilter<'_> {
    fn apply(&self, mut query: TableQuery) -> TableQuery {
        query = query.eq("organization_slug", self.organization_slug);
        if let Some(range) = self.date_range {
            query = query
                .filter(Filter::gte("date", range.start_timestamp().to_rfc3339()))
                .filter(Filter::lt("date", range.end_timestamp_exclusive().to_rfc3339()));
        }
        query
    }
}

/// One page of calls with the exact total
#[derive(Debug, Clone, PartialEq)]
pub struct CallPage {
    /// Calls on the page
    pub calls: Vec<Call>,
    /// Matching calls across all pages
    pub total_count: u64,
}

/// Call operations
#[derive(Debug)]
pub struct CallQueries;

impl CallQueries {
    /// One page of calls sorted by `sort_column` on the backend
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or a row cannot be decoded.
    pub async fn page(
        gateway: &dyn DataGateway,
        filter: &CallFilter<'_>,
        sort_column: &str,
        ascending: bool,
        rows: (u64, u64),
    ) -> Result<CallPage> {
        let query = filter
            .apply(TableQuery::from(Table::CallsView))
            .order(sort_column, ascending)
            .order("id", true)
            .range(rows.0, rows.1)
            .with_count();

        let result = gateway.select(&query).await?;
        let returned = u64::try_from(result.rows.len()).unwrap_or(u64::MAX);
        let total_count = result.total.unwrap_or(rows.0.saturating_add(returned));
        Ok(CallPage {
            calls: decode_rows(result.rows)?,
            total_count,
        })
    }

    /// Every call matching `filter`, newest first
    ///
    /// Rows are fetched in batches until the exact count is reached, so a
    /// backend capping rows per response cannot truncate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails, a row cannot be decoded, or
    /// the backend stops returning rows before the reported count.
    pub async fn list(gateway: &dyn DataGateway, filter: &CallFilter<'_>) -> Result<Vec<Call>> {
        let batch = u64::from(MAX_PAGE_SIZE);
        let mut rows = Vec::new();
        let mut fetched: u64 = 0;

        loop {
            let query = filter
                .apply(TableQuery::from(Table::CallsView))
                .order("date", false)
                .order("id", true)
                .range(fetched, fetched + batch - 1)
                .with_count();
            let result = gateway.select(&query).await?;
            let returned = u64::try_from(result.rows.len()).unwrap_or(u64::MAX);
            fetched = fetched.saturating_add(returned);
            rows.extend(result.rows);

            match result.total {
                Some(total) if fetched >= total => break,
                Some(total) if returned == 0 => {
                    return Err(Error::remote(format!(
                        "call listing stopped after {fetched} of {total} rows"
                    )));
                }
                None if returned < batch => break,
                _ => {}
            }
        }

        decode_rows(rows)
    }
}
