//! Invitation tokens and acceptance

use callscope_core::utils::require_id;
use callscope_core::{Error, InvitationStatus, Membership, Result};
use callscope_gateway::{DataGateway, InvitationQueries, MembershipQueries};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{info, instrument, warn};

/// Length of generated invitation tokens
pub const TOKEN_LENGTH: usize = 48;

/// Days an invitation stays valid unless configured otherwise
pub const DEFAULT_INVITATION_TTL_DAYS: i64 = 7;

/// Random URL-safe invitation token
#[must_use]
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Expiry for an invitation issued at `now`
#[must_use]
pub fn expiry_from(now: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
    now + Duration::days(ttl_days)
}

/// Join the organization an invitation points at
///
/// An expired invitation is marked `expired` on the way out. Accepting an
/// invitation for an organization the user already belongs to keeps the
/// existing membership.
///
/// # Errors
///
/// Returns `NotFound` for an unknown token, a validation error when the
/// invitation is no longer pending or has expired, and the backend error if
/// a write fails.
#[instrument(skip(gateway, token))]
pub async fn accept_invitation(
    gateway: &dyn DataGateway,
    token: &str,
    user_id: &str,
) -> Result<Membership> {
    let token = require_id("token", token)?;
    let user_id = require_id("user_id", user_id)?;
    let invitation = InvitationQueries::find_by_token(gateway, token).await?;

    if invitation.status != InvitationStatus::Pending {
        return Err(Error::validation(
            "invitation",
            format!("Invitation is {}", invitation.status),
        ));
    }

    if invitation.is_expired_at(Utc::now()) {
        warn!(invitation_id = %invitation.id, "invitation expired");
        InvitationQueries::set_status(gateway, &invitation.id, InvitationStatus::Expired).await?;
        return Err(Error::validation("invitation", "Invitation has expired"));
    }

    let existing = MembershipQueries::find(gateway, user_id, &invitation.organization_id).await?;
    let membership = match existing {
        Some(membership) => membership,
        None => {
            MembershipQueries::insert(
                gateway,
                user_id,
                &invitation.organization_id,
                invitation.role.is_admin(),
            )
            .await?
        }
    };

    InvitationQueries::set_status(gateway, &invitation.id, InvitationStatus::Accepted).await?;
    info!(
        invitation_id = %invitation.id,
        organization_id = %invitation.organization_id,
        "invitation accepted"
    );
    Ok(membership)
}
