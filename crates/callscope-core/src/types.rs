//! Core data types for callscope

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Organization identifier type
pub type OrganizationId = String;

/// User identifier type
pub type UserId = String;

/// Call identifier type
pub type CallId = String;

/// Highest satisfaction score a call can carry
pub const MAX_SATISFACTION_SCORE: f64 = 5.0;

/// Role of a user, either globally or inside one organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Elevated permissions
    Admin,
    /// Regular member
    #[default]
    User,
}

impl Role {
    /// Role matching an admin flag
    #[must_use]
    pub const fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Self::Admin } else { Self::User }
    }

    /// Whether this is the admin role
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
        }
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(crate::Error::validation(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

/// A tenant boundary grouping users, calls and configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier
    pub id: OrganizationId,

    /// Unique URL-safe handle
    pub slug: String,

    /// Display name
    pub name: String,

    /// Optional free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Linked external voice-agent identifier
    #[serde(default)]
    pub agent_id: Option<String>,

    /// When the organization was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating or updating an organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OrganizationInput {
    /// Display name
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    /// URL-safe handle, derived from the name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::utils::check_slug"))]
    pub slug: Option<String>,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    /// Linked external voice-agent identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl OrganizationInput {
    /// Copy with surrounding whitespace removed from the text fields
    ///
    /// Validate the trimmed copy so a blank name cannot pass as non-empty.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        let trim = |value: Option<&str>| value.map(|v| v.trim().to_string());
        Self {
            name: self.name.trim().to_string(),
            slug: trim(self.slug.as_deref()),
            description: trim(self.description.as_deref()),
            agent_id: trim(self.agent_id.as_deref()),
        }
    }
}

/// A user's membership in one organization (`user_organizations` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Member user
    pub user_id: UserId,

    /// Organization the user belongs to
    pub organization_id: OrganizationId,

    /// Org-admin flag for this organization
    #[serde(default)]
    pub is_admin: bool,

    /// When the membership was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A global role record (`user_roles` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleRecord {
    /// User the role applies to
    pub user_id: UserId,

    /// Global role
    pub role: Role,
}

/// A user profile (`profiles` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// User identifier
    pub id: UserId,

    /// Login email
    pub email: String,

    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,

    /// Avatar reference
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

/// A user as shown in a roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationUser {
    /// User identifier (invitation id for pending users)
    pub id: UserId,

    /// Email address
    pub email: String,

    /// Display name
    pub name: String,

    /// Avatar reference
    pub avatar_url: Option<String>,

    /// Role in the roster's scope
    pub role: Role,

    /// Whether this entry is an invitation that has not been accepted
    pub is_pending: bool,

    /// When the user (or invitation) was created
    pub created_at: DateTime<Utc>,
}

impl OrganizationUser {
    /// Build a roster entry from a profile and a role
    #[must_use]
    pub fn from_profile(profile: &Profile, role: Role) -> Self {
        Self {
            id: profile.id.clone(),
            email: profile.email.clone(),
            name: profile
                .full_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| profile.email.clone()),
            avatar_url: profile.avatar_url.clone(),
            role,
            is_pending: false,
            created_at: profile.created_at,
        }
    }

    /// Build a pending roster entry from an invitation
    #[must_use]
    pub fn from_invitation(invitation: &OrganizationInvitation) -> Self {
        Self {
            id: invitation.id.clone(),
            email: invitation.email.clone(),
            name: invitation.email.clone(),
            avatar_url: None,
            role: invitation.role,
            is_pending: true,
            created_at: invitation.created_at,
        }
    }
}

/// Invitation lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    /// Waiting for the invitee
    #[default]
    Pending,
    /// Invitee joined the organization
    Accepted,
    /// Expiry passed before acceptance
    Expired,
    /// Invitee declined
    Rejected,
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Expired => write!(f, "expired"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A pending offer for an email address to join an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInvitation {
    /// Unique identifier
    pub id: String,

    /// Invited email address
    pub email: String,

    /// Secret token carried by the invitation link
    pub token: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: InvitationStatus,

    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,

    /// Owning organization
    pub organization_id: OrganizationId,

    /// Role granted on acceptance
    #[serde(default)]
    pub role: Role,

    /// When the invitation was created
    pub created_at: DateTime<Utc>,
}

impl OrganizationInvitation {
    /// Whether the invitation expired at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A recorded interaction between a customer and an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Unique identifier
    pub id: CallId,

    /// Customer identifier
    #[serde(default)]
    pub customer_id: Option<String>,

    /// Customer display name
    #[serde(default)]
    pub customer_name: String,

    /// Agent identifier
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Agent display name
    #[serde(default)]
    pub agent_name: String,

    /// When the call happened
    pub date: DateTime<Utc>,

    /// Duration in seconds, never negative
    #[serde(default, deserialize_with = "non_negative_seconds")]
    pub duration: f64,

    /// Audio recording reference
    #[serde(default)]
    pub audio_url: Option<String>,

    /// Summary text
    #[serde(default)]
    pub summary: Option<String>,

    /// Full transcript
    #[serde(default)]
    pub transcript: Option<String>,

    /// Satisfaction score within `[0, 5]`
    #[serde(default, deserialize_with = "bounded_score")]
    pub satisfaction_score: Option<f64>,

    /// Free-form tags
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: BTreeSet<String>,
}

impl Call {
    /// Calendar date of the call (UTC) in `YYYY-MM-DD` form
    #[must_use]
    pub fn day(&self) -> String {
        crate::utils::iso_date(self.date)
    }

    /// Satisfaction score with a missing value counted as zero
    #[must_use]
    pub fn score_or_zero(&self) -> f64 {
        self.satisfaction_score.unwrap_or(0.0)
    }

    /// Transcript text if present and not blank
    #[must_use]
    pub fn transcript_text(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

fn non_negative_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(if value.is_finite() { value.max(0.0) } else { 0.0 })
}

fn bounded_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, MAX_SATISFACTION_SCORE)))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range; `start` must not be after `end`
    ///
    /// # Errors
    ///
    /// Returns a validation error when the range is inverted.
    pub fn new(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        if start > end {
            return Err(crate::Error::validation(
                "date_range",
                format!("start {start} is after end {end}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// First day of the range
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `day` falls within the range
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Start of the first day, UTC
    #[must_use]
    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Start of the day after the last day, UTC
    #[must_use]
    pub fn end_timestamp_exclusive(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    /// Every day of the range in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}
