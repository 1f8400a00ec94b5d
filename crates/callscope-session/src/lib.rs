//! Session layer of the callscope analytics client
//!
//! [`OrganizationContext`] owns the current-organization selection and
//! publishes it through a watch channel; every other component reads it via a
//! [`SessionView`]. All backend access goes through a
//! [`callscope_gateway::DataGateway`].

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod calls;
pub mod invitations;
pub mod notify;
pub mod organizations;
pub mod permissions;
pub mod roster;
pub mod session;
pub mod stats;
pub mod storage;

pub use calls::{CallsLoader, CallsQuery};
pub use invitations::{DEFAULT_INVITATION_TTL_DAYS, accept_invitation, generate_token};
pub use notify::{Notification, NotificationLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use organizations::{LoadState, OrganizationContext};
pub use permissions::{PermissionResolver, Permissions};
pub use roster::{GlobalRoster, OrganizationRoster, RefreshUsers, UserActions};
pub use session::{Session, SessionView, SessionWriter};
pub use stats::{CustomerStats, StatsLoader};
pub use storage::{CURRENT_ORGANIZATION_KEY, DurableStore, FileStore, MemoryStore};
