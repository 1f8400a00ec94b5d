//! Core types, statistics and sorting for the callscope analytics client

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod config;
pub mod error;
pub mod pagination;
pub mod sort;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, LoggingConfig};
pub use error::{Error, Result};
pub use pagination::{Page, PageRequest, total_pages};
pub use sort::{SortColumn, SortDirection, SortState, sort_calls};
pub use stats::{CallStats, calculate_stats, calls_per_day_in_range};
pub use types::{
    Call, CallId, DateRange, InvitationStatus, Membership, Organization, OrganizationId,
    OrganizationInput, OrganizationInvitation, OrganizationUser, Profile, Role, UserId,
    UserRoleRecord,
};

/// Initialize the logging system
///
/// Events go to stderr. `RUST_LOG` wins over the configured level when set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let installed = if logging.format == "json" {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer.pretty()).try_init()
    };

    installed.map_err(|e| Error::configuration(format!("logging already initialized: {e}")))
}
