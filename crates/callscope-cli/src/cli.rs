//! Command line arguments

use callscope_core::{Role, SortColumn};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command line interface for the callscope client
#[derive(Debug, Parser)]
#[command(
    name = "callscope",
    version = env!("CARGO_PKG_VERSION"),
    about = "Organization-scoped call analytics client",
    long_about = "Browse organizations, calls, statistics and user rosters of a hosted call-center analytics backend."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Signed-in user id
    #[arg(short, long, env = "CALLSCOPE_USER", global = true)]
    pub user: Option<String>,

    /// Use a built-in demo backend instead of the configured one
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// How results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain-text columns
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage organizations and the current selection
    Orgs {
        /// Organization subcommand
        #[command(subcommand)]
        action: OrgCommands,
    },

    /// Check admin rights on an organization
    Access {
        /// Organization id (defaults to the current one)
        #[arg(value_name = "ORG_ID")]
        organization: Option<String>,
    },

    /// List calls of the current organization
    Calls(CallsArgs),

    /// Show one call, optionally with an AI summary
    Call {
        /// Call id
        #[arg(value_name = "CALL_ID")]
        id: String,

        /// Generate a summary of the transcript
        #[arg(long)]
        summarize: bool,
    },

    /// Show call statistics of the current organization
    Stats(StatsArgs),

    /// List or manage users
    Users {
        /// Organization id (defaults to the current one)
        #[arg(long, value_name = "ORG_ID")]
        org: Option<String>,

        /// List every user with their global role
        #[arg(long, conflicts_with = "org")]
        all: bool,

        /// Roster mutation
        #[command(subcommand)]
        action: Option<UserCommands>,
    },

    /// Invite an email address to an organization
    Invite {
        /// Email address to invite
        #[arg(value_name = "EMAIL")]
        email: String,

        /// Role granted on acceptance
        #[arg(long, default_value = "user")]
        role: Role,

        /// Organization id (defaults to the current one)
        #[arg(long, value_name = "ORG_ID")]
        org: Option<String>,
    },

    /// Accept an invitation as the signed-in user
    Accept {
        /// Invitation token
        #[arg(value_name = "TOKEN")]
        token: String,
    },

    /// Show or validate the resolved configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Organization commands
#[derive(Debug, Subcommand)]
pub enum OrgCommands {
    /// List organizations visible to the signed-in user
    List,

    /// Make an organization current
    Switch {
        /// Organization id
        #[arg(value_name = "ORG_ID")]
        id: String,
    },

    /// Create an organization administered by the signed-in user
    Create {
        /// Display name
        #[arg(value_name = "NAME")]
        name: String,

        /// URL-safe handle (derived from the name when omitted)
        #[arg(long)]
        slug: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete an organization
    Delete {
        /// Organization id
        #[arg(value_name = "ORG_ID")]
        id: String,
    },
}

/// Roster mutations
#[derive(Debug, Subcommand)]
pub enum UserCommands {
    /// Add a registered user by email
    Add {
        /// Email of the user
        #[arg(value_name = "EMAIL")]
        email: String,

        /// Organization role
        #[arg(long, default_value = "user")]
        role: Role,
    },

    /// Remove a user from the organization
    Remove {
        /// User id
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },

    /// Make a member an organization admin
    Promote {
        /// User id
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },

    /// Make an organization admin a regular member
    Demote {
        /// User id
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },

    /// Set a user's global role
    Role {
        /// User id
        #[arg(value_name = "USER_ID")]
        user_id: String,

        /// New global role
        #[arg(value_name = "ROLE")]
        role: Role,
    },

    /// Email a password reset link
    ResetPassword {
        /// Email address
        #[arg(value_name = "EMAIL")]
        email: String,
    },

    /// Issue a fresh link for a pending invitation
    ResendInvite {
        /// Invitation id
        #[arg(value_name = "INVITATION_ID")]
        id: String,
    },

    /// Withdraw a pending invitation
    CancelInvite {
        /// Invitation id
        #[arg(value_name = "INVITATION_ID")]
        id: String,
    },
}

/// Inclusive day range given on the command line
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct RangeArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "from")]
    pub to: Option<NaiveDate>,
}

/// Arguments of `calls`
#[derive(Debug, Clone, Args)]
pub struct CallsArgs {
    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Calls per page (defaults to the configured page size)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Column to sort by
    #[arg(long, default_value = "date")]
    pub sort: SortColumn,

    /// Sort ascending instead of newest first
    #[arg(long)]
    pub asc: bool,

    /// Day range
    #[command(flatten)]
    pub range: RangeArgs,
}

/// Arguments of `stats`
#[derive(Debug, Clone, Args)]
pub struct StatsArgs {
    /// Day range
    #[command(flatten)]
    pub range: RangeArgs,

    /// Use the backend's per-day counts instead of aggregating locally
    #[arg(long, requires = "from")]
    pub daily: bool,

    /// Show the backend's aggregates for one customer instead
    #[arg(long, value_name = "CUSTOMER_ID", conflicts_with_all = ["daily", "from"])]
    pub customer: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_calls_with_range() {
        let cli = Cli::try_parse_from([
            "callscope",
            "calls",
            "--page",
            "2",
            "--sort",
            "duration",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
        ])
        .unwrap();

        let Commands::Calls(args) = cli.command else {
            panic!("expected calls command");
        };
        assert_eq!(args.page, 2);
        assert_eq!(args.sort, SortColumn::Duration);
        assert_eq!(args.range.from, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_range_needs_both_ends() {
        assert!(Cli::try_parse_from(["callscope", "stats", "--from", "2024-01-01"]).is_err());
    }

    #[test]
    fn test_lone_to_and_bare_daily_are_rejected() {
        assert!(Cli::try_parse_from(["callscope", "calls", "--to", "2024-01-31"]).is_err());
        assert!(Cli::try_parse_from(["callscope", "stats", "--daily"]).is_err());
        assert!(
            Cli::try_parse_from([
                "callscope", "stats", "--daily", "--from", "2024-01-01", "--to", "2024-01-07",
            ])
            .is_ok()
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "callscope", "invite", "x@example.com", "--role", "admin", "--offline", "--user", "u1",
        ])
        .unwrap();

        assert!(cli.offline);
        assert_eq!(cli.user.as_deref(), Some("u1"));
        assert!(matches!(cli.command, Commands::Invite { role: Role::Admin, .. }));
    }
}
