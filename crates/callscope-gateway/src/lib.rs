//! Remote data gateway for the callscope analytics client
//!
//! [`DataGateway`] is the only way the session layer talks to the hosted
//! backend. [`RestGateway`] speaks its HTTP API; [`MemoryGateway`] keeps
//! everything in process for tests and offline runs.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod gateway;
pub mod memory;
pub mod queries;
pub mod query;
pub mod rest;

pub use gateway::DataGateway;
pub use memory::MemoryGateway;
pub use queries::{
    CallFilter, CallPage, CallQueries, InvitationQueries, MembershipQueries, NewInvitation,
    OrganizationQueries, ProfileQueries, UserRoleQueries,
};
pub use query::{Filter, FilterOp, Order, QueryResult, RemoteFunction, Table, TableQuery};
pub use rest::RestGateway;

/// Procedure returning `{ day, count }` rows for an organization and date range
pub const CALLS_PER_DAY_PROCEDURE: &str = "get_calls_per_day";
