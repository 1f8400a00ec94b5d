//! The single seam between the session layer and the hosted backend

use crate::query::{Filter, QueryResult, RemoteFunction, Table, TableQuery};
use async_trait::async_trait;
use callscope_core::Result;
use serde_json::Value;
use std::fmt;

/// Access to the hosted table/function backend
///
/// Every call is a single attempt; retries are left to the caller. Rows travel
/// as JSON objects and are decoded by the typed helpers in [`crate::queries`].
#[async_trait]
pub trait DataGateway: Send + Sync + fmt::Debug {
    /// Read rows matching `query`
    async fn select(&self, query: &TableQuery) -> Result<QueryResult>;

    /// Insert one row and return it as stored
    async fn insert(&self, table: Table, row: Value) -> Result<Value>;

    /// Apply `patch` to every row matching `filters` and return the updated rows
    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;

    /// Delete every row matching `filters` and return how many went away
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64>;

    /// Invoke a server function
    async fn invoke(&self, function: RemoteFunction, body: Value) -> Result<Value>;

    /// Call a database procedure
    async fn rpc(&self, procedure: &str, args: Value) -> Result<Value>;

    /// Ask the auth service to email a password reset link
    async fn send_password_reset(&self, email: &str) -> Result<()>;

    /// Gateway name for logging
    fn name(&self) -> &str;
}
