//! In-memory gateway for tests and offline runs

use crate::gateway::DataGateway;
use crate::query::{Filter, QueryResult, RemoteFunction, Table, TableQuery, compare_values};
use async_trait::async_trait;
use callscope_core::{Error, Result};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use uuid::Uuid;

/// Handler answering a function or procedure call
pub type Handler = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Gateway backed by in-process tables
///
/// Filters, ordering, ranges and exact counts behave like the hosted backend.
/// Functions and procedures answer through registered handlers, and any
/// table, function or procedure can be made to fail on demand.
#[derive(Default)]
pub struct MemoryGateway {
    /// Rows per table
    tables: RwLock<HashMap<Table, Vec<Value>>>,

    /// Server function handlers
    functions: RwLock<HashMap<RemoteFunction, Handler>>,

    /// Database procedure handlers
    procedures: RwLock<HashMap<String, Handler>>,

    /// Injected failures keyed by table, function or procedure name
    failures: RwLock<HashMap<String, String>>,

    /// Emails that asked for a password reset
    password_resets: Mutex<Vec<String>>,

    /// Request tracking
    requests: AtomicU64,

    /// Most rows one select returns, like the backend's `max-rows`
    max_rows: Option<usize>,
}

impl MemoryGateway {
    /// Create an empty gateway
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table, replacing anything already in it
    #[must_use]
    pub fn with_rows(self, table: Table, rows: Vec<Value>) -> Self {
        self.seed(table, rows);
        self
    }

    /// Register a function handler
    #[must_use]
    pub fn with_function<F>(self, function: RemoteFunction, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.write().insert(function, Arc::new(handler));
        self
    }

    /// Register a procedure handler
    #[must_use]
    pub fn with_procedure<F>(self, procedure: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .insert(procedure.into(), Arc::new(handler));
        self
    }

    /// Cap the rows a single select returns; the exact count is unaffected
    #[must_use]
    pub const fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Replace the rows of a table
    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        self.tables.write().insert(table, rows);
    }

    /// Snapshot of a table's rows
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables.read().get(&table).cloned().unwrap_or_default()
    }

    /// Make every operation on `table` fail with `message`
    pub fn fail_table(&self, table: Table, message: impl Into<String>) {
        self.failures
            .write()
            .insert(table.name().to_string(), message.into());
    }

    /// Make `function` fail with `message`
    pub fn fail_function(&self, function: RemoteFunction, message: impl Into<String>) {
        self.failures
            .write()
            .insert(function.name().to_string(), message.into());
    }

    /// Make `procedure` fail with `message`
    pub fn fail_procedure(&self, procedure: impl Into<String>, message: impl Into<String>) {
        self.failures.write().insert(procedure.into(), message.into());
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Number of requests served so far, failed ones included
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    /// Emails that asked for a password reset, oldest first
    #[must_use]
    pub fn password_resets(&self) -> Vec<String> {
        self.password_resets.lock().clone()
    }

    fn begin(&self, target: &str) -> Result<()> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        match self.failures.read().get(target) {
            Some(message) => Err(Error::remote(message.clone())),
            None => Ok(()),
        }
    }

    fn check_unique(rows: &[Value], table: Table, candidate: &Value) -> Result<()> {
        for key in unique_keys(table) {
            let clash = rows.iter().any(|row| {
                key.iter()
                    .all(|column| row.get(*column).is_some() && row.get(*column) == candidate.get(*column))
            });
            if clash {
                return Err(Error::remote_status(
                    409,
                    format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        table.name(),
                        key.join("_")
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables: HashMap<&str, usize> = self
            .tables
            .read()
            .iter()
            .map(|(table, rows)| (table.name(), rows.len()))
            .collect();
        f.debug_struct("MemoryGateway")
            .field("tables", &tables)
            .field("functions", &self.functions.read().len())
            .field("procedures", &self.procedures.read().len())
            .field("requests", &self.request_count())
            .field("max_rows", &self.max_rows)
            .finish_non_exhaustive()
    }
}

/// Column sets that must be unique per table
fn unique_keys(table: Table) -> &'static [&'static [&'static str]] {
    match table {
        Table::Organizations => &[&["id"], &["slug"]],
        Table::UserOrganizations => &[&["user_id", "organization_id"]],
        Table::UserRoles => &[&["user_id"]],
        Table::OrganizationInvitations => &[&["id"], &["token"]],
        Table::Calls | Table::CallsView | Table::Profiles => &[&["id"]],
    }
}

/// Ascending order with nulls last, as the backend sorts by default
fn compare_for_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let Some(object) = row.as_object() else {
        return row.clone();
    };
    let projected: Map<String, Value> = columns
        .split(',')
        .map(str::trim)
        .filter_map(|column| {
            object
                .get(column)
                .map(|value| (column.to_string(), value.clone()))
        })
        .collect();
    Value::Object(projected)
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn select(&self, query: &TableQuery) -> Result<QueryResult> {
        self.begin(query.table.name())?;

        let mut rows: Vec<Value> = self
            .tables
            .read()
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query.order.iter().fold(Ordering::Equal, |acc, order| {
                acc.then_with(|| {
                    let a = a.get(&order.column).unwrap_or(&Value::Null);
                    let b = b.get(&order.column).unwrap_or(&Value::Null);
                    let ordering = compare_for_order(a, b);
                    if order.ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                })
            })
        });

        let total = query
            .count
            .then(|| u64::try_from(rows.len()).unwrap_or(u64::MAX));

        let rows = match query.range {
            Some((first, last)) => {
                let skip = usize::try_from(first).unwrap_or(usize::MAX);
                let take = usize::try_from(last.saturating_sub(first).saturating_add(1))
                    .unwrap_or(usize::MAX);
                rows.into_iter().skip(skip).take(take).collect()
            }
            None => rows,
        };
        let rows: Vec<Value> = match self.max_rows {
            Some(max_rows) => rows.into_iter().take(max_rows).collect(),
            None => rows,
        };

        Ok(QueryResult {
            rows: rows
                .iter()
                .map(|row| project(row, &query.columns))
                .collect(),
            total,
        })
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value> {
        self.begin(table.name())?;

        let Value::Object(mut object) = row else {
            return Err(Error::validation(table.name(), "row must be a JSON object"));
        };
        object
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        object
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        let row = Value::Object(object);

        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        Self::check_unique(rows, table, &row)?;
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        self.begin(table.name())?;

        let Value::Object(patch) = patch else {
            return Err(Error::validation(table.name(), "patch must be a JSON object"));
        };

        let mut tables = self.tables.write();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
                if let Value::Object(object) = row {
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        self.begin(table.name())?;

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches_all(row, filters));
        Ok(u64::try_from(before - rows.len()).unwrap_or(u64::MAX))
    }

    async fn invoke(&self, function: RemoteFunction, body: Value) -> Result<Value> {
        self.begin(function.name())?;

        let handler = self.functions.read().get(&function).cloned();
        match handler {
            Some(handler) => handler(body),
            None => Err(Error::remote_status(
                404,
                format!("Function {} not found", function.name()),
            )),
        }
    }

    async fn rpc(&self, procedure: &str, args: Value) -> Result<Value> {
        self.begin(procedure)?;

        let handler = self.procedures.read().get(procedure).cloned();
        match handler {
            Some(handler) => handler(args),
            None => Err(Error::remote_status(
                404,
                format!("Could not find the function public.{procedure}"),
            )),
        }
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.begin("recover")?;
        self.password_resets.lock().push(email.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
