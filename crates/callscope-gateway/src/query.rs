//! Table query model shared by every gateway implementation

use callscope_core::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Collections exposed by the hosted backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Tenants
    Organizations,
    /// User ↔ organization memberships with the org-admin flag
    UserOrganizations,
    /// Global role records
    UserRoles,
    /// Pending and historical invitations
    OrganizationInvitations,
    /// Raw call records
    Calls,
    /// Calls joined with their organization
    CallsView,
    /// User profiles
    Profiles,
}

impl Table {
    /// Collection name on the backend
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::UserOrganizations => "user_organizations",
            Self::UserRoles => "user_roles",
            Self::OrganizationInvitations => "organization_invitations",
            Self::Calls => "calls",
            Self::CallsView => "calls_view",
            Self::Profiles => "profiles",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Invocable server functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteFunction {
    /// Fetch one call with its transcript
    GetCall,
    /// Per-customer call statistics
    GetCustomerStats,
    /// Pull calls from the voice-agent provider
    GetAgentCalls,
    /// Move agent data between organizations
    MigrateAgentData,
    /// AI summary of a transcript
    GenerateSummary,
    /// Text to speech through the voice-agent provider
    TextToSpeech,
    /// Voice-agent account diagnostics
    AgentDiagnostic,
    /// Provider API health monitor
    ApiMonitor,
}

impl RemoteFunction {
    /// Function name on the backend
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetCall => "get-call",
            Self::GetCustomerStats => "get-customer-stats",
            Self::GetAgentCalls => "get-elevenlabs-calls",
            Self::MigrateAgentData => "migrate-agent-data",
            Self::GenerateSummary => "generate-summary",
            Self::TextToSpeech => "elevenlabs-tts",
            Self::AgentDiagnostic => "elevenlabs-diagnostic",
            Self::ApiMonitor => "api-monitor",
        }
    }
}

impl fmt::Display for RemoteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison applied by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Equal
    Eq,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Member of a list
    In,
    /// Case-insensitive pattern: `%` matches any run of characters, `_` one
    /// character, and `\` escapes the next character
    ILike,
}

impl FilterOp {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::In => "in",
            Self::ILike => "ilike",
        }
    }
}

/// One column condition of a query
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column the condition applies to
    pub column: String,
    /// Comparison
    pub op: FilterOp,
    /// Operand; an array for [`FilterOp::In`]
    pub value: Value,
}

impl Filter {
    fn new(column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value.into())
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte, value.into())
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lt, value.into())
    }

    /// `column IN (values)`
    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            column,
            FilterOp::In,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// `column ILIKE pattern`
    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOp::ILike, Value::String(pattern.into()))
    }

    /// PostgREST query-string pair for this filter
    #[must_use]
    pub fn to_query_pair(&self) -> (String, String) {
        let operand = match (&self.op, &self.value) {
            (FilterOp::Eq, Value::Null) => return (self.column.clone(), "is.null".to_string()),
            (FilterOp::In, Value::Array(items)) => {
                let quoted: Vec<String> = items.iter().map(quote_list_item).collect();
                format!("({})", quoted.join(","))
            }
            (FilterOp::ILike, Value::String(pattern)) => rest_pattern(pattern),
            (_, value) => plain_text(value),
        };
        (self.column.clone(), format!("{}.{operand}", self.op.keyword()))
    }

    /// Whether a JSON row satisfies the filter
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => compare_values(field, &self.value) == Some(Ordering::Equal),
            FilterOp::Gte => matches!(
                compare_values(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_values(field, &self.value) == Some(Ordering::Less),
            FilterOp::In => self.value.as_array().is_some_and(|items| {
                items
                    .iter()
                    .any(|item| compare_values(field, item) == Some(Ordering::Equal))
            }),
            FilterOp::ILike => match (field.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => ilike_matches(text, pattern),
                _ => false,
            },
        }
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quote_list_item(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        other => other.to_string(),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Order two JSON scalars the way the backend would; `None` when incomparable
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (parse_timestamp(a), parse_timestamp(b)) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// ILIKE pattern matching `text` literally
///
/// `%`, `_` and backslash are escaped. The REST filter syntax has no escape for
/// `*`, so it becomes the single-character wildcard `_`; callers needing an
/// exact match must re-check the rows they get back.
#[must_use]
pub fn literal_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '%' | '_' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            c => pattern.push(c),
        }
    }
    pattern
}

/// REST spelling of an ILIKE pattern: unescaped `%` becomes `*`
fn rest_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '%' => out.push('*'),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            c => LikeToken::Literal(c),
        });
    }
    tokens
}

fn ilike_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let tokens = like_tokens(&pattern.to_lowercase());

    let (mut t, mut p) = (0, 0);
    // Last `%` seen and the text position it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyRun) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(LikeToken::AnyOne) => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::Literal(c)) if text.get(t) == Some(c) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((run, absorbed)) => {
                    backtrack = Some((run, absorbed + 1));
                    p = run + 1;
                    t = absorbed + 1;
                }
                None => return false,
            },
        }
    }
    tokens
        .get(p..)
        .is_some_and(|rest| rest.iter().all(|token| *token == LikeToken::AnyRun))
}

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to order by
    pub column: String,
    /// Ascending when true
    pub ascending: bool,
}

/// A read against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    /// Target collection
    pub table: Table,
    /// Column list (`*` for all)
    pub columns: String,
    /// Conditions, all of which must hold
    pub filters: Vec<Filter>,
    /// Ordering keys, most significant first
    pub order: Vec<Order>,
    /// Inclusive row range `(first, last)`
    pub range: Option<(u64, u64)>,
    /// Ask for the exact total row count
    pub count: bool,
}

impl TableQuery {
    /// Select all columns of `table`
    #[must_use]
    pub fn from(table: Table) -> Self {
        Self {
            table,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            count: false,
        }
    }

    /// Restrict the column list
    #[must_use]
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Add a condition
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality condition
    #[must_use]
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    /// Add an ordering key
    #[must_use]
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Limit the result to rows `first..=last`
    #[must_use]
    pub const fn range(mut self, first: u64, last: u64) -> Self {
        self.range = Some((first, last));
        self
    }

    /// Limit the result to the first `n` rows
    #[must_use]
    pub const fn limit(self, n: u64) -> Self {
        self.range(0, n.saturating_sub(1))
    }

    /// Request the exact total count alongside the rows
    #[must_use]
    pub const fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// PostgREST query-string pairs for this query
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        pairs.extend(self.filters.iter().map(Filter::to_query_pair));
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect();
            pairs.push(("order".to_string(), order.join(",")));
        }
        pairs
    }
}

/// Rows returned by a select
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Matching rows, after ordering and range
    pub rows: Vec<Value>,
    /// Exact number of matching rows before the range, when requested
    pub total: Option<u64>,
}

impl QueryResult {
    /// Decode every row into `T`
    ///
    /// # Errors
    ///
    /// Returns a serialization error when a row does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        decode_rows(self.rows)
    }

    /// Decode the first row, if any
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the row does not match `T`.
    pub fn first<T: DeserializeOwned>(self) -> Result<Option<T>> {
        self.rows
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }
}

/// Decode JSON rows into `T`
///
/// # Errors
///
/// Returns a serialization error when a row does not match `T`.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Error::from))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_filter_query_pairs() {
        assert_eq!(
            Filter::eq("user_id", "u1").to_query_pair(),
            ("user_id".to_string(), "eq.u1".to_string())
        );
        assert_eq!(
            Filter::eq("is_admin", true).to_query_pair(),
            ("is_admin".to_string(), "eq.true".to_string())
        );
        assert_eq!(
            Filter::in_list("id", ["a", "b,c"]).to_query_pair(),
            ("id".to_string(), "in.(\"a\",\"b,c\")".to_string())
        );
        assert_eq!(
            Filter::ilike("email", "%@example.com").to_query_pair(),
            ("email".to_string(), "ilike.*@example.com".to_string())
        );
        assert_eq!(
            Filter::eq("deleted_at", Value::Null).to_query_pair(),
            ("deleted_at".to_string(), "is.null".to_string())
        );
    }

    #[test]
    fn test_query_pairs_include_order() {
        let query = TableQuery::from(Table::CallsView)
            .eq("organization_slug", "acme")
            .order("date", false)
            .order("id", true)
            .range(10, 19)
            .with_count();

        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("organization_slug".to_string(), "eq.acme".to_string()),
                ("order".to_string(), "date.desc,id.asc".to_string()),
            ]
        );
        assert_eq!(query.range, Some((10, 19)));
        assert!(query.count);
    }

    #[test]
    fn test_filter_matches_rows() {
        let row = json!({"role": "admin", "score": 4, "date": "2024-01-02T10:00:00Z", "email": "Ada@Example.com"});

        assert!(Filter::eq("role", "admin").matches(&row));
        assert!(!Filter::eq("role", "user").matches(&row));
        assert!(Filter::gte("score", 4).matches(&row));
        assert!(!Filter::gte("score", 5).matches(&row));
        assert!(Filter::lt("date", "2024-01-03T00:00:00+00:00").matches(&row));
        assert!(Filter::gte("date", "2024-01-02T00:00:00+00:00").matches(&row));
        assert!(Filter::in_list("role", ["user", "admin"]).matches(&row));
        assert!(Filter::ilike("email", "ada@example.com").matches(&row));
        assert!(Filter::ilike("email", "%@example.%").matches(&row));
        assert!(!Filter::ilike("email", "bob%").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    #[test]
    fn test_ilike_wildcards_and_escapes() {
        let row = json!({"email": "john@example.com"});

        assert!(Filter::ilike("email", "j_hn@example.com").matches(&row));
        assert!(Filter::ilike("email", "%hn@%").matches(&row));
        assert!(!Filter::ilike("email", "j\\_hn@example.com").matches(&row));
        assert!(!Filter::ilike("email", literal_pattern("j_hn@example.com")).matches(&row));
        assert!(Filter::ilike("email", literal_pattern("JOHN@example.com")).matches(&row));
        assert!(!Filter::ilike("email", "john@example.co").matches(&row));
        assert!(!Filter::ilike("email", "_john@example.com").matches(&row));
    }

    #[test]
    fn test_literal_pattern_escapes_wildcards() {
        assert_eq!(literal_pattern("j_hn%50\\x*y"), "j\\_hn\\%50\\\\x_y");
        assert_eq!(
            Filter::ilike("email", literal_pattern("j_hn%@example.com")).to_query_pair(),
            ("email".to_string(), "ilike.j\\_hn\\%@example.com".to_string())
        );
    }

    #[test]
    fn test_limit_maps_to_range() {
        let query = TableQuery::from(Table::Profiles).limit(1);
        assert_eq!(query.range, Some((0, 0)));
    }

    #[test]
    fn test_decode_first() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Row {
            id: String,
        }

        let result = QueryResult {
            rows: vec![json!({"id": "a"}), json!({"id": "b"})],
            total: Some(2),
        };
        assert_eq!(
            result.clone().first::<Row>().unwrap(),
            Some(Row { id: "a".into() })
        );
        assert_eq!(result.decode::<Row>().unwrap().len(), 2);

        let bad = QueryResult {
            rows: vec![json!({"nope": 1})],
            total: None,
        };
        assert!(bad.decode::<Row>().is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(Table::UserOrganizations.to_string(), "user_organizations");
        assert_eq!(RemoteFunction::GetAgentCalls.name(), "get-elevenlabs-calls");
    }
}
