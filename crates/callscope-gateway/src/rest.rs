//! HTTP gateway for a PostgREST-style hosted backend

use crate::gateway::DataGateway;
use crate::query::{Filter, QueryResult, RemoteFunction, Table, TableQuery};
use async_trait::async_trait;
use callscope_core::config::BackendConfig;
use callscope_core::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Gateway speaking the hosted backend's REST, function and auth endpoints
#[derive(Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl RestGateway {
    /// Create a gateway for `base_url` authenticated with the public `anon_key`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: None,
            timeout,
        })
    }

    /// Create a gateway from backend configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let gateway = Self::new(&config.url, &config.anon_key, config.timeout())?;
        Ok(match &config.access_token {
            Some(token) => gateway.with_access_token(token),
            None => gateway,
        })
    }

    /// Act on behalf of a signed-in user
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e, operation))?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "backend responded");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        warn!(operation, status = status.as_u16(), %message, "backend rejected request");
        Err(Error::remote_status(status.as_u16(), message))
    }

    fn transport_error(&self, error: &reqwest::Error, operation: &str) -> Error {
        if error.is_timeout() {
            warn!(operation, "backend request timed out");
            return Error::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            };
        }
        warn!(operation, error = %error, "backend request failed");
        Error::remote(format!("{operation}: {error}"))
    }
}

impl fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.access_token.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error", "msg"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(ToString::to_string)
}

/// Total row count from a `Content-Range: 0-9/23` header
fn content_range_total(response: &Response) -> Option<u64> {
    let header = response.headers().get("content-range")?.to_str().ok()?;
    parse_content_range(header)
}

fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

async fn json_body(response: Response) -> Result<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| Error::remote(format!("failed to read response body: {e}")))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_query_pair).collect()
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn select(&self, query: &TableQuery) -> Result<QueryResult> {
        let mut request = self
            .client
            .get(self.table_url(query.table))
            .query(&query.to_query_pairs());

        if let Some((first, last)) = query.range {
            request = request
                .header("Range-Unit", "items")
                .header("Range", format!("{first}-{last}"));
        }
        if query.count {
            request = request.header("Prefer", "count=exact");
        }

        let operation = format!("select {}", query.table);
        let response = self.send(request, &operation).await?;
        let total = if query.count {
            content_range_total(&response)
        } else {
            None
        };
        let rows = into_rows(json_body(response).await?);

        Ok(QueryResult { rows, total })
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);

        let response = self.send(request, &format!("insert {table}")).await?;
        into_rows(json_body(response).await?)
            .into_iter()
            .next()
            .ok_or_else(|| Error::remote(format!("insert into {table} returned no row")))
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation")
            .json(&patch);

        let response = self.send(request, &format!("update {table}")).await?;
        Ok(into_rows(json_body(response).await?))
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation");

        let response = self.send(request, &format!("delete {table}")).await?;
        let removed = into_rows(json_body(response).await?).len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn invoke(&self, function: RemoteFunction, body: Value) -> Result<Value> {
        let url = format!("{}/functions/v1/{}", self.base_url, function.name());
        let request = self.client.post(url).json(&body);

        let response = self.send(request, &format!("invoke {function}")).await?;
        json_body(response).await
    }

    async fn rpc(&self, procedure: &str, args: Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{procedure}", self.base_url);
        let request = self.client.post(url).json(&args);

        let response = self.send(request, &format!("rpc {procedure}")).await?;
        json_body(response).await
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let url = format!("{}/auth/v1/recover", self.base_url);
        let request = self.client.post(url).json(&json!({ "email": email }));

        self.send(request, "password reset").await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-9/23"), Some(23));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"message":"duplicate key","code":"23505"}"#),
            Some("duplicate key".to_string())
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"bad token"}"#),
            Some("bad token".to_string())
        );
        assert_eq!(error_message("not json"), None);
    }

    #[test]
    fn test_into_rows_normalizes_shapes() {
        assert_eq!(into_rows(Value::Null).len(), 0);
        assert_eq!(into_rows(json!({"id": 1})).len(), 1);
        assert_eq!(into_rows(json!([{"id": 1}, {"id": 2}])).len(), 2);
    }

    #[test]
    fn test_debug_hides_keys() {
        let gateway = RestGateway::new("http://localhost:54321/", "secret-key", Duration::from_secs(5))
            .map(|g| g.with_access_token("jwt"));
        let rendered = format!("{gateway:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("authenticated: true"));
        assert!(rendered.contains("http://localhost:54321"));
    }
}
