//! Paginated, cached call listings and per-call remote actions

use callscope_core::utils::require_id;
use callscope_core::{
    Call, DateRange, Error, Page, PageRequest, Result, SortColumn, SortDirection, SortState,
};
use callscope_gateway::{CallFilter, CallQueries, DataGateway, RemoteFunction};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Parameters of one call listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallsQuery {
    /// Owning organization; the query is disabled while this is blank
    pub organization_slug: Option<String>,
    /// Inclusive day range on the call date
    pub date_range: Option<DateRange>,
    /// Page number (1-based)
    pub page: u32,
    /// Calls per page
    pub limit: u32,
    /// Column the backend sorts by
    pub sort: SortColumn,
    /// Sort direction
    pub direction: SortDirection,
}

impl CallsQuery {
    /// First page of an organization's calls, newest first
    #[must_use]
    pub fn for_organization(slug: impl Into<String>, limit: u32) -> Self {
        Self {
            organization_slug: Some(slug.into()),
            date_range: None,
            page: 1,
            limit,
            sort: SortColumn::Date,
            direction: SortDirection::Desc,
        }
    }

    /// Restrict to a day range
    #[must_use]
    pub const fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Select a page
    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sort by `state`
    #[must_use]
    pub const fn with_sort(mut self, state: SortState) -> Self {
        self.sort = state.column;
        self.direction = state.direction;
        self
    }

    /// Slug to query, when the query is enabled
    #[must_use]
    pub fn enabled_slug(&self) -> Option<&str> {
        self.organization_slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Loads call pages from the backend and keeps them per query
#[derive(Debug)]
pub struct CallsLoader {
    gateway: Arc<dyn DataGateway>,
    cache: HashMap<CallsQuery, Page<Call>>,
}

impl CallsLoader {
    /// Create a loader with an empty cache
    #[must_use]
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self {
            gateway,
            cache: HashMap::new(),
        }
    }

    /// The page for `query`, from the cache when present
    ///
    /// Returns `Ok(None)` without touching the backend when the query has no
    /// organization.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad page or limit and the backend
    /// error if the fetch fails.
    pub async fn fetch(&mut self, query: &CallsQuery) -> Result<Option<Page<Call>>> {
        if let Some(page) = self.cache.get(query) {
            debug!(page = query.page, "calls page served from cache");
            return Ok(Some(page.clone()));
        }
        self.refetch(query).await
    }

    /// The page for `query`, always from the backend
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad page or limit and the backend
    /// error if the fetch fails.
    #[instrument(skip(self), fields(slug = ?query.organization_slug, page = query.page))]
    pub async fn refetch(&mut self, query: &CallsQuery) -> Result<Option<Page<Call>>> {
        let Some(slug) = query.enabled_slug() else {
            debug!("no organization selected, calls query disabled");
            return Ok(None);
        };
        let request = PageRequest::new(query.page, query.limit)?;

        let filter = CallFilter {
            organization_slug: slug,
            date_range: query.date_range,
        };
        let result = CallQueries::page(
            self.gateway.as_ref(),
            &filter,
            query.sort.column_name(),
            query.direction.is_ascending(),
            request.row_range(),
        )
        .await?;

        let page = Page::new(result.calls, request, result.total_count);
        info!(
            returned = page.items.len(),
            total = page.total_count,
            total_pages = page.total_pages,
            "loaded calls page"
        );
        self.cache.insert(query.clone(), page.clone());
        Ok(Some(page))
    }

    /// Drop every cached page
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Number of cached pages
    #[must_use]
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    /// One call with its transcript
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank id, `NotFound` when the backend
    /// has no such call, and the backend error otherwise.
    pub async fn fetch_call(&self, call_id: &str) -> Result<Call> {
        let call_id = require_id("call_id", call_id)?;
        let response = self
            .gateway
            .invoke(RemoteFunction::GetCall, json!({ "call_id": call_id }))
            .await?;

        let body = match response {
            Value::Object(mut object) if object.contains_key("call") => {
                object.remove("call").unwrap_or(Value::Null)
            }
            other => other,
        };
        if body.is_null() {
            return Err(Error::not_found(format!("call {call_id}")));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// AI summary of a call's transcript
    ///
    /// # Errors
    ///
    /// Returns a validation error when the call has no transcript, and the
    /// backend error if generation fails.
    #[instrument(skip(self, call), fields(call_id = %call.id))]
    pub async fn generate_summary(&self, call: &Call) -> Result<String> {
        let transcript = call
            .transcript_text()
            .ok_or_else(|| Error::validation("transcript", "Call has no transcript to summarize"))?;

        let response = self
            .gateway
            .invoke(
                RemoteFunction::GenerateSummary,
                json!({ "call_id": call.id, "transcript": transcript }),
            )
            .await?;

        response
            .get("summary")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| Error::remote("summary response had no summary field"))
    }
}
