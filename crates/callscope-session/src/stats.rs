//! Statistics backed by remote call data

use crate::notify::Notifier;
use callscope_core::stats::zero_fill;
use callscope_core::utils::require_id;
use callscope_core::{
    CallStats, DateRange, Error, Result, calculate_stats, calls_per_day_in_range,
};
use callscope_gateway::{
    CALLS_PER_DAY_PROCEDURE, CallFilter, CallQueries, DataGateway, RemoteFunction,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Aggregates reported by the backend for one customer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerStats {
    /// Customer the numbers describe
    #[serde(default, alias = "customerId")]
    pub customer_id: String,

    /// Number of calls
    #[serde(default, alias = "totalCalls")]
    pub total_calls: u64,

    /// Mean duration in seconds
    #[serde(default, alias = "avgDuration")]
    pub avg_duration: f64,

    /// Mean satisfaction score
    #[serde(default, alias = "avgSatisfaction")]
    pub avg_satisfaction: f64,

    /// Most recent call
    #[serde(default, alias = "lastCall")]
    pub last_call: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct DayCount {
    #[serde(alias = "date")]
    day: String,
    count: u64,
}

/// Loads call data for an organization and aggregates it
#[derive(Debug)]
pub struct StatsLoader {
    gateway: Arc<dyn DataGateway>,
    notifier: Arc<dyn Notifier>,
}

impl StatsLoader {
    /// Create a loader
    #[must_use]
    pub fn new(gateway: Arc<dyn DataGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self { gateway, notifier }
    }

    /// Statistics over every call of an organization, optionally within `range`
    ///
    /// With a range, the per-day histogram covers every day of it. Failures
    /// yield empty statistics and an error notification.
    #[instrument(skip(self))]
    pub async fn load_stats(&self, organization_slug: &str, range: Option<DateRange>) -> CallStats {
        match self.fetch_stats(organization_slug, range).await {
            Ok(stats) => {
                info!(total_calls = stats.total_calls, "computed call statistics");
                stats
            }
            Err(e) => {
                error!(error = %e, "failed to load call statistics");
                self.notifier.error("Error loading statistics", &e.to_string());
                range.map_or_else(CallStats::default, |range| CallStats {
                    calls_per_day: calls_per_day_in_range(&[], &range),
                    ..CallStats::default()
                })
            }
        }
    }

    /// Per-day call counts computed by the backend, zero-filled over `range`
    ///
    /// Failures yield an all-zero histogram and an error notification.
    #[instrument(skip(self))]
    pub async fn calls_per_day(
        &self,
        organization_slug: &str,
        range: DateRange,
    ) -> BTreeMap<String, u64> {
        match self.fetch_calls_per_day(organization_slug, &range).await {
            Ok(counts) => zero_fill(&counts, &range),
            Err(e) => {
                error!(error = %e, "failed to load calls per day");
                self.notifier.error("Error loading call volume", &e.to_string());
                zero_fill(&BTreeMap::new(), &range)
            }
        }
    }

    /// Backend aggregates for one customer
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank id and the backend error if the
    /// function call fails.
    pub async fn customer_stats(&self, customer_id: &str) -> Result<CustomerStats> {
        let customer_id = require_id("customer_id", customer_id)?;
        let response = self
            .gateway
            .invoke(
                RemoteFunction::GetCustomerStats,
                json!({ "customer_id": customer_id }),
            )
            .await?;

        let mut stats: CustomerStats = match response {
            Value::Object(mut object) if object.contains_key("stats") => {
                serde_json::from_value(object.remove("stats").unwrap_or(Value::Null))?
            }
            Value::Null => return Err(Error::not_found(format!("customer {customer_id}"))),
            other => serde_json::from_value(other)?,
        };
        if stats.customer_id.is_empty() {
            stats.customer_id = customer_id.to_string();
        }
        Ok(stats)
    }

    async fn fetch_stats(
        &self,
        organization_slug: &str,
        range: Option<DateRange>,
    ) -> Result<CallStats> {
        let slug = require_id("organization_slug", organization_slug)?;
        let filter = CallFilter {
            organization_slug: slug,
            date_range: range,
        };
        let calls = CallQueries::list(self.gateway.as_ref(), &filter).await?;

        let mut stats = calculate_stats(&calls);
        if let Some(range) = range {
            stats.calls_per_day = calls_per_day_in_range(&calls, &range);
        }
        Ok(stats)
    }

    async fn fetch_calls_per_day(
        &self,
        organization_slug: &str,
        range: &DateRange,
    ) -> Result<BTreeMap<String, u64>> {
        let slug = require_id("organization_slug", organization_slug)?;
        let response = self
            .gateway
            .rpc(
                CALLS_PER_DAY_PROCEDURE,
                json!({
                    "org_slug": slug,
                    "start_date": range.start().to_string(),
                    "end_date": range.end().to_string(),
                }),
            )
            .await?;

        let rows: Vec<DayCount> = match response {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other)?,
        };
        let mut counts = BTreeMap::new();
        for row in rows {
            let day = row.day.get(..10).unwrap_or(&row.day).to_string();
            *counts.entry(day).or_insert(0) += row.count;
        }
        Ok(counts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use callscope_gateway::{MemoryGateway, Table};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, start).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, end).unwrap(),
        )
        .unwrap()
    }

    fn gateway() -> MemoryGateway {
        MemoryGateway::new().with_rows(
            Table::CallsView,
            vec![
                json!({"id": "a", "organization_slug": "acme", "customer_name": "Ada", "date": "2024-01-01T08:00:00Z", "duration": 60, "satisfaction_score": 4}),
                json!({"id": "b", "organization_slug": "acme", "customer_name": "Ada", "date": "2024-01-01T09:00:00Z", "duration": 120, "satisfaction_score": null}),
                json!({"id": "c", "organization_slug": "acme", "customer_name": "Bob", "date": "2024-01-03T09:00:00Z", "duration": 30, "satisfaction_score": 5}),
                json!({"id": "d", "organization_slug": "other", "customer_name": "Eve", "date": "2024-01-02T09:00:00Z", "duration": 999}),
            ],
        )
    }

    #[tokio::test]
    async fn test_load_stats_aggregates_organization_calls() {
        let loader = StatsLoader::new(Arc::new(gateway()), Arc::new(RecordingNotifier::new()));

        let stats = loader.load_stats("acme", None).await;
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.avg_duration, 70.0);
        assert_eq!(stats.avg_satisfaction, 3.0);
        assert_eq!(stats.calls_per_day.len(), 2);
        assert_eq!(stats.top_customers[0].name, "Ada");
    }

    #[tokio::test]
    async fn test_load_stats_zero_fills_range() {
        let loader = StatsLoader::new(Arc::new(gateway()), Arc::new(RecordingNotifier::new()));

        let stats = loader.load_stats("acme", Some(range(1, 2))).await;
        assert_eq!(stats.total_calls, 2);
        assert_eq!(
            stats.calls_per_day,
            BTreeMap::from([("2024-01-01".to_string(), 2), ("2024-01-02".to_string(), 0)])
        );
    }

    #[tokio::test]
    async fn test_load_stats_counts_every_row_under_a_row_cap() {
        let loader = StatsLoader::new(
            Arc::new(gateway().with_max_rows(1)),
            Arc::new(RecordingNotifier::new()),
        );

        let stats = loader.load_stats("acme", None).await;
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.avg_duration, 70.0);
    }

    #[tokio::test]
    async fn test_load_stats_failure_is_empty_and_notified() {
        let gateway = gateway();
        gateway.fail_table(Table::CallsView, "timeout");
        let notifier = Arc::new(RecordingNotifier::new());
        let loader = StatsLoader::new(Arc::new(gateway), notifier.clone());

        let stats = loader.load_stats("acme", None).await;
        assert_eq!(stats, CallStats::default());
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_calls_per_day_from_procedure() {
        let gateway = MemoryGateway::new().with_procedure(CALLS_PER_DAY_PROCEDURE, |args| {
            assert_eq!(args["org_slug"], "acme");
            Ok(json!([
                {"day": "2024-01-02", "count": 4},
                {"date": "2024-01-04T00:00:00+00:00", "count": 1}
            ]))
        });
        let loader = StatsLoader::new(Arc::new(gateway), Arc::new(RecordingNotifier::new()));

        let counts = loader.calls_per_day("acme", range(1, 4)).await;
        let values: Vec<u64> = counts.values().copied().collect();
        assert_eq!(values, vec![0, 4, 0, 1]);
    }

    #[tokio::test]
    async fn test_calls_per_day_failure_is_zero_filled() {
        let gateway = MemoryGateway::new();
        gateway.fail_procedure(CALLS_PER_DAY_PROCEDURE, "boom");
        let notifier = Arc::new(RecordingNotifier::new());
        let loader = StatsLoader::new(Arc::new(gateway), notifier.clone());

        let counts = loader.calls_per_day("acme", range(1, 3)).await;
        assert_eq!(counts.values().sum::<u64>(), 0);
        assert_eq!(counts.len(), 3);
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_customer_stats() {
        let gateway = MemoryGateway::new().with_function(RemoteFunction::GetCustomerStats, |_| {
            Ok(json!({"stats": {"totalCalls": 7, "avgDuration": 42.5}}))
        });
        let loader = StatsLoader::new(Arc::new(gateway), Arc::new(RecordingNotifier::new()));

        let stats = loader.customer_stats("cust-1").await.unwrap();
        assert_eq!(stats.customer_id, "cust-1");
        assert_eq!(stats.total_calls, 7);
        assert_eq!(stats.avg_duration, 42.5);
        assert!(loader.customer_stats("").await.is_err());
    }
}
