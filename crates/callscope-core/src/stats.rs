//! Client-side statistics over a call list
//!
//! Everything here is a pure reduction: identical input yields identical
//! output, and nothing is cached or updated incrementally.

use crate::types::{Call, DateRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Number of customers reported in [`CallStats::top_customers`]
pub const TOP_CUSTOMER_LIMIT: usize = 5;

/// Derived statistics for a set of calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStats {
    /// Number of calls in the set
    pub total_calls: u64,

    /// Mean duration in seconds, 0 for an empty set
    pub avg_duration: f64,

    /// Mean satisfaction score with missing scores counted as 0
    pub avg_satisfaction: f64,

    /// Calls per calendar date (`YYYY-MM-DD`)
    pub calls_per_day: BTreeMap<String, u64>,

    /// Timestamp of the newest call in the set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Customers with the most calls
    #[serde(default)]
    pub top_customers: Vec<TopCustomer>,
}

/// Call volume of one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    /// Customer display name (or id when unnamed)
    pub name: String,

    /// Number of calls from this customer
    pub call_count: u64,
}

/// Compute totals, averages and the per-day histogram of `calls`
#[must_use]
pub fn calculate_stats(calls: &[Call]) -> CallStats {
    let total_calls = calls.len() as u64;
    if total_calls == 0 {
        return CallStats::default();
    }

    let total_duration: f64 = calls.iter().map(|c| c.duration).sum();
    let total_satisfaction: f64 = calls.iter().map(Call::score_or_zero).sum();
    let count = calls.len() as f64;

    CallStats {
        total_calls,
        avg_duration: total_duration / count,
        avg_satisfaction: total_satisfaction / count,
        calls_per_day: calls_per_day(calls),
        last_updated: calls.iter().map(|c| c.date).max(),
        top_customers: top_customers(calls, TOP_CUSTOMER_LIMIT),
    }
}

/// Count calls per calendar date; dates without calls are absent
#[must_use]
pub fn calls_per_day(calls: &[Call]) -> BTreeMap<String, u64> {
    let mut days = BTreeMap::new();
    for call in calls {
        *days.entry(call.day()).or_insert(0) += 1;
    }
    days
}

/// Count calls per calendar date over `range`, zero-filling empty days
///
/// Calls outside the range are ignored.
#[must_use]
pub fn calls_per_day_in_range(calls: &[Call], range: &DateRange) -> BTreeMap<String, u64> {
    let mut days: BTreeMap<String, u64> = range.days().map(|d| (d.to_string(), 0)).collect();
    for call in calls {
        if range.contains(call.date.date_naive()) {
            *days.entry(call.day()).or_insert(0) += 1;
        }
    }
    days
}

/// Zero-fill an existing per-day histogram over `range`
///
/// Entries outside the range are dropped.
#[must_use]
pub fn zero_fill(counts: &BTreeMap<String, u64>, range: &DateRange) -> BTreeMap<String, u64> {
    range
        .days()
        .map(|d| {
            let key = d.to_string();
            let count = counts.get(&key).copied().unwrap_or(0);
            (key, count)
        })
        .collect()
}

/// Customers ordered by call count (descending), then name (ascending)
#[must_use]
pub fn top_customers(calls: &[Call], limit: usize) -> Vec<TopCustomer> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for call in calls {
        let name = if call.customer_name.trim().is_empty() {
            call.customer_id.as_deref().unwrap_or("unknown")
        } else {
            call.customer_name.as_str()
        };
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut ranked: Vec<TopCustomer> = counts
        .into_iter()
        .map(|(name, call_count)| TopCustomer {
            name: name.to_string(),
            call_count,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.call_count
            .cmp(&a.call_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}
