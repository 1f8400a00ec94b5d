//! Built-in backend for `--offline` runs

use callscope_gateway::{CALLS_PER_DAY_PROCEDURE, MemoryGateway, RemoteFunction, Table};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// User signed in when `--offline` is given without `--user`
pub const DEMO_USER: &str = "demo-admin";

const CUSTOMERS: [(&str, &str); 4] = [
    ("cust-1", "Northwind Traders"),
    ("cust-2", "Contoso Ltd"),
    ("cust-3", "Fabrikam"),
    ("cust-4", "Tailspin Toys"),
];

const AGENTS: [(&str, &str); 3] = [
    ("agent-1", "Riley"),
    ("agent-2", "Sam"),
    ("agent-3", "Jordan"),
];

const TRANSCRIPTS: [&str; 3] = [
    "Customer asked about an invoice discrepancy and the agent issued a corrected copy.",
    "Customer reported a delivery delay; the agent rebooked the shipment for next morning.",
    "Customer wanted to upgrade their plan and the agent walked through the pricing tiers.",
];

/// Gateway seeded with two organizations, a handful of users and January 2024 calls
#[must_use]
pub fn demo_gateway() -> MemoryGateway {
    let calls = demo_calls();

    MemoryGateway::new()
        .with_rows(
            Table::Organizations,
            vec![
                organization("org-acme", "acme", "Acme Support", "2024-01-01T00:00:00Z"),
                organization("org-globex", "globex", "Globex Care", "2024-01-02T00:00:00Z"),
            ],
        )
        .with_rows(
            Table::Profiles,
            vec![
                profile(DEMO_USER, "admin@callscope.test", "Demo Admin"),
                profile("alice", "alice@acme.test", "Alice Moreau"),
                profile("bob", "bob@acme.test", "Bob Lindqvist"),
                profile("carol", "carol@globex.test", "Carol Chen"),
            ],
        )
        .with_rows(
            Table::UserRoles,
            vec![
                json!({"user_id": DEMO_USER, "role": "admin"}),
                json!({"user_id": "alice", "role": "user"}),
            ],
        )
        .with_rows(
            Table::UserOrganizations,
            vec![
                membership("alice", "org-acme", true),
                membership("bob", "org-acme", false),
                membership("carol", "org-globex", true),
            ],
        )
        .with_rows(Table::CallsView, calls.clone())
        .with_function(RemoteFunction::GetCall, {
            let calls = calls.clone();
            move |body| Ok(find_call(&calls, &body))
        })
        .with_function(RemoteFunction::GenerateSummary, |body| {
            Ok(json!({ "summary": summarize(&body) }))
        })
        .with_function(RemoteFunction::GetCustomerStats, {
            let calls = calls.clone();
            move |body| Ok(customer_stats(&calls, &body))
        })
        .with_procedure(CALLS_PER_DAY_PROCEDURE, move |args| {
            Ok(calls_per_day(&calls, &args))
        })
}

fn organization(id: &str, slug: &str, name: &str, created_at: &str) -> Value {
    json!({"id": id, "slug": slug, "name": name, "created_at": created_at})
}

fn profile(id: &str, email: &str, name: &str) -> Value {
    json!({"id": id, "email": email, "full_name": name, "created_at": "2024-01-01T00:00:00Z"})
}

fn membership(user_id: &str, organization_id: &str, is_admin: bool) -> Value {
    json!({
        "user_id": user_id,
        "organization_id": organization_id,
        "is_admin": is_admin,
        "created_at": "2024-01-01T00:00:00Z",
    })
}

fn demo_calls() -> Vec<Value> {
    let customers = CUSTOMERS.iter().cycle();
    let agents = AGENTS.iter().cycle();
    let transcripts = TRANSCRIPTS.iter().cycle();

    (0_u32..36)
        .zip(customers)
        .zip(agents)
        .zip(transcripts)
        .map(|(((n, (customer_id, customer)), (agent_id, agent)), transcript)| {
            let slug = if n % 4 == 3 { "globex" } else { "acme" };
            let day = n / 3 + 1;
            let hour = 9 + n % 8;
            let score = (n % 7 != 0).then_some(f64::from(n % 5 + 1));
            let tags: Vec<&str> = if n % 5 == 0 { vec!["escalated"] } else { Vec::new() };
            json!({
                "id": format!("call-{:03}", n + 1),
                "organization_slug": slug,
                "customer_id": customer_id,
                "customer_name": customer,
                "agent_id": agent_id,
                "agent_name": agent,
                "date": format!("2024-01-{day:02}T{hour:02}:15:00Z"),
                "duration": 45 + (n * 37) % 600,
                "satisfaction_score": score,
                "transcript": transcript,
                "tags": tags,
            })
        })
        .collect()
}

fn find_call(calls: &[Value], body: &Value) -> Value {
    let id = body.get("call_id").and_then(Value::as_str);
    calls
        .iter()
        .find(|call| call.get("id").and_then(Value::as_str) == id)
        .map_or(Value::Null, |call| json!({ "call": call }))
}

fn summarize(body: &Value) -> String {
    let transcript = body
        .get("transcript")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let words: Vec<&str> = transcript.split_whitespace().collect();
    let opening: Vec<&str> = words.iter().take(8).copied().collect();
    format!("{}-word call. {}...", words.len(), opening.join(" "))
}

fn customer_stats(calls: &[Value], body: &Value) -> Value {
    let customer_id = body.get("customer_id").and_then(Value::as_str);
    let matching: Vec<&Value> = calls
        .iter()
        .filter(|call| call.get("customer_id").and_then(Value::as_str) == customer_id)
        .collect();
    if matching.is_empty() {
        return Value::Null;
    }

    let count = matching.len() as f64;
    let total_duration: f64 = matching
        .iter()
        .filter_map(|call| call.get("duration").and_then(Value::as_f64))
        .sum();
    let total_score: f64 = matching
        .iter()
        .filter_map(|call| call.get("satisfaction_score").and_then(Value::as_f64))
        .sum();
    let last_call = matching
        .iter()
        .filter_map(|call| call.get("date").and_then(Value::as_str))
        .max();

    json!({
        "stats": {
            "customerId": customer_id,
            "totalCalls": matching.len(),
            "avgDuration": total_duration / count,
            "avgSatisfaction": total_score / count,
            "lastCall": last_call,
        }
    })
}

fn calls_per_day(calls: &[Value], args: &Value) -> Value {
    let field = |name: &str| args.get(name).and_then(Value::as_str).unwrap_or_default();
    let (slug, start, end) = (field("org_slug"), field("start_date"), field("end_date"));

    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for call in calls {
        if call.get("organization_slug").and_then(Value::as_str) != Some(slug) {
            continue;
        }
        let Some(day) = call
            .get("date")
            .and_then(Value::as_str)
            .and_then(|date| date.get(..10))
        else {
            continue;
        };
        if (start..=end).contains(&day) {
            *counts.entry(day).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(day, count)| json!({ "day": day, "count": count }))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_demo_calls_split_between_organizations() {
        let calls = demo_calls();
        let acme = calls
            .iter()
            .filter(|c| c["organization_slug"] == "acme")
            .count();

        assert_eq!(calls.len(), 36);
        assert_eq!(acme, 27);
        assert_eq!(calls[35]["date"], "2024-01-12T12:15:00Z");
    }

    #[test]
    fn test_calls_per_day_procedure_filters_range() {
        let calls = demo_calls();
        let rows = calls_per_day(
            &calls,
            &json!({"org_slug": "acme", "start_date": "2024-01-01", "end_date": "2024-01-02"}),
        );

        assert_eq!(
            rows,
            json!([{"day": "2024-01-01", "count": 3}, {"day": "2024-01-02", "count": 2}])
        );
    }

    #[test]
    fn test_customer_stats_unknown_customer_is_null() {
        let calls = demo_calls();

        assert_eq!(customer_stats(&calls, &json!({"customer_id": "nobody"})), Value::Null);
        let stats = customer_stats(&calls, &json!({"customer_id": "cust-1"}));
        assert_eq!(stats["stats"]["totalCalls"], 9);
    }
}
