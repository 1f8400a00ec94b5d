//! Rendering of command results

use crate::cli::OutputFormat;
use callscope_core::utils::iso_date;
use callscope_core::{
    Call, CallStats, Membership, Organization, OrganizationInvitation, OrganizationUser, Page,
};
use callscope_session::{CustomerStats, Permissions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Render `value` as pretty JSON, or as a table through `table`
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render<T, F>(format: OutputFormat, value: &T, table: F) -> anyhow::Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => Ok(table(value)),
    }
}

/// Plain-text table with left-aligned columns
#[must_use]
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// Organizations with the current one marked
#[must_use]
pub fn organizations(organizations: &[Organization], current: Option<&str>) -> String {
    if organizations.is_empty() {
        return "No organizations".to_string();
    }
    let rows: Vec<Vec<String>> = organizations
        .iter()
        .map(|o| {
            vec![
                if current == Some(o.id.as_str()) { "*" } else { "" }.to_string(),
                o.id.clone(),
                o.slug.clone(),
                o.name.clone(),
                iso_date(o.created_at),
            ]
        })
        .collect();
    table(&["", "ID", "SLUG", "NAME", "CREATED"], &rows)
}

/// One page of calls with its position
#[must_use]
pub fn calls_page(page: &Page<Call>) -> String {
    let rows: Vec<Vec<String>> = page
        .items
        .iter()
        .map(|c| {
            vec![
                c.id.clone(),
                c.date.format("%Y-%m-%d %H:%M").to_string(),
                c.customer_name.clone(),
                c.agent_name.clone(),
                format!("{:.0}s", c.duration),
                c.satisfaction_score
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.1}")),
            ]
        })
        .collect();

    let mut out = table(
        &["ID", "DATE", "CUSTOMER", "AGENT", "DURATION", "SCORE"],
        &rows,
    );
    let _ = write!(
        out,
        "\n\nPage {} of {} ({} calls)",
        page.page, page.total_pages, page.total_count
    );
    if page.is_past_end() {
        out.push_str("\nThis page is past the last page");
        return out;
    }

    let request = page.request();
    let mut hints = Vec::new();
    if request.has_prev() {
        hints.push(format!("previous: --page {}", page.page - 1));
    }
    if request.has_next(page.total_count) {
        hints.push(format!("next: --page {}", page.page + 1));
    }
    if !hints.is_empty() {
        let _ = write!(out, "\n{}", hints.join(", "));
    }
    out
}

/// Full detail of one call
#[must_use]
pub fn call_detail(call: &Call, summary: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Call      {}", call.id);
    let _ = writeln!(out, "Date      {}", call.date.to_rfc3339());
    let _ = writeln!(out, "Customer  {}", call.customer_name);
    let _ = writeln!(out, "Agent     {}", call.agent_name);
    let _ = writeln!(out, "Duration  {:.0}s", call.duration);
    if let Some(score) = call.satisfaction_score {
        let _ = writeln!(out, "Score     {score:.1}");
    }
    if !call.tags.is_empty() {
        let tags: Vec<&str> = call.tags.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Tags      {}", tags.join(", "));
    }
    if let Some(transcript) = call.transcript_text() {
        let _ = write!(out, "\n{transcript}\n");
    }
    if let Some(summary) = summary {
        let _ = write!(out, "\nSummary: {summary}\n");
    }
    out.trim_end().to_string()
}

/// Totals, averages, the daily histogram and top customers
#[must_use]
pub fn stats(stats: &CallStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total calls       {}", stats.total_calls);
    let _ = writeln!(out, "Avg duration      {:.1}s", stats.avg_duration);
    let _ = writeln!(out, "Avg satisfaction  {:.2}", stats.avg_satisfaction);
    if let Some(last) = stats.last_updated {
        let _ = writeln!(out, "Last call         {}", last.to_rfc3339());
    }

    if !stats.calls_per_day.is_empty() {
        out.push('\n');
        out.push_str(&histogram(&stats.calls_per_day));
        out.push('\n');
    }

    if !stats.top_customers.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<String>> = stats
            .top_customers
            .iter()
            .map(|c| vec![c.name.clone(), c.call_count.to_string()])
            .collect();
        out.push_str(&table(&["CUSTOMER", "CALLS"], &rows));
    }
    out.trim_end().to_string()
}

/// Per-day counts with a bar per day
#[must_use]
pub fn histogram(counts: &BTreeMap<String, u64>) -> String {
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|(day, count)| {
            let bar = "#".repeat(usize::try_from(*count).unwrap_or(usize::MAX).min(60));
            vec![day.clone(), count.to_string(), bar]
        })
        .collect();
    table(&["DAY", "CALLS", ""], &rows)
}

/// Backend aggregates of one customer
#[must_use]
pub fn customer_stats(stats: &CustomerStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Customer          {}", stats.customer_id);
    let _ = writeln!(out, "Total calls       {}", stats.total_calls);
    let _ = writeln!(out, "Avg duration      {:.1}s", stats.avg_duration);
    let _ = writeln!(out, "Avg satisfaction  {:.2}", stats.avg_satisfaction);
    if let Some(last) = stats.last_call {
        let _ = writeln!(out, "Last call         {}", last.to_rfc3339());
    }
    out.trim_end().to_string()
}

/// Roster entries, pending invitations flagged
#[must_use]
pub fn users(users: &[OrganizationUser]) -> String {
    if users.is_empty() {
        return "No users".to_string();
    }
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                u.id.clone(),
                u.name.clone(),
                u.email.clone(),
                u.role.to_string(),
                if u.is_pending { "invited" } else { "active" }.to_string(),
            ]
        })
        .collect();
    table(&["ID", "NAME", "EMAIL", "ROLE", "STATUS"], &rows)
}

/// A newly created or renewed invitation
#[must_use]
pub fn invitation(invitation: &OrganizationInvitation) -> String {
    format!(
        "Invited {} as {} (expires {})\nToken: {}",
        invitation.email,
        invitation.role,
        iso_date(invitation.expires_at),
        invitation.token
    )
}

/// A membership created by accepting an invitation
#[must_use]
pub fn membership(membership: &Membership) -> String {
    format!(
        "Joined organization {} as {}",
        membership.organization_id,
        callscope_core::Role::from_admin_flag(membership.is_admin)
    )
}

/// Admin rights of a user on an organization
#[must_use]
pub fn access(
    user_id: &str,
    organization_id: &str,
    granted: bool,
    current: Option<Permissions>,
) -> String {
    let mut out = format!(
        "{user_id} {} admin access to {organization_id}",
        if granted { "has" } else { "does not have" }
    );
    if let Some(permissions) = current {
        let _ = write!(
            out,
            "\nSuper-admin: {}\nOrganization admin: {}",
            yes_no(permissions.is_super_admin),
            yes_no(permissions.is_org_admin)
        );
    }
    out
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_aligns_columns() {
        let rows = vec![
            vec!["1".to_string(), "Acme Support".to_string()],
            vec!["22".to_string(), "Globex".to_string()],
        ];

        assert_eq!(
            table(&["ID", "NAME"], &rows),
            "ID  NAME\n1   Acme Support\n22  Globex"
        );
    }

    #[test]
    fn test_histogram_bars() {
        let counts = BTreeMap::from([("2024-01-01".to_string(), 3), ("2024-01-02".to_string(), 0)]);

        assert_eq!(
            histogram(&counts),
            "DAY         CALLS\n2024-01-01  3      ###\n2024-01-02  0"
        );
    }

    #[test]
    fn test_calls_page_navigation_hints() {
        let request = callscope_core::PageRequest::new(2, 5).unwrap();

        let middle = calls_page(&Page::new(Vec::new(), request, 12));
        assert!(middle.ends_with("Page 2 of 3 (12 calls)\nprevious: --page 1, next: --page 3"));

        let single = calls_page(&Page::new(Vec::new(), callscope_core::PageRequest::default(), 4));
        assert!(single.ends_with("Page 1 of 1 (4 calls)"));
    }

    #[test]
    fn test_json_rendering_ignores_table() {
        let stats = CallStats::default();
        let json = render(OutputFormat::Json, &stats, |_| unreachable!()).unwrap();

        assert!(json.contains("\"totalCalls\": 0"));
    }
}
