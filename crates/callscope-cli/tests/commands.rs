//! End-to-end command runs against the demo backend

#![allow(clippy::unwrap_used, clippy::panic)]

use callscope_cli::demo::{DEMO_USER, demo_gateway};
use callscope_cli::{App, Cli};
use callscope_core::Config;
use callscope_session::{CURRENT_ORGANIZATION_KEY, DurableStore, FileStore, RecordingNotifier};
use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<FileStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        Self { _dir: dir, store }
    }

    /// Run one command line against a fresh demo backend sharing this store
    async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("callscope").chain(args.iter().copied()))
            .unwrap();
        let mut app = App::new(
            Config::default(),
            Arc::new(demo_gateway()),
            self.store.clone(),
            Arc::new(RecordingNotifier::new()),
            Some(cli.user.clone().unwrap_or_else(|| DEMO_USER.to_string())),
            cli.format,
        );
        app.run(cli.command).await
    }
}

#[tokio::test]
async fn test_orgs_list_marks_current() {
    let harness = Harness::new();

    let out = harness.run(&["orgs", "list"]).await.unwrap();
    assert!(out.contains("acme"));
    assert!(out.contains("globex"));
    assert!(out.lines().any(|line| line.starts_with('*')));
}

#[tokio::test]
async fn test_switch_persists_between_runs() {
    let harness = Harness::new();

    let out = harness.run(&["orgs", "switch", "org-globex"]).await.unwrap();
    assert_eq!(out, "Switched to Globex Care (globex)");
    assert_eq!(
        harness.store.get(CURRENT_ORGANIZATION_KEY).unwrap().as_deref(),
        Some("org-globex")
    );

    let json = harness.run(&["calls", "--format", "json"]).await.unwrap();
    let page: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(page["totalCount"], 9);
    assert!(
        page["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|call| call["id"].as_str().is_some())
    );
}

#[tokio::test]
async fn test_switch_to_invisible_organization_fails() {
    let harness = Harness::new();

    let err = harness
        .run(&["orgs", "switch", "org-globex", "--user", "bob"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not visible"));
}

#[tokio::test]
async fn test_calls_pagination() {
    let harness = Harness::new();
    harness.run(&["orgs", "switch", "org-acme"]).await.unwrap();

    let out = harness
        .run(&["calls", "--page", "3", "--limit", "10"])
        .await
        .unwrap();
    assert!(out.ends_with("Page 3 of 3 (27 calls)\nprevious: --page 2"));

    let beyond = harness
        .run(&["calls", "--page", "9", "--limit", "10"])
        .await
        .unwrap();
    assert!(beyond.contains("past the last page"));
}

#[tokio::test]
async fn test_stats_and_daily_counts() {
    let harness = Harness::new();
    harness.run(&["orgs", "switch", "org-acme"]).await.unwrap();

    let json = harness
        .run(&["stats", "--from", "2024-01-01", "--to", "2024-01-02", "-f", "json"])
        .await
        .unwrap();
    let stats: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(stats["totalCalls"], 5);
    assert_eq!(stats["callsPerDay"]["2024-01-02"], 2);

    let daily = harness
        .run(&["stats", "--from", "2024-01-01", "--to", "2024-01-03", "--daily"])
        .await
        .unwrap();
    assert!(daily.contains("2024-01-03  2"));

    let customer = harness
        .run(&["stats", "--customer", "cust-1"])
        .await
        .unwrap();
    assert!(customer.contains("Total calls       9"));
}

#[tokio::test]
async fn test_access_reports_permissions() {
    let harness = Harness::new();

    let admin = harness.run(&["access", "org-acme", "--user", "alice"]).await.unwrap();
    assert!(admin.starts_with("alice has admin access to org-acme"));

    let member = harness.run(&["access", "org-acme", "--user", "bob"]).await.unwrap();
    assert!(member.starts_with("bob does not have admin access"));
}

#[tokio::test]
async fn test_call_with_summary() {
    let harness = Harness::new();

    let out = harness
        .run(&["call", "call-002", "--summarize"])
        .await
        .unwrap();
    assert!(out.starts_with("Call      call-002"));
    assert!(out.contains("Summary: 13-word call."));

    assert!(harness.run(&["call", "call-999"]).await.is_err());
}

#[tokio::test]
async fn test_users_and_invites() {
    let harness = Harness::new();

    let roster = harness.run(&["users", "--org", "org-acme"]).await.unwrap();
    assert!(roster.contains("alice@acme.test"));
    assert!(!roster.contains("carol@globex.test"));

    let everyone = harness.run(&["users", "--all"]).await.unwrap();
    assert_eq!(everyone.lines().count(), 5);

    let promoted = harness
        .run(&["users", "--org", "org-acme", "promote", "bob"])
        .await
        .unwrap();
    let bob = promoted.lines().find(|l| l.starts_with("bob")).unwrap();
    assert!(bob.contains("admin"));

    let invite = harness
        .run(&["invite", "new@acme.test", "--org", "org-acme", "--role", "admin"])
        .await
        .unwrap();
    assert!(invite.starts_with("Invited new@acme.test as admin"));

    let rejected = harness
        .run(&["users", "--org", "org-acme", "demote", "nobody"])
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
async fn test_accept_unknown_token_fails() {
    let harness = Harness::new();

    let err = harness.run(&["accept", "no-such-token"]).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_config_show_redacts_keys() {
    let harness = Harness::new();

    assert_eq!(
        harness.run(&["config"]).await.unwrap(),
        "Configuration is valid"
    );
    let shown = harness.run(&["config", "--show"]).await.unwrap();
    assert!(shown.contains("[backend]"));
    assert!(shown.contains("page_size = 10"));
}
