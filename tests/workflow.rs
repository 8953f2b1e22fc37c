//! Integration tests for the common provisioning workflow.
//!
//! Tenants are synced, users are provisioned, state is written to disk and
//! reloaded, and a repeat of the whole run changes nothing.

use campus::prelude::*;
use campus::{MemoryBackend, Tally};
use serde_json::json;

fn tenants() -> Vec<serde_json::Value> {
    vec![
        json!({
            "schema_name": "dps_kolkata",
            "name": "Delhi Public School Kolkata",
            "domain": "dpskolkata.localhost",
            "status": "active",
            "plan": "premium"
        }),
        json!({
            "schema_name": "kendriya",
            "name": "Kendriya Vidyalaya Delhi 1",
            "domain": "kvd1delhi.localhost",
            "status": "trial"
        }),
    ]
}

fn staff() -> Vec<UserDescriptor> {
    vec![
        UserDescriptor::new("principal@dps.edu", "principal-pass", UserRole::SuperAdmin)
            .with_names("Asha", "Roy"),
        UserDescriptor::new("office@dps.edu", "office-pass", UserRole::Staff),
    ]
}

#[tokio::test]
async fn test_full_run_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");

    let backend = MemoryBackend::load(&state).unwrap();
    let tenancy = Tenancy::in_memory(&backend, TenancyConfig::default());

    let report = tenancy.reconciler().sync_values(tenants()).await.unwrap();
    assert_eq!(report.tally.created, 2);

    let users = tenancy.users().sync_users("dps_kolkata", staff()).await.unwrap();
    assert_eq!(users.tally.created, 2);
    backend.save(&state).unwrap();

    // Fresh process: reload and repeat everything
    let backend = MemoryBackend::load(&state).unwrap();
    let tenancy = Tenancy::in_memory(&backend, TenancyConfig::default());

    let report = tenancy.reconciler().sync_values(tenants()).await.unwrap();
    assert_eq!(
        report.tally,
        Tally {
            created: 0,
            updated: 0,
            unchanged: 2,
            failed: 0
        }
    );

    let users = tenancy.users().sync_users("dps_kolkata", staff()).await.unwrap();
    assert_eq!(users.tally.unchanged, 2);

    let listed = tenancy.users().list("dps_kolkata").await.unwrap();
    let principal = listed
        .iter()
        .find(|u| u.email == "principal@dps.edu")
        .unwrap();
    assert_eq!(principal.full_name(), "Asha Roy");
    assert!(tenancy.users().list("kendriya").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_after_sync() {
    let backend = MemoryBackend::new();
    let tenancy = Tenancy::in_memory(&backend, TenancyConfig::default());
    tenancy.reconciler().sync_values(tenants()).await.unwrap();

    let tenant = tenancy.resolver().resolve("KVD1Delhi.localhost:8000").await.unwrap();
    assert_eq!(tenant.schema_name, "kendriya");
    assert_eq!(tenancy.switcher().current_schema(), "public");
}
