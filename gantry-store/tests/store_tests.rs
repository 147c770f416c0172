//! Integration tests for the SQLite store: CRUD, transaction discipline,
//! duplicate collapse, and the orphan sweep.

use chrono::Utc;
use gantry_core::GantryError;
use gantry_core::middleware::Middleware;
use gantry_core::resource::{Resource, ResourceStatus};
use gantry_core::service::Service;
use gantry_store::cleanup::{CleanupManager, CleanupOptions};
use gantry_store::{Store, relations, resources, settings};
use std::sync::Arc;
use std::time::Duration;

// ── Helpers ───────────────────────────────────────────────────

fn make_resource(id: &str, host: &str, status: ResourceStatus) -> Resource {
    let now = Utc::now();
    Resource {
        id: id.to_string(),
        host: host.to_string(),
        service_id: format!("{id}-svc"),
        org_id: "org-1".to_string(),
        site_id: "site-1".to_string(),
        status,
        entrypoints: "websecure".to_string(),
        tls_domains: String::new(),
        tcp_enabled: false,
        tcp_entrypoints: String::new(),
        tcp_sni_rule: String::new(),
        custom_headers: String::new(),
        router_priority: 100,
        mtls_override: String::new(),
        source_type: "gateway".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn make_middleware(id: &str, name: &str) -> Middleware {
    let now = Utc::now();
    Middleware {
        id: id.to_string(),
        name: name.to_string(),
        kind: "headers".to_string(),
        config: serde_json::json!({"frameDeny": true}),
        created_at: now,
        updated_at: now,
    }
}

fn make_service(id: &str, name: &str) -> Service {
    let now = Utc::now();
    Service {
        id: id.to_string(),
        name: name.to_string(),
        kind: "loadBalancer".to_string(),
        config: serde_json::json!({"servers": [{"url": "http://10.0.0.1:8080"}]}),
        created_at: now,
        updated_at: now,
    }
}

async fn insert_resource(store: &Store, r: &Resource) {
    store
        .with_transaction(async |conn| resources::insert(conn, r).await)
        .await
        .unwrap();
}

// ── Open & migrate ────────────────────────────────────────────

#[tokio::test]
async fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("gantry.db");

    {
        let store = Store::open(&path).await.unwrap();
        store.create_middleware(&make_middleware("mw-1", "persisted")).await.unwrap();
    }

    // second open re-runs migrations (forward-only, idempotent) and sees
    // the previous write
    let store = Store::open(&path).await.unwrap();
    let mw = store.get_middleware("mw-1").await.unwrap();
    assert_eq!(mw.name, "persisted");
}

// ── Middleware CRUD ───────────────────────────────────────────

#[tokio::test]
async fn middleware_create_get_round_trip() {
    let store = Store::open_in_memory().await.unwrap();
    store.create_middleware(&make_middleware("mw-1", "headers-a")).await.unwrap();

    let mw = store.get_middleware("mw-1").await.unwrap();
    assert_eq!(mw.name, "headers-a");
    assert_eq!(mw.kind, "headers");
    assert_eq!(mw.config["frameDeny"], true);
}

#[tokio::test]
async fn middleware_config_survives_storage() {
    let store = Store::open_in_memory().await.unwrap();
    let mut mw = make_middleware("mw-1", "rate");
    mw.kind = "rateLimit".to_string();
    mw.config = serde_json::json!({"average": 100, "burst": 50, "period": "1s"});
    store.create_middleware(&mw).await.unwrap();

    let back = store.get_middleware("mw-1").await.unwrap();
    assert_eq!(back.config, mw.config);
}

#[tokio::test]
async fn middleware_duplicate_name_is_conflict() {
    let store = Store::open_in_memory().await.unwrap();
    store.create_middleware(&make_middleware("mw-1", "same")).await.unwrap();

    let err = store.create_middleware(&make_middleware("mw-2", "same")).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn middleware_get_missing_is_not_found() {
    let store = Store::open_in_memory().await.unwrap();
    let err = store.get_middleware("ghost").await.unwrap_err();
    assert!(matches!(err, GantryError::NotFound(_)));
}

#[tokio::test]
async fn middleware_delete_removes_row() {
    let store = Store::open_in_memory().await.unwrap();
    store.create_middleware(&make_middleware("mw-1", "a")).await.unwrap();
    store.delete_middleware("mw-1").await.unwrap();
    assert!(store.get_middleware("mw-1").await.is_err());
}

// ── Service CRUD ──────────────────────────────────────────────

#[tokio::test]
async fn service_invalid_type_is_validation_error() {
    let store = Store::open_in_memory().await.unwrap();
    let mut svc = make_service("svc-1", "lb");
    svc.kind = "tcpLoadBalancer".to_string();

    let err = store.create_service(&svc).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn service_update_round_trip() {
    let store = Store::open_in_memory().await.unwrap();
    store.create_service(&make_service("svc-1", "lb")).await.unwrap();

    let updated = store
        .update_service("svc-1", "lb2", "weighted", &serde_json::json!({"services": []}))
        .await
        .unwrap();
    assert_eq!(updated.name, "lb2");
    assert_eq!(updated.kind, "weighted");
}

// ── Transactions ──────────────────────────────────────────────

#[tokio::test]
async fn failed_transaction_has_no_partial_effect() {
    let store = Store::open_in_memory().await.unwrap();

    let err = store
        .with_transaction(async |conn| {
            resources::insert(conn, &make_resource("r1", "a.example.com", ResourceStatus::Active))
                .await?;
            Err::<(), _>(GantryError::validation("boom"))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GantryError::Aborted(_)));
    assert!(err.to_string().contains("boom"));
    assert!(store.list_resources().await.unwrap().is_empty());
}

#[tokio::test]
async fn timed_out_transaction_leaves_database_unchanged() {
    let store = Store::open_in_memory().await.unwrap();

    let err = store
        .with_timeout_transaction(Duration::from_millis(50), async |conn| {
            resources::insert(conn, &make_resource("r1", "a.example.com", ResourceStatus::Active))
                .await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("transaction timed out"));
    assert!(store.list_resources().await.unwrap().is_empty());
}

#[tokio::test]
async fn transaction_commit_is_visible() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;
    assert_eq!(store.list_resources().await.unwrap().len(), 1);
}

// ── Override patches ──────────────────────────────────────────

#[tokio::test]
async fn override_patch_updates_only_named_fields() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;

    let patch = resources::ResourceOverridePatch {
        entrypoints: Some("web,websecure".to_string()),
        router_priority: Some(42),
        ..Default::default()
    };
    let updated = store.update_resource_overrides("r1", &patch).await.unwrap();

    assert_eq!(updated.entrypoints, "web,websecure");
    assert_eq!(updated.router_priority, 42);
    assert_eq!(updated.host, "a.example.com");
    assert_eq!(updated.tls_domains, "");
}

#[tokio::test]
async fn override_patch_rejects_negative_priority() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;

    let patch = resources::ResourceOverridePatch {
        router_priority: Some(-1),
        ..Default::default()
    };
    let err = store.update_resource_overrides("r1", &patch).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

// ── Relationship ordering ─────────────────────────────────────

#[tokio::test]
async fn assigned_middlewares_come_back_in_priority_order() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;
    store.create_middleware(&make_middleware("mw-b", "b")).await.unwrap();
    store.create_middleware(&make_middleware("mw-a", "a")).await.unwrap();
    store.assign_middleware("r1", "mw-b", 20).await.unwrap();
    store.assign_middleware("r1", "mw-a", 10).await.unwrap();

    let mut conn = store.pool().acquire().await.unwrap();
    let chain = relations::middlewares_for_resource(&mut conn, "r1").await.unwrap();
    let ids: Vec<&str> = chain.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["mw-a", "mw-b"]);
}

#[tokio::test]
async fn service_assignment_replaces_previous() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;
    store.create_service(&make_service("svc-1", "one")).await.unwrap();
    store.create_service(&make_service("svc-2", "two")).await.unwrap();

    store.assign_service("r1", "svc-1").await.unwrap();
    store.assign_service("r1", "svc-2").await.unwrap();

    let mut conn = store.pool().acquire().await.unwrap();
    let svc = relations::service_for_resource(&mut conn, "r1").await.unwrap().unwrap();
    assert_eq!(svc.id, "svc-2");
}

#[tokio::test]
async fn deleting_resource_cascades_assignments() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;
    store.create_middleware(&make_middleware("mw-a", "a")).await.unwrap();
    store.assign_middleware("r1", "mw-a", 10).await.unwrap();

    store.delete_resource("r1").await.unwrap();

    let mut conn = store.pool().acquire().await.unwrap();
    let rows = relations::all_assignments(&mut conn).await.unwrap();
    assert!(rows.is_empty());
}

// ── Duplicate collapse ────────────────────────────────────────

#[tokio::test]
async fn duplicate_services_collapse_to_suffix_free_winner() {
    let store = Store::open_in_memory().await.unwrap();
    store.create_service(&make_service("svc@file", "svc-file")).await.unwrap();
    store.create_service(&make_service("svc", "svc-plain")).await.unwrap();
    store.create_service(&make_service("other", "other")).await.unwrap();

    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;
    store.assign_service("r1", "svc@file").await.unwrap();

    let manager = CleanupManager::new(store.clone(), CleanupOptions::default());
    let report = manager.sweep().await.unwrap();
    assert_eq!(report.services_removed, 1);

    let mut ids: Vec<String> =
        store.list_services().await.unwrap().into_iter().map(|s| s.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["other", "svc"]);

    // the assignment pointing at the loser is gone
    let mut conn = store.pool().acquire().await.unwrap();
    assert!(relations::service_for_resource(&mut conn, "r1").await.unwrap().is_none());
    assert!(relations::all_service_assignments(&mut conn).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_resources_prefer_auth_router_for_host() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("web-router", "a.example.com", ResourceStatus::Active))
        .await;
    insert_resource(
        &store,
        &make_resource("web-router-auth", "a.example.com", ResourceStatus::Active),
    )
    .await;

    let manager = CleanupManager::new(store.clone(), CleanupOptions::default());
    manager.sweep().await.unwrap();

    let remaining = store.list_resources().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "web-router-auth");
}

#[tokio::test]
async fn all_disabled_group_reactivates_winner_when_recovery_enabled() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r-a", "a.example.com", ResourceStatus::Disabled))
        .await;
    insert_resource(&store, &make_resource("r-b@docker", "a.example.com", ResourceStatus::Disabled))
        .await;

    let opts = CleanupOptions { recover_corrupted: true, ..Default::default() };
    let manager = CleanupManager::new(store.clone(), opts);
    let report = manager.sweep().await.unwrap();
    assert_eq!(report.resources_reactivated, 1);

    let remaining = store.list_resources().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "r-a");
    assert!(remaining[0].is_active());
}

#[tokio::test]
async fn concurrent_sweep_fails_fast() {
    let store = Store::open_in_memory().await.unwrap();
    let manager = Arc::new(CleanupManager::new(store.clone(), CleanupOptions::default()));

    // Hold the pool's only connection so the first sweep blocks after
    // setting its in-progress flag.
    let conn = store.pool().acquire().await.unwrap();
    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.sweep().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = manager.sweep().await.unwrap_err();
    assert!(matches!(err, GantryError::InProgress));

    drop(conn);
    first.await.unwrap().unwrap();
}

// ── Orphan sweep ──────────────────────────────────────────────

#[tokio::test]
async fn orphan_sweep_restores_referential_integrity() {
    let store = Store::open_in_memory().await.unwrap();
    insert_resource(&store, &make_resource("r1", "a.example.com", ResourceStatus::Active)).await;
    store.create_middleware(&make_middleware("mw-a", "a")).await.unwrap();

    // Plant orphans with enforcement off, as a legacy database would have them.
    {
        let mut conn = store.pool().acquire().await.unwrap();
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await.unwrap();
        sqlx::query(
            "INSERT INTO resource_middlewares (resource_id, middleware_id, priority) \
             VALUES ('ghost', 'mw-a', 10), ('r1', 'ghost-mw', 10)",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await.unwrap();
    }

    let manager = CleanupManager::new(store.clone(), CleanupOptions::default());
    let report = manager.sweep().await.unwrap();
    assert_eq!(report.orphans_removed, 2);

    let mut conn = store.pool().acquire().await.unwrap();
    for rm in relations::all_assignments(&mut conn).await.unwrap() {
        assert!(resources::get(&mut conn, &rm.resource_id).await.unwrap().is_some());
    }
}

// ── Template seeding ──────────────────────────────────────────

#[tokio::test]
async fn seeding_inserts_templates_once() {
    let store = Store::open_in_memory().await.unwrap();
    assert_eq!(store.seed_templates().await.unwrap(), 2);
    assert_eq!(store.seed_templates().await.unwrap(), 0);
}

#[tokio::test]
async fn deleted_template_stays_deleted_after_reseed() {
    let store = Store::open_in_memory().await.unwrap();
    store.seed_templates().await.unwrap();
    store.delete_middleware(gantry_store::seed::TEMPLATE_RATE_LIMIT).await.unwrap();

    assert_eq!(store.seed_templates().await.unwrap(), 0);
    assert!(store.get_middleware(gantry_store::seed::TEMPLATE_RATE_LIMIT).await.is_err());

    let mut conn = store.pool().acquire().await.unwrap();
    assert!(
        settings::has_tombstone(&mut conn, gantry_store::seed::TEMPLATE_RATE_LIMIT, "middleware")
            .await
            .unwrap()
    );
}

// ── Singletons ────────────────────────────────────────────────

#[tokio::test]
async fn mtls_singleton_upserts_on_id_one() {
    let store = Store::open_in_memory().await.unwrap();

    let initial = store.get_mtls_config().await.unwrap();
    assert!(!initial.enabled);

    store
        .put_mtls_config(true, &serde_json::json!({"clientAuth": {"clientAuthType": "RequireAndVerifyClientCert"}}))
        .await
        .unwrap();
    store.put_mtls_config(false, &serde_json::json!({})).await.unwrap();

    let current = store.get_mtls_config().await.unwrap();
    assert_eq!(current.id, 1);
    assert!(!current.enabled);
}
