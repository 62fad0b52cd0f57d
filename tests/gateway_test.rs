// ABOUTME: End-to-end integration tests for the project gateway
// ABOUTME: Exercises provisioning, execution policy, history recording, and lifecycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use querybase::database::{Database, HistoryFilter, HistoryRecorder};
use querybase::errors::AppError;
use querybase::models::QueryType;
use querybase::provisioning::{DatabaseScheme, DbCredentials, HostInfo};
use querybase::rate_limiting::LimiterClass;
use querybase::tenant_db::TenantDatabase;
use uuid::Uuid;

#[tokio::test]
async fn provision_query_and_audit_lifecycle() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();

    let project = gateway.create_project(&user, "shop", None).await.unwrap();
    assert!(project.active);
    assert!(project.database_name.starts_with("shop_"));

    // A newly provisioned database has no tables
    let schema = gateway.get_schema(&user, project.id).await.unwrap();
    assert!(schema.is_empty());

    let ddl = gateway
        .run_query(
            &user,
            project.id,
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            None,
        )
        .await
        .unwrap();
    assert_eq!(ddl.query_type, QueryType::Ddl);

    let schema = gateway.get_schema(&user, project.id).await.unwrap();
    assert_eq!(schema.len(), 1);
    assert_eq!(schema[0].name, "items");

    let select = gateway
        .run_query(&user, project.id, "SELECT * FROM items", None)
        .await
        .unwrap();
    assert_eq!(select.query_type, QueryType::Select);
    assert!(select.rows.is_empty());
    assert_eq!(select.row_count, 0);

    // Destructive statements are rejected before reaching the database,
    // and the attempt is still audited
    let err = gateway
        .run_query(&user, project.id, "DROP TABLE items", None)
        .await
        .unwrap_err();
    assert!(err.is_dangerous_operation(), "unexpected error: {err}");
    let schema = gateway.get_schema(&user, project.id).await.unwrap();
    assert_eq!(schema.len(), 1, "rejected DROP must not touch the database");

    let page = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 50, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 3);

    // Newest first: the rejected DROP leads the page
    let newest = &page.items[0];
    assert_eq!(newest.query_text, "DROP TABLE items");
    assert!(!newest.success);
    assert!(newest.error_message.is_some());
    assert!(page.items[1].success);
    assert!(page.items[2].success);

    gateway.shutdown().await;
}

#[tokio::test]
async fn insert_reports_affected_rows() -> anyhow::Result<()> {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = gateway.create_project(&user, "inventory", None).await?;

    gateway
        .run_query(
            &user,
            project.id,
            "CREATE TABLE parts (id INTEGER PRIMARY KEY, label TEXT)",
            None,
        )
        .await?;
    let insert = gateway
        .run_query(
            &user,
            project.id,
            "INSERT INTO parts (label) VALUES ('bolt'), ('nut'), ('washer')",
            None,
        )
        .await?;
    assert_eq!(insert.query_type, QueryType::Insert);
    assert_eq!(insert.row_count, 3);

    let select = gateway
        .run_query(&user, project.id, "SELECT label FROM parts ORDER BY id", None)
        .await?;
    assert_eq!(select.row_count, 3);
    assert_eq!(select.rows[0]["label"], "bolt");

    gateway.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn empty_sql_is_rejected_without_an_audit_record() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = gateway.create_project(&user, "empty", None).await.unwrap();

    let err = gateway
        .run_query(&user, project.id, "   \n\t ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let page = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    gateway.shutdown().await;
}

#[tokio::test]
async fn runtime_failures_are_audited_as_failures() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = gateway.create_project(&user, "broken", None).await.unwrap();

    let err = gateway
        .run_query(&user, project.id, "SELECT * FROM no_such_table", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QueryExecution { dangerous: false, .. }));

    let page = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(!page.items[0].success);
    let message = page.items[0].error_message.as_deref().unwrap();
    assert!(message.contains("no_such_table"), "got: {message}");

    gateway.shutdown().await;
}

#[tokio::test]
async fn projects_are_invisible_to_other_callers() {
    let (gateway, _dir) = common::test_gateway().await;
    let owner = common::test_user();
    let stranger = common::test_user();

    let project = gateway.create_project(&owner, "private", None).await.unwrap();

    assert!(gateway.list_projects(&stranger).await.unwrap().is_empty());
    assert!(matches!(
        gateway.get_schema(&stranger, project.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        gateway
            .run_query(&stranger, project.id, "SELECT 1", None)
            .await
            .unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        gateway.delete_project(&stranger, project.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    // The owner is unaffected by the stranger's attempts
    assert_eq!(gateway.list_projects(&owner).await.unwrap().len(), 1);

    gateway.shutdown().await;
}

#[tokio::test]
async fn delete_removes_the_database_file_and_metadata() {
    let (gateway, dir) = common::test_gateway().await;
    let user = common::test_user();

    let project = gateway.create_project(&user, "doomed", None).await.unwrap();
    let db_path = dir
        .path()
        .join("tenants")
        .join(format!("{}.db", project.database_name));
    assert!(db_path.exists());

    // Leave audited attempts behind, success and failure alike; deletion
    // must succeed with history rows present
    gateway
        .run_query(&user, project.id, "SELECT 1 AS one", None)
        .await
        .unwrap();
    gateway
        .run_query(&user, project.id, "SELECT * FROM no_such_table", None)
        .await
        .unwrap_err();

    gateway.delete_project(&user, project.id).await.unwrap();
    assert!(!db_path.exists());
    assert!(gateway.list_projects(&user).await.unwrap().is_empty());
    assert!(matches!(
        gateway.get_schema(&user, project.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    // The audit log outlives the project row
    let metadata = Database::new(&common::test_config(&dir).database_url)
        .await
        .unwrap();
    let recorder = HistoryRecorder::new(metadata.pool().clone());
    let page = recorder
        .query(project.id, user.id, &HistoryFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    gateway.shutdown().await;
}

#[tokio::test]
async fn deactivation_hides_the_project_but_keeps_its_file() {
    let (gateway, dir) = common::test_gateway().await;
    let user = common::test_user();

    let project = gateway.create_project(&user, "dormant", None).await.unwrap();
    let db_path = dir
        .path()
        .join("tenants")
        .join(format!("{}.db", project.database_name));

    gateway.deactivate_project(&user, project.id).await.unwrap();
    assert!(db_path.exists());
    assert!(gateway.list_projects(&user).await.unwrap().is_empty());
    assert!(matches!(
        gateway
            .run_query(&user, project.id, "SELECT 1", None)
            .await
            .unwrap_err(),
        AppError::NotFound(_)
    ));

    gateway.shutdown().await;
}

#[tokio::test]
async fn two_projects_with_the_same_name_get_distinct_databases() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();

    let first = gateway.create_project(&user, "twin", None).await.unwrap();
    let second = gateway.create_project(&user, "twin", None).await.unwrap();
    assert_ne!(first.database_name, second.database_name);

    // Writes to one must not show up in the other
    gateway
        .run_query(&user, first.id, "CREATE TABLE only_here (id INTEGER)", None)
        .await
        .unwrap();
    assert!(gateway.get_schema(&user, second.id).await.unwrap().is_empty());

    gateway.shutdown().await;
}

#[tokio::test]
async fn importing_an_existing_database_probes_before_persisting() {
    let (gateway, dir) = common::test_gateway().await;
    let user = common::test_user();

    // An external database the gateway did not provision
    let external = dir.path().join("external.db");
    let seed = TenantDatabase::connect(
        &format!("sqlite:{}?mode=rwc", external.display()),
        &common::test_config(&dir).tenant_pool,
    )
    .await
    .unwrap();
    seed.run_statement("CREATE TABLE legacy (id INTEGER PRIMARY KEY)", QueryType::Ddl)
        .await
        .unwrap();
    seed.close().await;

    let host = HostInfo {
        scheme: DatabaseScheme::Sqlite,
        host: external.display().to_string(),
        port: None,
    };
    let credentials = DbCredentials {
        username: String::new(),
        password: String::new(),
    };
    let project = gateway
        .import_project(&user, "legacy", &host, &credentials, "external")
        .await
        .unwrap();

    let schema = gateway.get_schema(&user, project.id).await.unwrap();
    assert_eq!(schema.len(), 1);
    assert_eq!(schema[0].name, "legacy");

    gateway.shutdown().await;
}

#[tokio::test]
async fn importing_an_unreachable_database_fails_before_persisting() {
    let (gateway, dir) = common::test_gateway().await;
    let user = common::test_user();

    let host = HostInfo {
        scheme: DatabaseScheme::Sqlite,
        host: dir.path().join("nowhere.db").display().to_string(),
        port: None,
    };
    let credentials = DbCredentials {
        username: String::new(),
        password: String::new(),
    };
    let err = gateway
        .import_project(&user, "ghost", &host, &credentials, "nowhere")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Connection(_)));
    assert!(gateway.list_projects(&user).await.unwrap().is_empty());

    gateway.shutdown().await;
}

#[tokio::test]
async fn admission_is_tracked_per_class_and_identity() {
    let (gateway, _dir) = common::test_gateway().await;
    let key = Uuid::new_v4().to_string();

    // Credential operations get 5 points per window by default
    for _ in 0..5 {
        assert!(gateway.check_admission(LimiterClass::Credential, &key).allowed);
    }
    let denied = gateway.check_admission(LimiterClass::Credential, &key);
    assert!(!denied.allowed);
    assert!(denied.retry_after_ms.is_some());

    // Exhausting one class leaves the others untouched
    assert!(gateway.check_admission(LimiterClass::General, &key).allowed);
    // ...and another identity in the same class
    let other = Uuid::new_v4().to_string();
    assert!(gateway.check_admission(LimiterClass::Credential, &other).allowed);
}

#[tokio::test]
async fn assistant_operations_require_a_configured_assistant() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = gateway.create_project(&user, "assisted", None).await.unwrap();

    let err = gateway
        .suggest_title(&user, project.id, "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));

    gateway.shutdown().await;
}
