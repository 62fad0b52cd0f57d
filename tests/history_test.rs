// ABOUTME: Integration tests for query history filtering, pagination, and record updates
// ABOUTME: Drives the full gateway so records are produced by real executions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use querybase::database::{DateRange, HistoryFilter};
use querybase::errors::AppError;
use querybase::gateway::ProjectGateway;
use querybase::models::{AuthenticatedUser, QueryType, TenantProject};

/// Seed a project with a known mix of successful and failing executions:
/// one DDL, two inserts, one select, and one runtime failure.
async fn seeded_project(
    gateway: &ProjectGateway,
    user: &AuthenticatedUser,
) -> TenantProject {
    let project = gateway.create_project(user, "audit", None).await.unwrap();
    gateway
        .run_query(user, project.id, "CREATE TABLE t (id INTEGER PRIMARY KEY)", None)
        .await
        .unwrap();
    gateway
        .run_query(user, project.id, "INSERT INTO t (id) VALUES (1)", None)
        .await
        .unwrap();
    gateway
        .run_query(
            user,
            project.id,
            "INSERT INTO t (id) VALUES (2)",
            Some("second row".to_owned()),
        )
        .await
        .unwrap();
    gateway
        .run_query(user, project.id, "SELECT * FROM t", None)
        .await
        .unwrap();
    gateway
        .run_query(user, project.id, "SELECT * FROM missing", None)
        .await
        .unwrap_err();
    project
}

#[tokio::test]
async fn filters_narrow_by_success_and_statement_type() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = seeded_project(&gateway, &user).await;

    let all = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 50, 0)
        .await
        .unwrap();
    assert_eq!(all.total, 5);

    let failures = gateway
        .list_history(
            &user,
            project.id,
            &HistoryFilter {
                success: Some(false),
                ..HistoryFilter::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(failures.total, 1);
    assert_eq!(failures.items[0].query_text, "SELECT * FROM missing");

    let inserts = gateway
        .list_history(
            &user,
            project.id,
            &HistoryFilter {
                query_type: Some(QueryType::Insert),
                ..HistoryFilter::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(inserts.total, 2);
    assert!(inserts.items.iter().all(|r| r.query_type == QueryType::Insert));

    // Successful selects only: both dimensions ANDed
    let good_selects = gateway
        .list_history(
            &user,
            project.id,
            &HistoryFilter {
                success: Some(true),
                query_type: Some(QueryType::Select),
                ..HistoryFilter::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(good_selects.total, 1);
    assert_eq!(good_selects.items[0].query_text, "SELECT * FROM t");

    gateway.shutdown().await;
}

#[tokio::test]
async fn date_window_today_covers_fresh_records() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = seeded_project(&gateway, &user).await;

    let today = gateway
        .list_history(
            &user,
            project.id,
            &HistoryFilter {
                date_range: DateRange::Today,
                ..HistoryFilter::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(today.total, 5);

    gateway.shutdown().await;
}

#[tokio::test]
async fn pagination_reports_the_full_total_on_every_page() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = seeded_project(&gateway, &user).await;

    let first = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 2, 0)
        .await
        .unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.items.len(), 2);

    let second = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 2, 2)
        .await
        .unwrap();
    assert_eq!(second.total, 5);
    assert_eq!(second.items.len(), 2);

    let last = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 2, 4)
        .await
        .unwrap();
    assert_eq!(last.total, 5);
    assert_eq!(last.items.len(), 1);

    // Pages are disjoint and ordered newest first
    let mut seen: Vec<_> = first
        .items
        .iter()
        .chain(&second.items)
        .chain(&last.items)
        .map(|r| r.id)
        .collect();
    seen.dedup();
    assert_eq!(seen.len(), 5);
    let timestamps: Vec<_> = first
        .items
        .iter()
        .chain(&second.items)
        .chain(&last.items)
        .map(|r| r.created_at)
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));

    gateway.shutdown().await;
}

#[tokio::test]
async fn annotations_and_favorites_round_trip() {
    let (gateway, _dir) = common::test_gateway().await;
    let user = common::test_user();
    let project = seeded_project(&gateway, &user).await;

    let page = gateway
        .list_history(&user, project.id, &HistoryFilter::default(), 1, 0)
        .await
        .unwrap();
    let record = &page.items[0];

    gateway
        .update_history_annotation(&user, record.id, "flaky lookup")
        .await
        .unwrap();
    gateway.set_history_favorite(&user, record.id, true).await.unwrap();

    let favorites = gateway
        .list_history(
            &user,
            project.id,
            &HistoryFilter {
                favorite_only: true,
                ..HistoryFilter::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(favorites.total, 1);
    assert_eq!(favorites.items[0].id, record.id);
    assert_eq!(favorites.items[0].annotation.as_deref(), Some("flaky lookup"));

    gateway.set_history_favorite(&user, record.id, false).await.unwrap();
    let favorites = gateway
        .list_history(
            &user,
            project.id,
            &HistoryFilter {
                favorite_only: true,
                ..HistoryFilter::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(favorites.total, 0);

    gateway.shutdown().await;
}

#[tokio::test]
async fn history_updates_are_scoped_to_the_owner() {
    let (gateway, _dir) = common::test_gateway().await;
    let owner = common::test_user();
    let stranger = common::test_user();
    let project = seeded_project(&gateway, &owner).await;

    let page = gateway
        .list_history(&owner, project.id, &HistoryFilter::default(), 1, 0)
        .await
        .unwrap();
    let record = &page.items[0];

    assert!(matches!(
        gateway
            .update_history_annotation(&stranger, record.id, "not yours")
            .await
            .unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        gateway
            .set_history_favorite(&stranger, record.id, true)
            .await
            .unwrap_err(),
        AppError::NotFound(_)
    ));

    // The record is unchanged
    let page = gateway
        .list_history(&owner, project.id, &HistoryFilter::default(), 1, 0)
        .await
        .unwrap();
    assert!(page.items[0].annotation.is_none());
    assert!(!page.items[0].favorite);

    gateway.shutdown().await;
}
