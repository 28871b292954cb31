// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests against a real CouchDB
//!
//! Tests use testcontainers for portability - no external docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker / OrbStack)
//! cargo test --test integration -- --ignored
//!
//! # Run specific test
//! cargo test --test integration gateway_ -- --ignored
//! ```
//!
//! # Test Organization
//! - `gateway_*` - database and document passthroughs over HTTP
//! - `replication_*` - replicator documents, the scheduler join and data
//!   actually moving between two containers on a shared network

mod common;

use common::containers::test_network;
use common::TestInstance;
use replication_orchestrator::gateway::REPLICATOR_DB;
use replication_orchestrator::{DatabaseGateway, DrainConfig, OrchestratorError};
use serde_json::json;
use std::time::Duration;
use testcontainers::clients::Cli;

// =============================================================================
// Gateway Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn gateway_database_lifecycle() {
    let docker = Cli::default();
    let couch = TestInstance::new(&docker).await;
    let gateway = couch.controller.gateway();

    gateway.create_database("orders").await.unwrap();
    let again = gateway.create_database("orders").await.unwrap_err();
    assert_eq!(again.status(), Some(412));

    gateway
        .create_document("orders", json!({"total": 12}), "order-1")
        .await
        .unwrap();
    let details = gateway.get_database_details("orders").await.unwrap();
    assert_eq!(details.db_name, "orders");
    assert_eq!(details.doc_count, 1);

    gateway.compact_database("orders").await.unwrap();

    let visible = gateway.list_databases(&[], true).await.unwrap();
    assert_eq!(visible, vec!["orders"]);

    gateway.delete_database("orders").await.unwrap();
    let missing = gateway.get_database_details("orders").await.unwrap_err();
    assert_eq!(missing.status(), Some(404));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn gateway_database_name_with_slash() {
    let docker = Cli::default();
    let couch = TestInstance::new(&docker).await;
    let gateway = couch.controller.gateway();

    gateway.create_database("tenant/orders").await.unwrap();
    gateway
        .create_document("tenant/orders", json!({}), "a")
        .await
        .unwrap();

    let docs = gateway.list_documents("tenant/orders").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "a");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn gateway_design_documents_and_views() {
    let docker = Cli::default();
    let couch = TestInstance::new(&docker).await;
    let gateway = couch.controller.gateway();

    gateway.create_database("orders").await.unwrap();
    gateway
        .create_document(
            "orders",
            json!({"views": {"by_total": {"map": "function(doc) { emit(doc.total, null); }"}}}),
            "_design/reports",
        )
        .await
        .unwrap();
    gateway
        .create_document("orders", json!({"total": 3}), "order-1")
        .await
        .unwrap();

    let designs = gateway.list_design_documents("orders").await.unwrap();
    assert_eq!(designs.len(), 1);
    assert_eq!(designs[0]["_id"], "_design/reports");

    let view = gateway.get_view("orders", "reports", "by_total").await.unwrap();
    assert_eq!(view["rows"][0]["key"], 3);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn gateway_update_conflict() {
    let docker = Cli::default();
    let couch = TestInstance::new(&docker).await;
    let gateway = couch.controller.gateway();

    gateway.create_database("orders").await.unwrap();
    gateway
        .create_document("orders", json!({"n": 1}), "a")
        .await
        .unwrap();
    let err = gateway
        .create_document("orders", json!({"n": 2}), "a")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

// =============================================================================
// Replication Tests
// =============================================================================

/// Poll `db/id` on `gateway` until it exists or `timeout` elapses.
async fn wait_for_document(
    gateway: &DatabaseGateway,
    db: &str,
    id: &str,
    timeout: Duration,
) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match gateway.get_document(db, id).await {
            Ok(doc) => return doc,
            Err(e) if tokio::time::Instant::now() >= deadline => {
                panic!("{}/{} never replicated: {}", db, id, e)
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(250)).await,
        }
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn replication_start_stop_between_containers() {
    let docker = Cli::default();
    let network = test_network("start-stop");
    let target = TestInstance::on_network(&docker, &network).await;
    let source = TestInstance::on_network(&docker, &network).await;
    let source_gateway = source.controller.gateway();
    source_gateway.create_database("orders").await.unwrap();
    source_gateway
        .create_document("orders", json!({"total": 12}), "order-1")
        .await
        .unwrap();

    let created = target
        .controller
        .start_replication(&source.as_peer(), "orders", true)
        .await
        .unwrap();

    let doc = target
        .controller
        .gateway()
        .get_document(REPLICATOR_DB, &created.id)
        .await
        .unwrap();
    assert_eq!(doc["continuous"], true);
    assert_eq!(doc["create_target"], true);

    let copied = wait_for_document(
        target.controller.gateway(),
        "orders",
        "order-1",
        Duration::from_secs(30),
    )
    .await;
    assert_eq!(copied["total"], 12);

    let stale = target
        .controller
        .stop_replication(&created.id, "1-00000000000000000000000000000000")
        .await
        .unwrap_err();
    assert!(stale.is_conflict());

    // The replicator may have updated the document since creation
    let current = target
        .controller
        .gateway()
        .get_document(REPLICATOR_DB, &created.id)
        .await
        .unwrap();
    let rev = current["_rev"].as_str().unwrap();
    target.controller.stop_replication(&created.id, rev).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Docker
async fn replication_self_is_rejected() {
    let docker = Cli::default();
    let couch = TestInstance::new(&docker).await;

    let err = couch
        .controller
        .start_replication(&couch.controller, "orders", true)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::SelfReplication { .. }));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn replication_drain_leaves_nothing_running() {
    let docker = Cli::default();
    let network = test_network("drain");
    let target = TestInstance::on_network(&docker, &network).await;
    let source = TestInstance::on_network(&docker, &network).await;
    let peer = source.as_peer();
    for name in ["a", "b", "c"] {
        let gateway = source.controller.gateway();
        gateway.create_database(name).await.unwrap();
        gateway
            .create_document(name, json!({"db": name}), "marker")
            .await
            .unwrap();
        target
            .controller
            .start_replication(&peer, name, true)
            .await
            .unwrap();
    }

    // Every job has connected and copied data before draining
    for name in ["a", "b", "c"] {
        wait_for_document(
            target.controller.gateway(),
            name,
            "marker",
            Duration::from_secs(30),
        )
        .await;
    }
    assert!(!target
        .controller
        .running_replication_jobs()
        .await
        .unwrap()
        .is_empty());

    let config = DrainConfig {
        max_rounds: 20,
        initial_delay: "200ms".to_string(),
        max_delay: "2s".to_string(),
        backoff_factor: 2.0,
    };
    target.controller.drain_replications(&config).await.unwrap();
    assert!(target
        .controller
        .running_replication_jobs()
        .await
        .unwrap()
        .is_empty());
}
