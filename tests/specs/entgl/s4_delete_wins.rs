// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A delete with a later timestamp than an older put must win, on
//! both nodes, leaving a tombstone.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use entgl_core::{link, ConflictResolver, Hlc, OpKind};
use entgl_store::SqliteStore;
use entgl_store::{PeerType, RemotePeer};
use entgl_sync::{OrchestratorConfig, ServerConfig, SyncOrchestrator, SyncServer};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn spawn_node(node_id: &str, auth_token: &str) -> (SqliteStore, String, CancellationToken) {
    let store = SqliteStore::open_in_memory().unwrap();
    let config = ServerConfig {
        node_id: node_id.to_string(),
        auth_token: auth_token.to_string(),
        max_connections: 10,
        idle_timeout: std::time::Duration::from_secs(5),
        compression_enabled: true,
    };
    let server = SyncServer::new(store.clone(), ConflictResolver::LastWriteWins, config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, cancel_clone).await;
    });
    (store, addr, cancel)
}

#[tokio::test]
async fn a_later_delete_wins_over_an_older_put_on_both_nodes() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;

    let put = link("", "users", "u1", OpKind::Put, Some(json!({"name": "A"})), Hlc::new(100, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[put]).unwrap();

    let delete = link("", "users", "u1", OpKind::Delete, None, Hlc::new(200, 0, "N2")).unwrap();
    store_n2.apply_batch(ConflictResolver::LastWriteWins, &[delete]).unwrap();

    let orchestrator_n1 = SyncOrchestrator::new(
        store_n1.clone(),
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: "N1".into(), auth_token: "shared-token".into(), ..Default::default() },
    );
    let orchestrator_n2 = SyncOrchestrator::new(
        store_n2.clone(),
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: "N2".into(), auth_token: "shared-token".into(), ..Default::default() },
    );

    orchestrator_n1.sync_with(&RemotePeer::new("N2", addr_n2.as_str(), PeerType::StaticRemote)).await.unwrap();
    orchestrator_n2.sync_with(&RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote)).await.unwrap();

    let doc_n1 = store_n1.get_document("users", "u1").unwrap().unwrap();
    let doc_n2 = store_n2.get_document("users", "u1").unwrap().unwrap();
    assert!(doc_n1.is_deleted);
    assert!(doc_n2.is_deleted);

    cancel_n1.cancel();
    cancel_n2.cancel();
}
