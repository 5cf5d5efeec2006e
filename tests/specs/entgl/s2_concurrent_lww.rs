// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent writes at the same physical/logical HLC resolve
//! deterministically by node_id tiebreak, identically on both nodes.

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
async fn concurrent_writes_at_the_same_timestamp_resolve_identically_on_both_nodes() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;

    let entry_n1 = link("", "docs", "d1", OpKind::Put, Some(json!({"x": 1})), Hlc::new(100, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[entry_n1]).unwrap();
    let entry_n2 = link("", "docs", "d1", OpKind::Put, Some(json!({"x": 2})), Hlc::new(100, 0, "N2")).unwrap();
    store_n2.apply_batch(ConflictResolver::LastWriteWins, &[entry_n2]).unwrap();

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

    // "N2" > "N1" lexicographically, so N2's write wins under the tiebreak.
    orchestrator_n1.sync_with(&RemotePeer::new("N2", addr_n2.as_str(), PeerType::StaticRemote)).await.unwrap();
    orchestrator_n2.sync_with(&RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote)).await.unwrap();

    let doc_n1 = store_n1.get_document("docs", "d1").unwrap().unwrap();
    let doc_n2 = store_n2.get_document("docs", "d1").unwrap().unwrap();
    assert_eq!(doc_n1.content, Some(json!({"x": 2})));
    assert_eq!(doc_n1.content, doc_n2.content);

    cancel_n1.cancel();
    cancel_n2.cancel();
}
