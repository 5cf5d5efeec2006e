// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent edits to the same document under the `RecursiveMerge`
//! resolver converge by merging arrays element-by-id rather than one
//! side clobbering the other.

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
    let server = SyncServer::new(store.clone(), ConflictResolver::RecursiveMerge, config);
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
async fn concurrent_edits_merge_by_id_under_the_merge_resolver() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;

    let entry_n1 = link(
        "",
        "lists",
        "l1",
        OpKind::Put,
        Some(json!({"title": "T", "items": [{"id": 1, "done": false}]})),
        Hlc::new(100, 0, "N1"),
    )
    .unwrap();
    store_n1.apply_batch(ConflictResolver::RecursiveMerge, &[entry_n1]).unwrap();

    let entry_n2 = link(
        "",
        "lists",
        "l1",
        OpKind::Put,
        Some(json!({"title": "T", "items": [{"id": 1, "done": false}, {"id": 2, "done": false}]})),
        Hlc::new(100, 0, "N2"),
    )
    .unwrap();
    store_n2.apply_batch(ConflictResolver::RecursiveMerge, &[entry_n2]).unwrap();

    let orchestrator_n1 = SyncOrchestrator::new(
        store_n1.clone(),
        ConflictResolver::RecursiveMerge,
        OrchestratorConfig { node_id: "N1".into(), auth_token: "shared-token".into(), ..Default::default() },
    );
    let orchestrator_n2 = SyncOrchestrator::new(
        store_n2.clone(),
        ConflictResolver::RecursiveMerge,
        OrchestratorConfig { node_id: "N2".into(), auth_token: "shared-token".into(), ..Default::default() },
    );

    orchestrator_n1.sync_with(&RemotePeer::new("N2", addr_n2.as_str(), PeerType::StaticRemote)).await.unwrap();
    orchestrator_n2.sync_with(&RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote)).await.unwrap();

    let expected = json!({"title": "T", "items": [{"id": 1, "done": false}, {"id": 2, "done": false}]});
    assert_eq!(store_n1.get_document("lists", "l1").unwrap().unwrap().content, Some(expected.clone()));
    assert_eq!(store_n2.get_document("lists", "l1").unwrap().unwrap().content, Some(expected));

    cancel_n1.cancel();
    cancel_n2.cancel();
}
