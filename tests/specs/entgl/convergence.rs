// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A fixed set of writes, scattered across three nodes and applied in
//! different orders locally, converges to the same documents on every
//! node once each has synced with its neighbors.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::Duration;

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
        idle_timeout: Duration::from_secs(5),
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

fn orchestrator(store: SqliteStore, node_id: &str, auth_token: &str) -> std::sync::Arc<SyncOrchestrator> {
    SyncOrchestrator::new(
        store,
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: node_id.into(), auth_token: auth_token.into(), ..Default::default() },
    )
}

#[tokio::test]
async fn three_nodes_converge_after_every_pair_has_synced() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;
    let (store_n3, addr_n3, cancel_n3) = spawn_node("N3", "shared-token").await;

    store_n1
        .apply_batch(
            ConflictResolver::LastWriteWins,
            &[link("", "docs", "a", OpKind::Put, Some(json!({"v": "n1-a"})), Hlc::new(100, 0, "N1")).unwrap()],
        )
        .unwrap();
    store_n2
        .apply_batch(
            ConflictResolver::LastWriteWins,
            &[link("", "docs", "b", OpKind::Put, Some(json!({"v": "n2-b"})), Hlc::new(110, 0, "N2")).unwrap()],
        )
        .unwrap();
    store_n3
        .apply_batch(
            ConflictResolver::LastWriteWins,
            &[link("", "docs", "c", OpKind::Put, Some(json!({"v": "n3-c"})), Hlc::new(120, 0, "N3")).unwrap()],
        )
        .unwrap();
    // A concurrent edit to the same key from two nodes, so the pairwise
    // sync order must still converge on the later timestamp everywhere.
    store_n1
        .apply_batch(
            ConflictResolver::LastWriteWins,
            &[link("", "docs", "shared", OpKind::Put, Some(json!({"v": "from-n1"})), Hlc::new(130, 0, "N1")).unwrap()],
        )
        .unwrap();
    store_n3
        .apply_batch(
            ConflictResolver::LastWriteWins,
            &[link("", "docs", "shared", OpKind::Put, Some(json!({"v": "from-n3"})), Hlc::new(200, 0, "N3")).unwrap()],
        )
        .unwrap();

    let orch_n1 = orchestrator(store_n1.clone(), "N1", "shared-token");
    let orch_n2 = orchestrator(store_n2.clone(), "N2", "shared-token");
    let orch_n3 = orchestrator(store_n3.clone(), "N3", "shared-token");

    let peer = |id: &str, addr: &str| RemotePeer::new(id, addr, PeerType::StaticRemote);

    // A handful of sync rounds, deliberately in an interleaved, uneven
    // order, is enough for gossip to carry every write everywhere.
    orch_n1.sync_with(&peer("N2", &addr_n2)).await.unwrap();
    orch_n3.sync_with(&peer("N1", &addr_n1)).await.unwrap();
    orch_n2.sync_with(&peer("N3", &addr_n3)).await.unwrap();
    orch_n1.sync_with(&peer("N3", &addr_n3)).await.unwrap();
    orch_n2.sync_with(&peer("N1", &addr_n1)).await.unwrap();
    orch_n3.sync_with(&peer("N2", &addr_n2)).await.unwrap();

    for (collection, key, expected) in [
        ("docs", "a", json!({"v": "n1-a"})),
        ("docs", "b", json!({"v": "n2-b"})),
        ("docs", "c", json!({"v": "n3-c"})),
        ("docs", "shared", json!({"v": "from-n3"})),
    ] {
        let from_n1 = store_n1.get_document(collection, key).unwrap().unwrap().content;
        let from_n2 = store_n2.get_document(collection, key).unwrap().unwrap().content;
        let from_n3 = store_n3.get_document(collection, key).unwrap().unwrap().content;
        assert_eq!(from_n1, Some(expected.clone()));
        assert_eq!(from_n2, Some(expected.clone()));
        assert_eq!(from_n3, Some(expected));
    }

    cancel_n1.cancel();
    cancel_n2.cancel();
    cancel_n3.cancel();
}
