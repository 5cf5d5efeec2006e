// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! An oplog entry whose payload was tampered with after hashing, but
//! whose chain position is otherwise correct, is still accepted
//! (logged, not dropped) and does not block later entries from the
//! same peer from syncing in a subsequent round.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::Duration;

use entgl_core::{link, ConflictResolver, Hlc, OpKind, OplogEntry};
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

#[tokio::test]
async fn a_tampered_payload_is_accepted_and_does_not_block_later_syncing() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, _addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;

    let a = link("", "notes", "n1", OpKind::Put, Some(json!({"v": 1})), Hlc::new(100, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[a.clone()]).unwrap();

    // `b`'s recorded hash does not match its own content, simulating
    // storage corruption or a tampered payload that still lines up
    // with the chain (correct prev_hash, correct ts).
    let honest_b = link(a.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 2})), Hlc::new(200, 0, "N1")).unwrap();
    let tampered_b = OplogEntry {
        payload: Some(json!({"v": "corrupted"})),
        hash: honest_b.hash.clone(),
        ..honest_b
    };
    assert!(!tampered_b.is_valid(), "the tampered entry should fail its own hash check");
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[tampered_b.clone()]).unwrap();

    let orchestrator_n2 = SyncOrchestrator::new(
        store_n2.clone(),
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: "N2".into(), auth_token: "shared-token".into(), ..Default::default() },
    );
    let peer_n1 = RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote);

    orchestrator_n2.sync_with(&peer_n1).await.unwrap();
    let doc = store_n2.get_document("notes", "n1").unwrap().unwrap();
    assert_eq!(doc.content, Some(json!({"v": "corrupted"})));

    // A later, honest write from N1 still propagates on the next round.
    let c = link(tampered_b.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 3})), Hlc::new(300, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[c]).unwrap();

    orchestrator_n2.sync_with(&peer_n1).await.unwrap();
    let doc = store_n2.get_document("notes", "n1").unwrap().unwrap();
    assert_eq!(doc.content, Some(json!({"v": 3})));

    cancel_n1.cancel();
    cancel_n2.cancel();
}
