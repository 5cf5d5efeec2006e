// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A node whose cached chain position for a peer's author points at an
//! earlier entry than the peer's next batch assumes recovers the
//! missing middle via `GetChainRangeReq` during a real
//! `SyncOrchestrator::sync_with` round, rather than requiring a full
//! snapshot or silently dropping the hole.

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
async fn a_stale_cached_position_recovers_the_gap_through_a_real_sync_round() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, _addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;

    let a = link("", "notes", "n1", OpKind::Put, Some(json!({"v": 1})), Hlc::new(100, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[a.clone()]).unwrap();
    let b = link(a.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 2})), Hlc::new(200, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[b.clone()]).unwrap();
    let c = link(b.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 3})), Hlc::new(300, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[c.clone()]).unwrap();
    let d = link(c.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 4})), Hlc::new(400, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[d.clone()]).unwrap();

    store_n2.apply_batch(ConflictResolver::LastWriteWins, &[a.clone()]).unwrap();

    // N2's cache for author "N1" claims a position (ts=250, between `b`
    // and `c`) later than the chain hash it's actually recorded against
    // (`a`'s real hash) — e.g. a record imported from a stale backup.
    // The next real pull from N1 starts after ts=250 and so skips `b`
    // entirely, leaving N2's true chain head (`a`) unbridged to what the
    // batch assumes (`b`'s hash as `c`'s prev_hash).
    let stale_marker = OplogEntry { ts: Hlc::new(250, 0, "N1"), hash: a.hash.clone(), ..a.clone() };
    store_n2.apply_batch(ConflictResolver::LastWriteWins, &[stale_marker]).unwrap();
    assert_eq!(store_n2.last_entry_hash("N1").unwrap(), Some(a.hash.clone()));

    let orchestrator_n2 = SyncOrchestrator::new(
        store_n2.clone(),
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: "N2".into(), auth_token: "shared-token".into(), ..Default::default() },
    );
    let peer_n1 = RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote);

    orchestrator_n2.sync_with(&peer_n1).await.unwrap();

    assert_eq!(store_n2.last_entry_hash("N1").unwrap(), Some(d.hash));
    assert_eq!(store_n2.get_document("notes", "n1").unwrap().unwrap().content, Some(json!({"v": 4})));

    cancel_n1.cancel();
    cancel_n2.cancel();
}
