// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! When a peer has pruned the portion of its chain a syncing node
//! needs, the sync falls back to a full snapshot merge instead of
//! failing, and gossip resumes normally afterwards.

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

async fn spawn_server(node_id: &str, store: SqliteStore, auth_token: &str) -> (String, CancellationToken) {
    let config = ServerConfig {
        node_id: node_id.to_string(),
        auth_token: auth_token.to_string(),
        max_connections: 10,
        idle_timeout: Duration::from_secs(5),
        compression_enabled: true,
    };
    let server = SyncServer::new(store, ConflictResolver::LastWriteWins, config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, cancel_clone).await;
    });
    (addr, cancel)
}

#[tokio::test]
async fn a_pruned_chain_falls_back_to_a_snapshot_merge_and_gossip_then_resumes() {
    let db_dir = tempfile::tempdir().unwrap();
    let store_n1 = SqliteStore::open(db_dir.path().join("n1.db")).unwrap();

    let a = link("", "notes", "n1", OpKind::Put, Some(json!({"v": 1})), Hlc::new(100, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[a.clone()]).unwrap();
    let b = link(a.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 2})), Hlc::new(200, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[b.clone()]).unwrap();
    let c = link(b.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 3})), Hlc::new(300, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[c.clone()]).unwrap();

    // Prune everything up through `c`; `a` and `b` are no longer present
    // on N1, only the `snapshot_metadata` boundary for them.
    store_n1.prune_oplog(Hlc::new(300, 0, "N1")).unwrap();

    let (addr_n1, cancel_n1) = spawn_server("N1", store_n1.clone(), "shared-token").await;

    let store_n2 = SqliteStore::open_in_memory().unwrap();
    let orchestrator_n2 = SyncOrchestrator::new(
        store_n2.clone(),
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: "N2".into(), auth_token: "shared-token".into(), ..Default::default() },
    );

    // N2 starts from nothing, so its vector clock says it is missing
    // all of N1's history; N1 responds to the pull with just its
    // post-prune tail, leaving a gap before `c` that N1 can no longer
    // fill since `a`/`b` were pruned away.
    orchestrator_n2.sync_with(&RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote)).await.unwrap();

    let doc = store_n2.get_document("notes", "n1").unwrap().unwrap();
    assert_eq!(doc.content, Some(json!({"v": 3})));

    // Gossip resumes normally: a later write from N1 still reaches N2.
    let d = link(c.hash.clone(), "notes", "n1", OpKind::Put, Some(json!({"v": 4})), Hlc::new(400, 0, "N1")).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[d]).unwrap();

    orchestrator_n2.sync_with(&RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote)).await.unwrap();
    assert_eq!(store_n2.get_document("notes", "n1").unwrap().unwrap().content, Some(json!({"v": 4})));

    cancel_n1.cancel();
}
