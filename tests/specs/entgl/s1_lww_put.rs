// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! N1 puts a document, N2 syncs, and reads back the same content and
//! timestamp.

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
async fn n2_sync_reads_back_n1s_put_with_its_original_timestamp() {
    let (store_n1, addr_n1, cancel_n1) = spawn_node("N1", "shared-token").await;
    let (store_n2, _addr_n2, cancel_n2) = spawn_node("N2", "shared-token").await;

    let ts = Hlc::new(100, 0, "N1");
    let entry = link("", "users", "u1", OpKind::Put, Some(json!({"name": "A"})), ts.clone()).unwrap();
    store_n1.apply_batch(ConflictResolver::LastWriteWins, &[entry]).unwrap();

    let orchestrator_n2 = SyncOrchestrator::new(
        store_n2.clone(),
        ConflictResolver::LastWriteWins,
        OrchestratorConfig { node_id: "N2".into(), auth_token: "shared-token".into(), ..Default::default() },
    );
    let peer_n1 = RemotePeer::new("N1", addr_n1.as_str(), PeerType::StaticRemote);
    orchestrator_n2.sync_with(&peer_n1).await.unwrap();

    let doc = store_n2.get_document("users", "u1").unwrap().unwrap();
    assert_eq!(doc.content, Some(json!({"name": "A"})));
    assert_eq!(doc.updated_at, ts);

    cancel_n1.cancel();
    cancel_n2.cancel();
}
