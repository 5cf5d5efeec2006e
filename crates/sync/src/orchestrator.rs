// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync Orchestrator — the heart of the engine. A fixed-period gossip
//! loop picks a random fanout of eligible peers, syncs with each
//! independently, and periodically prunes the oplog. Recovery from
//! `SnapshotRequired`/corrupt-database errors is handled inline so a
//! single bad peer round never wedges the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use entgl_core::{ClockSource, ConflictResolver, Hlc, OplogEntry, SystemClock};
use entgl_store::{RemotePeer, SqliteStore};
use rand::seq::SliceRandom;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::{ClientConfig, SyncClient};
use crate::error::{Error, Result};
use crate::metrics::PeerStatus;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub node_id: String,
    pub auth_token: String,
    pub gossip_period: Duration,
    pub gossip_fanout: usize,
    pub maintenance_interval: Duration,
    pub retention: Duration,
    pub request_timeout: Duration,
    pub compression_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            auth_token: String::new(),
            gossip_period: Duration::from_secs(2),
            gossip_fanout: 3,
            maintenance_interval: Duration::from_secs(60 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            request_timeout: Duration::from_secs(10),
            compression_enabled: true,
        }
    }
}

/// Bookkeeping behind one peer's exponential backoff; replaced wholesale
/// under the mutex rather than mutated in place.
struct BackoffState {
    failures: u32,
    next_attempt: tokio::time::Instant,
}

pub struct SyncOrchestrator {
    store: SqliteStore,
    resolver: ConflictResolver,
    config: OrchestratorConfig,
    clients: AsyncMutex<HashMap<String, Arc<AsyncMutex<SyncClient>>>>,
    backoff: std::sync::Mutex<HashMap<String, BackoffState>>,
    statuses: std::sync::Mutex<HashMap<String, PeerStatus>>,
}

impl SyncOrchestrator {
    pub fn new(store: SqliteStore, resolver: ConflictResolver, config: OrchestratorConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            resolver,
            config,
            clients: AsyncMutex::new(HashMap::new()),
            backoff: std::sync::Mutex::new(HashMap::new()),
            statuses: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Operator-visible status of one peer; `Unreachable` is the default
    /// for a peer this node has never synced with.
    pub fn peer_status(&self, node_id: &str) -> PeerStatus {
        let statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        statuses.get(node_id).copied().unwrap_or(PeerStatus::Unreachable)
    }

    fn set_status(&self, node_id: &str, status: PeerStatus) {
        let mut statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        statuses.insert(node_id.to_string(), status);
    }

    /// Runs the gossip loop until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.gossip_period);
        let mut last_maintenance = tokio::time::Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sync orchestrator stopping");
                    return;
                }
                _ = tick.tick() => {
                    Arc::clone(&self).gossip_round().await;

                    if last_maintenance.elapsed() >= self.config.maintenance_interval {
                        self.run_maintenance();
                        last_maintenance = tokio::time::Instant::now();
                    }
                }
            }
        }
    }

    fn run_maintenance(&self) {
        let now_ms = SystemClock.now_ms();
        let cutoff_ms = now_ms.saturating_sub(self.config.retention.as_millis() as i64);
        let cutoff = Hlc::new(cutoff_ms, 0, "");
        if let Err(e) = self.store.prune_oplog(cutoff) {
            warn!(error = %e, "maintenance prune_oplog failed");
        }
    }

    async fn gossip_round(self: Arc<Self>) {
        let peers = match self.eligible_peers() {
            Ok(peers) => peers,
            Err(e) => {
                warn!(error = %e, "failed to list peers for gossip round");
                return;
            }
        };
        let chosen = pick_fanout(peers, self.config.gossip_fanout);

        let mut handles = Vec::with_capacity(chosen.len());
        for peer in chosen {
            let this = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                if let Err(e) = this.sync_with(&peer).await {
                    warn!(node = %peer.node_id, error = %e, "sync with peer failed");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn eligible_peers(&self) -> Result<Vec<RemotePeer>> {
        let peers = self.store.list_peers()?;
        Ok(peers
            .into_iter()
            .filter(|p| p.enabled && p.node_id != self.config.node_id && !self.is_in_backoff(&p.node_id))
            .collect())
    }

    async fn client_for(&self, peer: &RemotePeer) -> Arc<AsyncMutex<SyncClient>> {
        let mut clients = self.clients.lock().await;
        clients
            .entry(peer.node_id.clone())
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(SyncClient::new(ClientConfig {
                    node_id: self.config.node_id.clone(),
                    auth_token: self.config.auth_token.clone(),
                    request_timeout: self.config.request_timeout,
                    compression_enabled: self.config.compression_enabled,
                })))
            })
            .clone()
    }

    /// Syncs with one peer: exchange vector clocks, pull what we're
    /// missing, push what they're missing.
    pub async fn sync_with(self: &Arc<Self>, peer: &RemotePeer) -> Result<()> {
        let client_handle = self.client_for(peer).await;
        let mut client = client_handle.lock().await;

        let result = self.do_sync(&mut client, peer).await;

        match &result {
            Ok(()) => {
                drop(client);
                self.reset_backoff(&peer.node_id);
                self.set_status(&peer.node_id, PeerStatus::Connected);
            }
            Err(Error::SnapshotRequired) => {
                client.disconnect();
                drop(client);
                self.set_status(&peer.node_id, PeerStatus::RequiresSnapshot);
                warn!(node = %peer.node_id, "peer requires a snapshot merge, recovering");
                if let Err(e) = self.recover_via_snapshot(peer).await {
                    error!(node = %peer.node_id, error = %e, "snapshot merge recovery failed");
                    self.record_failure(&peer.node_id);
                } else {
                    self.reset_backoff(&peer.node_id);
                    self.set_status(&peer.node_id, PeerStatus::Connected);
                }
            }
            Err(Error::CorruptDatabase(msg)) => {
                client.disconnect();
                drop(client);
                error!(node = %peer.node_id, %msg, "local database corrupt, attempting emergency replace");
                if let Err(e) = self.recover_via_replace(peer).await {
                    error!(node = %peer.node_id, error = %e, "emergency replace failed; marking peer down");
                    self.record_failure(&peer.node_id);
                } else {
                    self.reset_backoff(&peer.node_id);
                    self.set_status(&peer.node_id, PeerStatus::Connected);
                }
            }
            Err(_) => {
                client.disconnect();
                drop(client);
                self.record_failure(&peer.node_id);
            }
        }

        result
    }

    async fn do_sync(&self, client: &mut SyncClient, peer: &RemotePeer) -> Result<()> {
        client.ensure_connected(&peer.address).await?;

        let peer_vc = client.get_vector_clock().await?;
        let local_vc = self.store.vector_clock()?;

        for node in local_vc.nodes_peer_is_ahead_of(&peer_vc) {
            let since = local_vc.get(&node).cloned().unwrap_or_else(Hlc::min);
            let changes = client.pull_changes(&node, &since).await?;
            if changes.is_empty() {
                // The peer's vector clock is strictly ahead of ours for this
                // node, so a pull after `since` returning nothing means the
                // peer no longer has that history in its oplog — it was
                // pruned. There is no in-batch linkage to check; fall back
                // to a snapshot immediately rather than silently treating
                // this as "nothing to sync".
                warn!(node = %node, "peer vector clock is ahead but pull returned no entries; requesting snapshot");
                return Err(Error::SnapshotRequired);
            }
            self.process_inbound_batch(client, changes).await?;
        }

        for node in local_vc.nodes_we_are_ahead_of(&peer_vc) {
            let since = peer_vc.get(&node).cloned().unwrap_or_else(Hlc::min);
            let entries = self.store.oplog_for_node_after(&node, &since)?;
            if !entries.is_empty() {
                let ack = client.push_changes(entries).await?;
                if ack.snapshot_required {
                    return Err(Error::SnapshotRequired);
                }
            }
        }

        Ok(())
    }

    /// Validates and applies a batch of inbound oplog entries, grouped
    /// and reconciled per author chain.
    async fn process_inbound_batch(&self, client: &mut SyncClient, changes: Vec<OplogEntry>) -> Result<()> {
        let mut by_author: HashMap<String, Vec<OplogEntry>> = HashMap::new();
        for entry in changes {
            by_author.entry(entry.ts.node_id.clone()).or_default().push(entry);
        }

        for (author, mut group) in by_author {
            group.sort_by(|a, b| a.ts.cmp(&b.ts));

            for entry in &group {
                if !entry.is_valid() {
                    error!(node = %author, hash = %entry.hash, "oplog entry hash mismatch from peer; accepting to avoid deadlocking sync");
                }
            }
            if let Err(e) = entgl_core::validate_chain(&group) {
                warn!(node = %author, error = %e, "in-batch chain linkage is broken; accepting anyway");
            }

            let local_head = self.store.last_entry_hash(&author)?.unwrap_or_default();
            let incoming_prev = group.first().map(|e| e.prev_hash.clone()).unwrap_or_default();

            if local_head != incoming_prev {
                let range = client.get_chain_range(&author, &local_head, &incoming_prev).await?;
                if range.snapshot_required {
                    return Err(Error::SnapshotRequired);
                }
                match range.entries {
                    Some(gap) if !gap.is_empty() => {
                        if let Err(e) = entgl_core::validate_chain(&gap) {
                            warn!(node = %author, error = %e, "gap entries from peer have broken internal linkage; accepting anyway");
                        }
                        if gap.first().is_some_and(|e| e.prev_hash != local_head) {
                            warn!(node = %author, "gap entries do not start where our local chain ends; accepting anyway");
                        }
                        if gap.last().is_some_and(|e| e.hash != incoming_prev) {
                            warn!(node = %author, "gap entries do not end where the incoming batch begins; accepting anyway");
                        }
                        self.apply(&gap)?;
                    }
                    _ => {
                        warn!(node = %author, "peer returned no gap entries; accepting group with a possible history hole");
                    }
                }
            }

            self.apply(&group)?;
        }

        Ok(())
    }

    fn apply(&self, entries: &[OplogEntry]) -> Result<()> {
        match self.store.apply_batch(self.resolver, entries) {
            Ok(_) => Ok(()),
            Err(entgl_store::Error::CorruptDatabase(msg)) => Err(Error::CorruptDatabase(msg)),
            Err(e) => Err(e.into()),
        }
    }

    async fn recover_via_snapshot(&self, peer: &RemotePeer) -> Result<()> {
        let client_handle = self.client_for(peer).await;
        let mut client = client_handle.lock().await;
        client.ensure_connected(&peer.address).await?;

        let tmp = tempfile::NamedTempFile::new()?;
        client.download_snapshot(tmp.path()).await?;
        self.store.merge_snapshot(tmp.path())?;
        Ok(())
    }

    async fn recover_via_replace(&self, peer: &RemotePeer) -> Result<()> {
        let client_handle = self.client_for(peer).await;
        let mut client = client_handle.lock().await;
        client.ensure_connected(&peer.address).await?;

        let tmp = tempfile::NamedTempFile::new()?;
        client.download_snapshot(tmp.path()).await?;
        self.store.replace_database(tmp.path())?;
        Ok(())
    }

    fn record_failure(&self, node_id: &str) {
        let next_attempt = {
            let mut backoff = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
            let state = backoff
                .entry(node_id.to_string())
                .or_insert_with(|| BackoffState { failures: 0, next_attempt: tokio::time::Instant::now() });
            state.failures = state.failures.saturating_add(1);
            let backoff_secs = 2u64.saturating_pow(state.failures).min(60);
            state.next_attempt = tokio::time::Instant::now() + Duration::from_secs(backoff_secs);
            state.next_attempt
        };

        let still_in_backoff = tokio::time::Instant::now() < next_attempt;
        self.set_status(node_id, if still_in_backoff { PeerStatus::Backoff { until: next_attempt } } else { PeerStatus::Unreachable });
    }

    fn reset_backoff(&self, node_id: &str) {
        let mut backoff = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        backoff.remove(node_id);
    }

    fn is_in_backoff(&self, node_id: &str) -> bool {
        let backoff = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        backoff.get(node_id).is_some_and(|status| tokio::time::Instant::now() < status.next_attempt)
    }
}

fn pick_fanout(mut peers: Vec<RemotePeer>, fanout: usize) -> Vec<RemotePeer> {
    let mut rng = rand::rng();
    peers.shuffle(&mut rng);
    peers.truncate(fanout);
    peers
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
