// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Oplog Coordinator: the entry point for local document mutations.
//! Advances this node's HLC, links a new
//! oplog entry onto this node's chain head, and persists document +
//! oplog atomically through the store's `apply_batch`.

use std::sync::Arc;

use entgl_core::{link, ClockSource, ConflictResolver, Document, Hlc, HlcClock, OpKind, SystemClock};
use entgl_store::SqliteStore;
use serde_json::Value;

use crate::error::{Error, Result};

/// Local write API backed by a store and a monotonic clock for one node.
pub struct OplogCoordinator<C: ClockSource = SystemClock> {
    store: SqliteStore,
    clock: Arc<HlcClock<C>>,
    resolver: ConflictResolver,
}

impl OplogCoordinator<SystemClock> {
    pub fn new(store: SqliteStore, node_id: impl Into<String>, resolver: ConflictResolver) -> Self {
        Self::with_clock(store, resolver, Arc::new(HlcClock::new(node_id)))
    }
}

impl<C: ClockSource> OplogCoordinator<C> {
    pub fn with_clock(store: SqliteStore, resolver: ConflictResolver, clock: Arc<HlcClock<C>>) -> Self {
        Self { store, clock, resolver }
    }

    pub fn node_id(&self) -> &str {
        self.clock.node_id()
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Records a local `put` for `collection`/`key`.
    pub fn put(&self, collection: &str, key: &str, content: Value) -> Result<Document> {
        self.write(collection, key, OpKind::Put, Some(content))
    }

    /// Records a local tombstone for `collection`/`key`.
    pub fn delete(&self, collection: &str, key: &str) -> Result<Document> {
        self.write(collection, key, OpKind::Delete, None)
    }

    pub fn now(&self) -> Hlc {
        self.clock.now()
    }

    fn write(&self, collection: &str, key: &str, op: OpKind, payload: Option<Value>) -> Result<Document> {
        let ts = self.clock.now();
        let prev_hash = self.store.last_entry_hash(self.node_id())?.unwrap_or_default();
        let entry = link(&prev_hash, collection, key, op, payload, ts)?;

        self.store.apply_batch(self.resolver, std::slice::from_ref(&entry))?;

        self.store
            .get_document(collection, key)?
            .ok_or_else(|| Error::UnexpectedResponse(format!("document {collection}/{key} missing after local write")))
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
