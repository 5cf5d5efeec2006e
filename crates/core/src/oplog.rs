// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Oplog entries and per-author hash chains.
//!
//! An [`OplogEntry`] is immutable once constructed. Its `hash` covers the
//! entry's content plus the `prev_hash` of the entry that precedes it in
//! its author's chain, so tampering with or reordering history is
//! detectable. This module only computes and validates hashes/links; it
//! has no knowledge of storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::hlc::Hlc;

/// The kind of mutation an oplog entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Put,
    Delete,
}

/// An immutable, hash-chained oplog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OplogEntry {
    pub collection: String,
    pub key: String,
    pub op: OpKind,
    pub payload: Option<Value>,
    pub ts: Hlc,
    pub prev_hash: String,
    pub hash: String,
}

/// Canonical field layout hashed to produce an entry's content hash.
///
/// `serde_json::Value` (built without the `preserve_order` feature) keeps
/// object keys in sorted order internally, so serializing `payload` here
/// always yields the same bytes regardless of the order fields arrived in
/// off the wire — this is what makes the hash language/transport
/// independent.
#[derive(Serialize)]
struct HashInput<'a> {
    collection: &'a str,
    key: &'a str,
    op: OpKind,
    payload: &'a Option<Value>,
    ts: &'a Hlc,
    prev_hash: &'a str,
}

fn hash_of_fields(
    collection: &str,
    key: &str,
    op: OpKind,
    payload: &Option<Value>,
    ts: &Hlc,
    prev_hash: &str,
) -> Result<String> {
    let input = HashInput { collection, key, op, payload, ts, prev_hash };
    let bytes = serde_json::to_vec(&input)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}

impl OplogEntry {
    /// Recomputes this entry's content hash from its fields.
    pub fn compute_hash(&self) -> Result<String> {
        hash_of_fields(&self.collection, &self.key, self.op, &self.payload, &self.ts, &self.prev_hash)
    }

    /// Returns true if `hash_of(self) == self.hash`.
    pub fn is_valid(&self) -> bool {
        matches!(self.compute_hash(), Ok(h) if h == self.hash)
    }
}

/// Extends a chain: builds a new [`OplogEntry`] linking to `prev_hash`,
/// the hash of the previous entry authored by `ts.node_id` (or `""` for
/// that author's genesis entry).
///
/// Rejects `Put` entries with no payload before an entry is ever
/// constructed — such an operation never occupies a chain position.
pub fn link(
    prev_hash: impl Into<String>,
    collection: impl Into<String>,
    key: impl Into<String>,
    op: OpKind,
    payload: Option<Value>,
    ts: Hlc,
) -> Result<OplogEntry> {
    let collection = collection.into();
    let key = key.into();
    let prev_hash = prev_hash.into();

    if op == OpKind::Put && payload.is_none() {
        return Err(Error::PutWithoutPayload { collection, key });
    }

    let hash = hash_of_fields(&collection, &key, op, &payload, &ts, &prev_hash)?;

    Ok(OplogEntry { collection, key, op, payload, ts, prev_hash, hash })
}

/// Validates that `entries` — the full run of one author's entries, in
/// `ts` order — form an unbroken chain: every `entries[i+1].prev_hash`
/// must equal `entries[i].hash`.
///
/// `entries` must already be sorted by `ts`; callers receiving a batch
/// from the wire are expected to sort before calling this.
pub fn validate_chain(entries: &[OplogEntry]) -> Result<()> {
    for pair in entries.windows(2) {
        if pair[0].ts > pair[1].ts {
            return Err(Error::Unsorted);
        }
    }
    for (i, pair) in entries.windows(2).enumerate() {
        if pair[1].prev_hash != pair[0].hash {
            return Err(Error::ChainBroken {
                index: i + 1,
                prev_hash: pair[1].prev_hash.clone(),
                expected: pair[0].hash.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "oplog_tests.rs"]
mod tests;
