// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict resolution strategies.
//!
//! Resolving an incoming [`OplogEntry`] against the current local
//! [`Document`] (if any) is a pure function: it never mutates anything
//! itself, it only describes what the caller should do. Storage applies
//! the [`Resolution`] inside its own transaction.

use serde_json::{Map, Value};

use crate::document::Document;
use crate::hlc::Hlc;
use crate::oplog::{OpKind, OplogEntry};

/// Outcome of resolving an incoming entry against local state.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Replace local state (or create it) with this document.
    Apply(Document),
    /// Local state already reflects everything the incoming entry knows;
    /// nothing changes.
    Skip,
}

/// Strategy used to resolve two concurrent writes to the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolver {
    /// The write with the greater HLC timestamp wins outright; the loser
    /// is discarded entirely.
    LastWriteWins,
    /// JSON object fields are merged recursively; arrays whose elements
    /// all carry a stable `id` are merged element-by-id rather than
    /// replaced wholesale. A delete is always terminal: once a later
    /// tombstone is observed, no amount of merging resurrects the
    /// document.
    RecursiveMerge,
}

impl ConflictResolver {
    /// Resolves `incoming` against whatever is currently stored at its
    /// `(collection, key)`, or `None` if nothing is stored yet.
    pub fn resolve(&self, local: Option<&Document>, incoming: &OplogEntry) -> Resolution {
        match self {
            ConflictResolver::LastWriteWins => resolve_lww(local, incoming),
            ConflictResolver::RecursiveMerge => resolve_recursive_merge(local, incoming),
        }
    }
}

fn entry_to_document(entry: &OplogEntry) -> Document {
    match entry.op {
        OpKind::Put => Document::put(
            entry.collection.clone(),
            entry.key.clone(),
            entry.payload.clone().unwrap_or(Value::Null),
            entry.ts.clone(),
        ),
        OpKind::Delete => Document::tombstone(entry.collection.clone(), entry.key.clone(), entry.ts.clone()),
    }
}

fn resolve_lww(local: Option<&Document>, incoming: &OplogEntry) -> Resolution {
    match local {
        None => Resolution::Apply(entry_to_document(incoming)),
        Some(doc) if incoming.ts > doc.updated_at => Resolution::Apply(entry_to_document(incoming)),
        _ => Resolution::Skip,
    }
}

/// Document model carries one whole-document `updated_at`, not a
/// per-field timestamp, so unlike a true per-field CRDT the tiebreak for
/// two conflicting leaf values always falls back to whichever side's
/// whole-document timestamp is later (recorded open-question resolution,
/// see DESIGN.md).
fn resolve_recursive_merge(local: Option<&Document>, incoming: &OplogEntry) -> Resolution {
    let Some(local) = local else {
        return Resolution::Apply(entry_to_document(incoming));
    };

    // A delete is terminal on either side: no structural merge resurrects
    // or partially-deletes a document, the later timestamp just wins.
    if incoming.op == OpKind::Delete || local.is_deleted {
        return if incoming.ts > local.updated_at {
            Resolution::Apply(entry_to_document(incoming))
        } else {
            Resolution::Skip
        };
    }

    if incoming.ts <= local.updated_at && local.content.as_ref() == incoming.payload.as_ref() {
        return Resolution::Skip;
    }

    let incoming_payload = incoming.payload.clone().unwrap_or(Value::Null);
    let merged = merge_values(
        local.content.as_ref(),
        &local.updated_at,
        Some(&incoming_payload),
        &incoming.ts,
    );
    let updated_at = if incoming.ts > local.updated_at { incoming.ts.clone() } else { local.updated_at.clone() };

    Resolution::Apply(Document::put(local.collection.clone(), local.key.clone(), merged, updated_at))
}

fn merge_values(local: Option<&Value>, local_ts: &Hlc, incoming: Option<&Value>, incoming_ts: &Hlc) -> Value {
    match (local, incoming) {
        (Some(Value::Object(l)), Some(Value::Object(r))) => merge_objects(l, local_ts, r, incoming_ts),
        (Some(Value::Array(l)), Some(Value::Array(r))) => merge_arrays(l, local_ts, r, incoming_ts),
        (Some(l), Some(r)) => {
            if incoming_ts > local_ts {
                r.clone()
            } else {
                l.clone()
            }
        }
        (Some(l), None) => l.clone(),
        (None, Some(r)) => r.clone(),
        (None, None) => Value::Null,
    }
}

fn merge_objects(local: &Map<String, Value>, local_ts: &Hlc, incoming: &Map<String, Value>, incoming_ts: &Hlc) -> Value {
    let mut merged = local.clone();
    for (key, incoming_value) in incoming.iter() {
        match local.get(key) {
            Some(local_value) => {
                merged.insert(
                    key.clone(),
                    merge_values(Some(local_value), local_ts, Some(incoming_value), incoming_ts),
                );
            }
            None => {
                merged.insert(key.clone(), incoming_value.clone());
            }
        }
    }
    Value::Object(merged)
}

/// Element id used to merge arrays by identity rather than by position.
fn element_id(value: &Value) -> Option<&Value> {
    value.as_object().and_then(|obj| obj.get("id"))
}

/// Merges two arrays. If every element on both sides carries a stable
/// `id` field, elements are merged by id (local order first, then
/// incoming-only ids appended); otherwise the array is a single opaque
/// value and the newer side's array wins wholesale.
fn merge_arrays(local: &[Value], local_ts: &Hlc, incoming: &[Value], incoming_ts: &Hlc) -> Value {
    let all_have_ids = local.iter().chain(incoming.iter()).all(|v| element_id(v).is_some());

    if !all_have_ids {
        return if incoming_ts > local_ts { Value::Array(incoming.to_vec()) } else { Value::Array(local.to_vec()) };
    }

    let local_pairs = local.iter().filter_map(|item| element_id(item).map(|id| (id.clone(), item.clone())));
    let incoming_pairs = incoming.iter().filter_map(|item| element_id(item).map(|id| (id.clone(), item.clone())));

    let mut order: Vec<Value> = Vec::new();
    let mut by_id: Vec<(Value, Value)> = Vec::new();

    for (id, item) in local_pairs {
        order.push(id.clone());
        by_id.push((id, item));
    }

    for (id, item) in incoming_pairs {
        match by_id.iter_mut().find(|(existing_id, _)| *existing_id == id) {
            Some((_, existing)) => {
                let merged = merge_values(Some(&*existing), local_ts, Some(&item), incoming_ts);
                *existing = merged;
            }
            None => {
                order.push(id.clone());
                by_id.push((id, item));
            }
        }
    }

    let merged: Vec<Value> = order
        .into_iter()
        .filter_map(|id| by_id.iter().find(|(existing_id, _)| *existing_id == id).map(|(_, v)| v.clone()))
        .collect();

    Value::Array(merged)
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
