// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The document model: the unit of storage the engine replicates.
//! A document's primary key is `(collection, key)`; deletes
//! are represented as tombstones rather than physical removal so that
//! last-write-wins comparisons remain well defined.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hlc::Hlc;

/// A single stored document, or tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub key: String,
    /// `None` for tombstones; always `Some` for live documents.
    pub content: Option<Value>,
    pub updated_at: Hlc,
    pub is_deleted: bool,
}

impl Document {
    /// Creates a live document.
    pub fn put(collection: impl Into<String>, key: impl Into<String>, content: Value, updated_at: Hlc) -> Self {
        Document {
            collection: collection.into(),
            key: key.into(),
            content: Some(content),
            updated_at,
            is_deleted: false,
        }
    }

    /// Creates a tombstone.
    pub fn tombstone(collection: impl Into<String>, key: impl Into<String>, updated_at: Hlc) -> Self {
        Document {
            collection: collection.into(),
            key: key.into(),
            content: None,
            updated_at,
            is_deleted: true,
        }
    }

    /// The `(collection, key)` primary key.
    pub fn id(&self) -> (&str, &str) {
        (&self.collection, &self.key)
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
