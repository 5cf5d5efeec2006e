// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Observer hook for `changes_applied`: the store owns a list of
//! observers added at construction and calls them synchronously, after
//! commit, whenever `apply_batch` changes documents.

use entgl_core::Document;

pub trait StoreObserver: Send + Sync {
    fn changes_applied(&self, docs: &[Document]);
}
