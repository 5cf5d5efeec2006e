// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for entgl-core operations.

use thiserror::Error;

/// All possible errors that can occur while building or validating
/// oplog entries and HLC timestamps.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid HLC: {0}")]
    InvalidHlc(String),

    #[error("put operation without payload: {collection}/{key}")]
    PutWithoutPayload { collection: String, key: String },

    #[error("hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error(
        "chain broken: entry at index {index} has prev_hash {prev_hash} but predecessor hash is {expected}"
    )]
    ChainBroken {
        index: usize,
        prev_hash: String,
        expected: String,
    },

    #[error("chain entries are not sorted by timestamp")]
    Unsorted,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for entgl-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
