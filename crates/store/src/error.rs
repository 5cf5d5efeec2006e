// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] entgl_core::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database is corrupt: {0}")]
    CorruptDatabase(String),

    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error("cannot index {0}: unsafe collection or field path")]
    InvalidIndexTarget(String),

    #[error("cannot replace or snapshot an in-memory database")]
    NoBackingFile,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a raw sqlite error, promoting storage corruption into its
/// own variant so callers can drive the `CorruptDatabase` recovery path
/// (emergency snapshot replace) instead of a generic persistence failure.
pub(crate) fn storage_error(e: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(raw, _) = &e {
        if raw.code == rusqlite::ErrorCode::DatabaseCorrupt || raw.code == rusqlite::ErrorCode::NotADatabase {
            return Error::CorruptDatabase(e.to_string());
        }
    }
    Error::Sqlite(e)
}
