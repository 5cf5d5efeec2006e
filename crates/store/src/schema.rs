// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk schema for the reference peer store backend.

/// Schema for a node's SQLite database: documents, the per-author oplog,
/// snapshot pruning boundaries, and the remote-peer registry.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key        TEXT NOT NULL,
    content    TEXT,
    is_deleted INTEGER NOT NULL,
    hlc_phys   INTEGER NOT NULL,
    hlc_log    INTEGER NOT NULL,
    hlc_node   TEXT NOT NULL,
    PRIMARY KEY (collection, key)
);

CREATE TABLE IF NOT EXISTS oplog (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    key        TEXT NOT NULL,
    op         TEXT NOT NULL,
    payload    TEXT,
    hlc_phys   INTEGER NOT NULL,
    hlc_log    INTEGER NOT NULL,
    hlc_node   TEXT NOT NULL,
    hash       TEXT NOT NULL UNIQUE,
    prev_hash  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_oplog_author ON oplog(hlc_node, hlc_phys, hlc_log);
CREATE INDEX IF NOT EXISTS idx_oplog_hash ON oplog(hash);

CREATE TABLE IF NOT EXISTS snapshot_metadata (
    node_id  TEXT PRIMARY KEY,
    hlc_phys INTEGER NOT NULL,
    hlc_log  INTEGER NOT NULL,
    hash     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS remote_peers (
    node_id   TEXT PRIMARY KEY,
    address   TEXT NOT NULL,
    peer_type TEXT NOT NULL,
    auth_json TEXT,
    enabled   INTEGER NOT NULL
);
"#;

/// Runs schema creation against a fresh or existing connection. Idempotent.
pub fn run_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
