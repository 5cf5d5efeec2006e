// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed peer store implementation.
//!
//! A single mutex guards the connection; it is expected to be held only
//! briefly (one statement or one transaction), never across an I/O
//! suspension point belonging to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use entgl_core::{ConflictResolver, Document, Hlc, OpKind, OplogEntry, Resolution, VectorClock};

use crate::error::{storage_error, Error, Result};
use crate::observer::StoreObserver;
use crate::peer::RemotePeer;
use crate::schema;

/// Outcome of an `apply_batch` call.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Documents actually written (after conflict resolution).
    pub applied: Vec<Document>,
    /// Human-readable reasons entries were rejected pre-persistence.
    pub rejected: Vec<String>,
}

#[derive(Default)]
struct Cache {
    /// `node_id -> (latest_ts, latest_hash)`.
    per_node: HashMap<String, (Hlc, String)>,
    latest: Option<Hlc>,
}

struct Inner {
    conn: Mutex<Connection>,
    cache: Mutex<Cache>,
    observers: Mutex<Vec<Arc<dyn StoreObserver>>>,
    db_path: Option<PathBuf>,
}

/// Durable, transactional persistence for documents, the oplog, snapshot
/// pruning boundaries, and the remote-peer registry. Cheaply `Clone`-able;
/// clones share the same connection and caches.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    /// Opens (creating if necessary) a database file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = open_connection(path)?;
        let store = SqliteStore {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                cache: Mutex::new(Cache::default()),
                observers: Mutex::new(Vec::new()),
                db_path: Some(path.to_path_buf()),
            }),
        };
        store.rebuild_cache()?;
        Ok(store)
    }

    /// Opens an in-memory database. Used in tests; `create_snapshot` and
    /// `replace_database` are unavailable without a backing file.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(storage_error)?;
        schema::run_migrations(&conn).map_err(storage_error)?;
        let store = SqliteStore {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                cache: Mutex::new(Cache::default()),
                observers: Mutex::new(Vec::new()),
                db_path: None,
            }),
        };
        store.rebuild_cache()?;
        Ok(store)
    }

    /// Registers an observer notified (synchronously, after commit)
    /// whenever `apply_batch` writes documents.
    pub fn add_observer(&self, observer: Arc<dyn StoreObserver>) {
        let mut observers = self.inner.observers.lock().unwrap_or_else(|e| e.into_inner());
        observers.push(observer);
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.inner.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Cache> {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rebuild_cache(&self) -> Result<()> {
        let conn = self.lock_conn();
        let mut per_node = HashMap::new();

        {
            let mut stmt = conn
                .prepare(
                    "SELECT hlc_node, hlc_phys, hlc_log, hash FROM oplog o1
                     WHERE id = (SELECT MAX(id) FROM oplog o2 WHERE o2.hlc_node = o1.hlc_node)",
                )
                .map_err(storage_error)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, u32>(2)?, row.get::<_, String>(3)?))
                })
                .map_err(storage_error)?;
            for row in rows {
                let (node, phys, log, hash) = row.map_err(storage_error)?;
                per_node.insert(node.clone(), (Hlc::new(phys, log, node), hash));
            }
        }

        {
            let mut stmt =
                conn.prepare("SELECT node_id, hlc_phys, hlc_log, hash FROM snapshot_metadata").map_err(storage_error)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, u32>(2)?, row.get::<_, String>(3)?))
                })
                .map_err(storage_error)?;
            for row in rows {
                let (node, phys, log, hash) = row.map_err(storage_error)?;
                per_node.entry(node.clone()).or_insert_with(|| (Hlc::new(phys, log, node), hash));
            }
        }

        let latest = per_node.values().map(|(ts, _)| ts.clone()).max();
        drop(conn);

        let mut cache = self.lock_cache();
        cache.per_node = per_node;
        cache.latest = latest;
        Ok(())
    }

    fn update_cache(&self, entries: &[OplogEntry]) {
        let mut cache = self.lock_cache();
        for entry in entries {
            match cache.per_node.get(&entry.ts.node_id) {
                Some((ts, _)) if *ts >= entry.ts => {}
                _ => {
                    cache.per_node.insert(entry.ts.node_id.clone(), (entry.ts.clone(), entry.hash.clone()));
                }
            }
            match &cache.latest {
                Some(latest) if *latest >= entry.ts => {}
                _ => cache.latest = Some(entry.ts.clone()),
            }
        }
    }

    pub fn save_document(&self, doc: &Document) -> Result<()> {
        let conn = self.lock_conn();
        upsert_document(&conn, doc).map_err(storage_error)
    }

    pub fn get_document(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let conn = self.lock_conn();
        fetch_document(&conn, collection, key).map_err(storage_error)
    }

    pub fn append_oplog(&self, entry: &OplogEntry) -> Result<()> {
        let conn = self.lock_conn();
        insert_oplog_entry(&conn, entry).map_err(storage_error)?;
        drop(conn);
        self.update_cache(std::slice::from_ref(entry));
        Ok(())
    }

    pub fn oplog_after(&self, ts: &Hlc) -> Result<Vec<OplogEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare(
                "SELECT collection, key, op, payload, hlc_phys, hlc_log, hlc_node, hash, prev_hash FROM oplog
                 WHERE hlc_phys > ?1
                    OR (hlc_phys = ?1 AND hlc_log > ?2)
                    OR (hlc_phys = ?1 AND hlc_log = ?2 AND hlc_node > ?3)
                 ORDER BY hlc_phys, hlc_log, hlc_node",
            )
            .map_err(storage_error)?;
        let entries = stmt
            .query_map(params![ts.physical, ts.logical, ts.node_id], row_to_entry)
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)?;
        Ok(entries)
    }

    pub fn oplog_for_node_after(&self, node_id: &str, ts: &Hlc) -> Result<Vec<OplogEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare(
                "SELECT collection, key, op, payload, hlc_phys, hlc_log, hlc_node, hash, prev_hash FROM oplog
                 WHERE hlc_node = ?1
                   AND (hlc_phys > ?2
                        OR (hlc_phys = ?2 AND hlc_log > ?3)
                        OR (hlc_phys = ?2 AND hlc_log = ?3 AND hlc_node > ?4))
                 ORDER BY hlc_phys, hlc_log",
            )
            .map_err(storage_error)?;
        let entries = stmt
            .query_map(params![node_id, ts.physical, ts.logical, ts.node_id], row_to_entry)
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)?;
        Ok(entries)
    }

    pub fn last_entry_hash(&self, node_id: &str) -> Result<Option<String>> {
        let cache = self.lock_cache();
        Ok(cache.per_node.get(node_id).map(|(_, hash)| hash.clone()))
    }

    /// Returns entries `(start_hash, end_hash]` authored by `node_id`, or
    /// `None` if either boundary is unknown to this store (caller should
    /// interpret that as `snapshot_required`).
    pub fn chain_range(&self, node_id: &str, start_hash: &str, end_hash: &str) -> Result<Option<Vec<OplogEntry>>> {
        let conn = self.lock_conn();

        let start_id: i64 = if start_hash.is_empty() {
            let pruned: bool = conn
                .query_row("SELECT COUNT(*) > 0 FROM snapshot_metadata WHERE node_id = ?1", params![node_id], |row| row.get(0))
                .map_err(storage_error)?;
            if pruned {
                // Genesis has already been pruned away on this side; we
                // cannot confirm the caller's empty prev_hash is still
                // the true start of the chain.
                return Ok(None);
            }
            0
        } else {
            match conn
                .query_row("SELECT id FROM oplog WHERE hlc_node = ?1 AND hash = ?2", params![node_id, start_hash], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(storage_error)?
            {
                Some(id) => id,
                None => return Ok(None),
            }
        };

        let end_id: i64 = match conn
            .query_row("SELECT id FROM oplog WHERE hlc_node = ?1 AND hash = ?2", params![node_id, end_hash], |row| {
                row.get(0)
            })
            .optional()
            .map_err(storage_error)?
        {
            Some(id) => id,
            None => return Ok(None),
        };

        if end_id < start_id {
            return Ok(None);
        }

        if !start_hash.is_empty() {
            let oldest_id: Option<i64> = conn
                .query_row("SELECT MIN(id) FROM oplog WHERE hlc_node = ?1", params![node_id], |row| row.get(0))
                .map_err(storage_error)?;
            match oldest_id {
                Some(oldest) if oldest <= start_id => {}
                _ => return Ok(None),
            }
        }

        let mut stmt = conn
            .prepare(
                "SELECT collection, key, op, payload, hlc_phys, hlc_log, hlc_node, hash, prev_hash
                 FROM oplog WHERE hlc_node = ?1 AND id > ?2 AND id <= ?3 ORDER BY id",
            )
            .map_err(storage_error)?;
        let entries = stmt
            .query_map(params![node_id, start_id, end_id], row_to_entry)
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)?;
        Ok(Some(entries))
    }

    pub fn vector_clock(&self) -> Result<VectorClock> {
        let cache = self.lock_cache();
        let mut vc = VectorClock::new();
        for (ts, _) in cache.per_node.values() {
            vc.set(ts.clone());
        }
        Ok(vc)
    }

    pub fn latest_timestamp(&self) -> Result<Option<Hlc>> {
        Ok(self.lock_cache().latest.clone())
    }

    /// Resolves each incoming entry against current local state and
    /// applies the result, all inside one transaction.
    /// A `Put` entry with no payload is rejected before touching storage;
    /// the rest of the batch still applies.
    pub fn apply_batch(&self, resolver: ConflictResolver, entries: &[OplogEntry]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        let mut conn = self.lock_conn();
        let tx = conn.transaction().map_err(storage_error)?;

        let mut persisted: Vec<OplogEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.op == OpKind::Put && entry.payload.is_none() {
                tracing::warn!(collection = %entry.collection, key = %entry.key, "put without payload rejected");
                outcome.rejected.push(format!("{}/{}: put without payload", entry.collection, entry.key));
                continue;
            }

            let local = fetch_document(&tx, &entry.collection, &entry.key).map_err(storage_error)?;
            match resolver.resolve(local.as_ref(), entry) {
                Resolution::Apply(doc) => {
                    upsert_document(&tx, &doc).map_err(storage_error)?;
                    insert_oplog_entry(&tx, entry).map_err(storage_error)?;
                    outcome.applied.push(doc);
                    persisted.push(entry.clone());
                }
                Resolution::Skip => {
                    // The document is unchanged, but the author's chain
                    // position still advances so later gap-recovery and
                    // cache bookkeeping see this entry.
                    insert_oplog_entry(&tx, entry).map_err(storage_error)?;
                    persisted.push(entry.clone());
                }
            }
        }

        tx.commit().map_err(storage_error)?;
        drop(conn);

        // Only entries that actually got an `insert_oplog_entry` row may
        // update the per-node cache — a rejected put-without-payload was
        // never persisted, and caching its hash would make `last_entry_hash`
        // return a hash with no matching oplog row.
        self.update_cache(&persisted);

        if !outcome.applied.is_empty() {
            let observers = self.inner.observers.lock().unwrap_or_else(|e| e.into_inner());
            for observer in observers.iter() {
                observer.changes_applied(&outcome.applied);
            }
        }

        Ok(outcome)
    }

    /// Moves each author's last entry at or before `cutoff` into
    /// `snapshot_metadata` and deletes the now-redundant older rows.
    pub fn prune_oplog(&self, cutoff: Hlc) -> Result<()> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction().map_err(storage_error)?;

        let nodes: Vec<String> = {
            let mut stmt = tx.prepare("SELECT DISTINCT hlc_node FROM oplog").map_err(storage_error)?;
            let rows = stmt.query_map([], |row| row.get(0)).map_err(storage_error)?;
            rows.collect::<rusqlite::Result<Vec<String>>>().map_err(storage_error)?
        };

        for node in nodes {
            let boundary: Option<(i64, u32, String)> = tx
                .query_row(
                    "SELECT hlc_phys, hlc_log, hash FROM oplog
                     WHERE hlc_node = ?1 AND (hlc_phys < ?2 OR (hlc_phys = ?2 AND hlc_log <= ?3))
                     ORDER BY hlc_phys DESC, hlc_log DESC LIMIT 1",
                    params![node, cutoff.physical, cutoff.logical],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(storage_error)?;

            let Some((phys, log, hash)) = boundary else { continue };

            tx.execute(
                "INSERT INTO snapshot_metadata (node_id, hlc_phys, hlc_log, hash) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(node_id) DO UPDATE SET
                    hlc_phys = excluded.hlc_phys, hlc_log = excluded.hlc_log, hash = excluded.hash
                 WHERE excluded.hlc_phys > snapshot_metadata.hlc_phys
                    OR (excluded.hlc_phys = snapshot_metadata.hlc_phys AND excluded.hlc_log > snapshot_metadata.hlc_log)",
                params![node, phys, log, hash],
            )
            .map_err(storage_error)?;

            tx.execute(
                "DELETE FROM oplog WHERE hlc_node = ?1 AND (hlc_phys < ?2 OR (hlc_phys = ?2 AND hlc_log <= ?3))",
                params![node, phys, log],
            )
            .map_err(storage_error)?;
        }

        tx.commit().map_err(storage_error)?;
        drop(conn);
        self.rebuild_cache()
    }

    /// Writes a consistent binary image of this database to `dest`,
    /// checkpointing the write-ahead log first.
    pub fn create_snapshot(&self, dest: impl AsRef<Path>) -> Result<()> {
        if self.inner.db_path.is_none() {
            return Err(Error::NoBackingFile);
        }
        let conn = self.lock_conn();
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);").map_err(storage_error)?;
        let dest_str = dest.as_ref().to_string_lossy().into_owned();
        conn.execute("VACUUM INTO ?1", params![dest_str]).map_err(storage_error)?;
        Ok(())
    }

    /// Atomically swaps local state for the snapshot at `source`, keeping
    /// a `.bak` of the prior database until the swap succeeds.
    pub fn replace_database(&self, source: impl AsRef<Path>) -> Result<()> {
        let path = self.inner.db_path.clone().ok_or(Error::NoBackingFile)?;
        let bak = path.with_extension("bak");

        std::fs::copy(&path, &bak)?;
        let swap_result = std::fs::copy(source.as_ref(), &path);
        if let Err(e) = swap_result {
            // Restore from the backup we just took before giving up.
            let _ = std::fs::copy(&bak, &path);
            return Err(e.into());
        }

        let new_conn = open_connection(&path)?;
        {
            let mut conn = self.lock_conn();
            *conn = new_conn;
        }
        self.rebuild_cache()?;
        let _ = std::fs::remove_file(&bak);
        Ok(())
    }

    /// Attaches the snapshot at `source` side-by-side and merges it in:
    /// newer documents win by `ts`, oplog rows are inserted if their hash
    /// is absent, and snapshot boundaries keep the higher watermark.
    pub fn merge_snapshot(&self, source: impl AsRef<Path>) -> Result<()> {
        let source_str = source.as_ref().to_string_lossy().into_owned();
        let mut conn = self.lock_conn();
        let tx = conn.transaction().map_err(storage_error)?;

        tx.execute("ATTACH DATABASE ?1 AS snap", params![source_str]).map_err(storage_error)?;

        let merge_result = (|| -> rusqlite::Result<()> {
            tx.execute(
                "INSERT INTO documents (collection, key, content, is_deleted, hlc_phys, hlc_log, hlc_node)
                 SELECT s.collection, s.key, s.content, s.is_deleted, s.hlc_phys, s.hlc_log, s.hlc_node
                 FROM snap.documents s
                 LEFT JOIN documents d ON d.collection = s.collection AND d.key = s.key
                 WHERE d.collection IS NULL
                    OR s.hlc_phys > d.hlc_phys
                    OR (s.hlc_phys = d.hlc_phys AND s.hlc_log > d.hlc_log)
                    OR (s.hlc_phys = d.hlc_phys AND s.hlc_log = d.hlc_log AND s.hlc_node > d.hlc_node)
                 ON CONFLICT(collection, key) DO UPDATE SET
                    content = excluded.content, is_deleted = excluded.is_deleted,
                    hlc_phys = excluded.hlc_phys, hlc_log = excluded.hlc_log, hlc_node = excluded.hlc_node",
                [],
            )?;

            tx.execute(
                "INSERT OR IGNORE INTO oplog (collection, key, op, payload, hlc_phys, hlc_log, hlc_node, hash, prev_hash)
                 SELECT collection, key, op, payload, hlc_phys, hlc_log, hlc_node, hash, prev_hash FROM snap.oplog",
                [],
            )?;

            tx.execute(
                "INSERT INTO snapshot_metadata (node_id, hlc_phys, hlc_log, hash)
                 SELECT s.node_id, s.hlc_phys, s.hlc_log, s.hash FROM snap.snapshot_metadata s
                 LEFT JOIN snapshot_metadata m ON m.node_id = s.node_id
                 WHERE m.node_id IS NULL
                    OR s.hlc_phys > m.hlc_phys
                    OR (s.hlc_phys = m.hlc_phys AND s.hlc_log > m.hlc_log)
                 ON CONFLICT(node_id) DO UPDATE SET
                    hlc_phys = excluded.hlc_phys, hlc_log = excluded.hlc_log, hash = excluded.hash",
                [],
            )?;

            Ok(())
        })();

        tx.execute("DETACH DATABASE snap", []).map_err(storage_error)?;
        merge_result.map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;
        drop(conn);
        self.rebuild_cache()
    }

    /// Idempotently creates a secondary index on a JSON field within one
    /// collection.
    pub fn ensure_index(&self, collection: &str, field_path: &str) -> Result<()> {
        if !is_safe_identifier(collection) || !is_safe_field_path(field_path) {
            return Err(Error::InvalidIndexTarget(format!("{collection}.{field_path}")));
        }
        let index_name = format!("idx_documents_{}", sanitize_identifier(&format!("{collection}_{field_path}")));
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {index_name} ON documents(json_extract(content, '$.{field_path}')) WHERE collection = '{collection}'"
        );
        let conn = self.lock_conn();
        conn.execute(&sql, []).map_err(storage_error)?;
        Ok(())
    }

    pub fn list_peers(&self) -> Result<Vec<RemotePeer>> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare("SELECT node_id, address, peer_type, auth_json, enabled FROM remote_peers")
            .map_err(storage_error)?;
        let rows = stmt.query_map([], row_to_peer).map_err(storage_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_error)
    }

    pub fn upsert_peer(&self, peer: &RemotePeer) -> Result<()> {
        let auth_json = peer.auth_config.as_ref().map(|v| v.to_string());
        let peer_type = peer_type_str(peer.peer_type);
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO remote_peers (node_id, address, peer_type, auth_json, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(node_id) DO UPDATE SET
                address = excluded.address, peer_type = excluded.peer_type,
                auth_json = excluded.auth_json, enabled = excluded.enabled",
            params![peer.node_id, peer.address, peer_type, auth_json, peer.enabled],
        )
        .map_err(storage_error)?;
        Ok(())
    }

    pub fn remove_peer(&self, node_id: &str) -> Result<()> {
        let conn = self.lock_conn();
        let changed = conn.execute("DELETE FROM remote_peers WHERE node_id = ?1", params![node_id]).map_err(storage_error)?;
        if changed == 0 {
            return Err(Error::UnknownPeer(node_id.to_string()));
        }
        Ok(())
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(storage_error)?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(storage_error)?;
    schema::run_migrations(&conn).map_err(storage_error)?;
    Ok(conn)
}

fn fetch_document(conn: &Connection, collection: &str, key: &str) -> rusqlite::Result<Option<Document>> {
    conn.query_row(
        "SELECT content, is_deleted, hlc_phys, hlc_log, hlc_node FROM documents WHERE collection = ?1 AND key = ?2",
        params![collection, key],
        |row| {
            let content: Option<String> = row.get(0)?;
            let is_deleted: bool = row.get(1)?;
            let phys: i64 = row.get(2)?;
            let log: u32 = row.get(3)?;
            let node: String = row.get(4)?;
            Ok((content, is_deleted, phys, log, node))
        },
    )
    .optional()
    .map(|opt| {
        opt.map(|(content, is_deleted, phys, log, node)| {
            let updated_at = Hlc::new(phys, log, node);
            let content = content.and_then(|s| serde_json::from_str::<Value>(&s).ok());
            Document { collection: collection.to_string(), key: key.to_string(), content, updated_at, is_deleted }
        })
    })
}

fn upsert_document(conn: &Connection, doc: &Document) -> rusqlite::Result<()> {
    let content = doc.content.as_ref().map(|v| v.to_string());
    conn.execute(
        "INSERT INTO documents (collection, key, content, is_deleted, hlc_phys, hlc_log, hlc_node)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(collection, key) DO UPDATE SET
            content = excluded.content, is_deleted = excluded.is_deleted,
            hlc_phys = excluded.hlc_phys, hlc_log = excluded.hlc_log, hlc_node = excluded.hlc_node",
        params![
            doc.collection,
            doc.key,
            content,
            doc.is_deleted,
            doc.updated_at.physical,
            doc.updated_at.logical,
            doc.updated_at.node_id
        ],
    )?;
    Ok(())
}

fn insert_oplog_entry(conn: &Connection, entry: &OplogEntry) -> rusqlite::Result<()> {
    let payload = entry.payload.as_ref().map(|v| v.to_string());
    conn.execute(
        "INSERT OR IGNORE INTO oplog (collection, key, op, payload, hlc_phys, hlc_log, hlc_node, hash, prev_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.collection,
            entry.key,
            op_str(entry.op),
            payload,
            entry.ts.physical,
            entry.ts.logical,
            entry.ts.node_id,
            entry.hash,
            entry.prev_hash
        ],
    )?;
    Ok(())
}

fn op_str(op: OpKind) -> &'static str {
    match op {
        OpKind::Put => "put",
        OpKind::Delete => "delete",
    }
}

fn parse_op(s: &str) -> rusqlite::Result<OpKind> {
    match s {
        "put" => Ok(OpKind::Put),
        "delete" => Ok(OpKind::Delete),
        other => {
            Err(rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, format!("unknown op '{other}'").into()))
        }
    }
}

fn row_to_entry(row: &Row) -> rusqlite::Result<OplogEntry> {
    let collection: String = row.get(0)?;
    let key: String = row.get(1)?;
    let op_str: String = row.get(2)?;
    let payload: Option<String> = row.get(3)?;
    let phys: i64 = row.get(4)?;
    let log: u32 = row.get(5)?;
    let node: String = row.get(6)?;
    let hash: String = row.get(7)?;
    let prev_hash: String = row.get(8)?;

    let op = parse_op(&op_str)?;
    let payload = payload.and_then(|s| serde_json::from_str::<Value>(&s).ok());

    Ok(OplogEntry { collection, key, op, payload, ts: Hlc::new(phys, log, node), prev_hash, hash })
}

fn row_to_peer(row: &Row) -> rusqlite::Result<RemotePeer> {
    let node_id: String = row.get(0)?;
    let address: String = row.get(1)?;
    let peer_type_str: String = row.get(2)?;
    let auth_json: Option<String> = row.get(3)?;
    let enabled: bool = row.get(4)?;

    let peer_type = parse_peer_type(&peer_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, format!("unknown peer_type '{peer_type_str}'").into())
    })?;
    let auth_config = auth_json.and_then(|s| serde_json::from_str::<Value>(&s).ok());

    Ok(RemotePeer { node_id, address, peer_type, auth_config, enabled })
}

fn peer_type_str(peer_type: crate::peer::PeerType) -> &'static str {
    use crate::peer::PeerType;
    match peer_type {
        PeerType::LanDiscovered => "lan_discovered",
        PeerType::StaticRemote => "static_remote",
        PeerType::CloudRemote => "cloud_remote",
    }
}

fn parse_peer_type(s: &str) -> Option<crate::peer::PeerType> {
    use crate::peer::PeerType;
    match s {
        "lan_discovered" => Some(PeerType::LanDiscovered),
        "static_remote" => Some(PeerType::StaticRemote),
        "cloud_remote" => Some(PeerType::CloudRemote),
        _ => None,
    }
}

fn sanitize_identifier(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

fn is_safe_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_safe_field_path(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
