// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! entgl-store: the SQLite-backed [`SqliteStore`] implementing the peer
//! store contract — durable, transactional persistence for documents,
//! the per-author oplog, snapshot pruning boundaries, and the
//! remote-peer registry.

pub mod error;
pub mod observer;
pub mod peer;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use observer::StoreObserver;
pub use peer::{PeerType, RemotePeer};
pub use store::{BatchOutcome, SqliteStore};
