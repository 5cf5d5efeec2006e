// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! entgl-core: data model and pure logic for the EntglDb replicated oplog engine.
//!
//! This crate has no I/O. It defines the hybrid logical clock, vector
//! clocks, the document and oplog-entry types (including the hash-chain
//! rules that tie one author's entries together), and the conflict
//! resolution strategies used when applying a remote entry against local
//! state. Storage and networking live in `entgl-store`, `entgl-protocol`
//! and `entgl-sync`.

pub mod conflict;
pub mod document;
pub mod error;
pub mod hlc;
pub mod oplog;
pub mod vector_clock;

pub use conflict::{ConflictResolver, Resolution};
pub use document::Document;
pub use error::{Error, Result};
pub use hlc::{ClockSource, Hlc, HlcClock, SystemClock};
pub use oplog::{link, validate_chain, OpKind, OplogEntry};
pub use vector_clock::{VectorClock, VectorOrdering};
