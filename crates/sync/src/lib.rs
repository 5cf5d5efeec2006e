// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! entgl-sync: the local-write path, the peer-facing TCP server, and
//! the gossip orchestrator that drives anti-entropy between nodes.
//! Built on [`entgl_store::SqliteStore`] and [`entgl_protocol`]'s wire
//! format; any store satisfying the same contract is a drop-in backend.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod server;

pub use client::{ClientConfig, SyncClient};
pub use coordinator::OplogCoordinator;
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot, PeerStatus};
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator};
pub use server::{ServerConfig, SyncServer};
