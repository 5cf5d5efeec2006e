// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Node configuration: a TOML file loaded at startup, with CLI flags
//! overriding individual fields, via a `toml::from_str`/`to_string_pretty`
//! round trip.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use entgl_core::ConflictResolver;
use entgl_store::{PeerType, RemotePeer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "entgl-node")]
#[command(about = "EntglDb replicated oplog engine host")]
pub struct Args {
    /// Path to a TOML config file; CLI flags below override its fields.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding this node's SQLite database file.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub node_id: Option<String>,

    #[arg(long)]
    pub tcp_port: Option<u16>,

    #[arg(long)]
    pub auth_token: Option<String>,

    #[arg(long)]
    pub oplog_retention_hours: Option<u64>,

    #[arg(long)]
    pub maintenance_interval_minutes: Option<u64>,

    #[arg(long)]
    pub conflict_resolver: Option<ConflictResolverArg>,

    #[arg(long)]
    pub max_connections: Option<usize>,

    #[arg(long)]
    pub operation_timeout_ms: Option<u64>,

    /// Enable debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolverArg {
    Lww,
    Merge,
}

impl From<ConflictResolverArg> for ConflictResolver {
    fn from(value: ConflictResolverArg) -> Self {
        match value {
            ConflictResolverArg::Lww => ConflictResolver::LastWriteWins,
            ConflictResolverArg::Merge => ConflictResolver::RecursiveMerge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerTypeArg {
    LanDiscovered,
    StaticRemote,
    CloudRemote,
}

impl From<PeerTypeArg> for PeerType {
    fn from(value: PeerTypeArg) -> Self {
        match value {
            PeerTypeArg::LanDiscovered => PeerType::LanDiscovered,
            PeerTypeArg::StaticRemote => PeerType::StaticRemote,
            PeerTypeArg::CloudRemote => PeerType::CloudRemote,
        }
    }
}

/// A statically-configured peer, seeded into the store's peer registry
/// at startup via a `[[peer]]` array in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub node_id: String,
    pub address: String,
    #[serde(default = "default_peer_type")]
    pub peer_type: PeerTypeArg,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_peer_type() -> PeerTypeArg {
    PeerTypeArg::StaticRemote
}

fn default_true() -> bool {
    true
}

impl PeerConfig {
    pub fn into_remote_peer(self) -> RemotePeer {
        let mut peer = RemotePeer::new(self.node_id, self.address, self.peer_type.into());
        peer.enabled = self.enabled;
        peer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_oplog_retention_hours")]
    pub oplog_retention_hours: u64,
    #[serde(default = "default_maintenance_interval_minutes")]
    pub maintenance_interval_minutes: u64,
    #[serde(default = "default_conflict_resolver")]
    pub conflict_resolver: ConflictResolverArg,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default)]
    pub peer: Vec<PeerConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_tcp_port() -> u16 {
    7990
}
fn default_oplog_retention_hours() -> u64 {
    7 * 24
}
fn default_maintenance_interval_minutes() -> u64 {
    60
}
fn default_conflict_resolver() -> ConflictResolverArg {
    ConflictResolverArg::Lww
}
fn default_max_connections() -> usize {
    100
}
fn default_operation_timeout_ms() -> u64 {
    60_000
}

impl NodeConfig {
    /// Loads the config file named by `args.config` (if any) and applies
    /// any CLI flags on top of it. `node_id` is required from one source
    /// or the other.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::read_file(path)?,
            None => Self::default_with_node_id(args.node_id.clone())?,
        };

        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(node_id) = &args.node_id {
            config.node_id = node_id.clone();
        }
        if let Some(tcp_port) = args.tcp_port {
            config.tcp_port = tcp_port;
        }
        if let Some(auth_token) = &args.auth_token {
            config.auth_token = auth_token.clone();
        }
        if let Some(hours) = args.oplog_retention_hours {
            config.oplog_retention_hours = hours;
        }
        if let Some(minutes) = args.maintenance_interval_minutes {
            config.maintenance_interval_minutes = minutes;
        }
        if let Some(resolver) = args.conflict_resolver {
            config.conflict_resolver = resolver;
        }
        if let Some(max_connections) = args.max_connections {
            config.max_connections = max_connections;
        }
        if let Some(timeout_ms) = args.operation_timeout_ms {
            config.operation_timeout_ms = timeout_ms;
        }

        if config.node_id.is_empty() {
            return Err(Error::Config("node_id must be set via --node-id or the config file".into()));
        }
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    fn default_with_node_id(node_id: Option<String>) -> Result<Self> {
        Ok(NodeConfig {
            node_id: node_id.unwrap_or_default(),
            data_dir: default_data_dir(),
            tcp_port: default_tcp_port(),
            auth_token: String::new(),
            oplog_retention_hours: default_oplog_retention_hours(),
            maintenance_interval_minutes: default_maintenance_interval_minutes(),
            conflict_resolver: default_conflict_resolver(),
            max_connections: default_max_connections(),
            operation_timeout_ms: default_operation_timeout_ms(),
            peer: Vec::new(),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.node_id))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
