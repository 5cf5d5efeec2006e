// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The remote-peer registry, owned by the store and replicated like
//! any other collection by the layers above it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a peer was discovered or configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerType {
    LanDiscovered,
    StaticRemote,
    CloudRemote,
}

/// A remote node this node may sync with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePeer {
    pub node_id: String,
    pub address: String,
    pub peer_type: PeerType,
    pub auth_config: Option<Value>,
    pub enabled: bool,
}

impl RemotePeer {
    pub fn new(node_id: impl Into<String>, address: impl Into<String>, peer_type: PeerType) -> Self {
        RemotePeer { node_id: node_id.into(), address: address.into(), peer_type, auth_config: None, enabled: true }
    }
}
