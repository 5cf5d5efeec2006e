// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed request/response bodies carried inside a [`crate::frame::Frame`].
//! Each variant of [`MessageType`] maps to exactly one Rust type here and
//! is serialized as JSON over the wire.

use entgl_core::{Hlc, OplogEntry, VectorClock};
use serde::{Deserialize, Serialize};

/// One byte on the wire identifying the payload's shape. Order is
/// stable; do not renumber existing variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    HandshakeReq = 0,
    HandshakeRes = 1,
    GetClockReq = 2,
    ClockRes = 3,
    GetVectorClockReq = 4,
    VectorClockRes = 5,
    PullChangesReq = 6,
    ChangeSetRes = 7,
    PushChangesReq = 8,
    AckRes = 9,
    GetChainRangeReq = 10,
    ChainRangeRes = 11,
    GetSnapshotReq = 12,
    SnapshotChunkMsg = 13,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        let ty = match b {
            0 => Self::HandshakeReq,
            1 => Self::HandshakeRes,
            2 => Self::GetClockReq,
            3 => Self::ClockRes,
            4 => Self::GetVectorClockReq,
            5 => Self::VectorClockRes,
            6 => Self::PullChangesReq,
            7 => Self::ChangeSetRes,
            8 => Self::PushChangesReq,
            9 => Self::AckRes,
            10 => Self::GetChainRangeReq,
            11 => Self::ChainRangeRes,
            12 => Self::GetSnapshotReq,
            13 => Self::SnapshotChunkMsg,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeReq {
    pub node_id: String,
    pub auth_token: String,
    pub supported_compression: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeRes {
    pub node_id: String,
    pub accepted: bool,
    pub selected_compression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetClockReq;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockRes(pub Hlc);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetVectorClockReq;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorClockRes(pub VectorClock);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullChangesReq {
    pub node_id: String,
    pub since_phys: i64,
    pub since_log: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeSetRes {
    pub entries: Vec<OplogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushChangesReq {
    pub entries: Vec<OplogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AckRes {
    pub success: bool,
    pub snapshot_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetChainRangeReq {
    pub node_id: String,
    pub start_hash: String,
    pub end_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainRangeRes {
    pub entries: Option<Vec<OplogEntry>>,
    pub snapshot_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetSnapshotReq;

/// One chunk of a streamed snapshot transfer (~80 KiB each on the
/// sending side; receivers must not assume a fixed chunk size).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotChunkMsg {
    pub data: Vec<u8>,
    pub is_last: bool,
}
