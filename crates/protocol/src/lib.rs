// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! entgl-protocol: the wire protocol shared between the sync server and
//! the sync orchestrator's client — frame
//! codec, message types, and request/response bodies. Transport- and
//! storage-agnostic: this crate knows nothing about TCP listeners or
//! SQLite, only about bytes on an async stream.

pub mod error;
pub mod frame;
pub mod message;

pub use error::{Error, Result};
pub use frame::{read_frame, write_frame, Frame, COMPRESSION_THRESHOLD, MAX_FRAME_SIZE};
pub use message::{
    AckRes, ChainRangeRes, ChangeSetRes, GetChainRangeReq, GetClockReq, GetSnapshotReq,
    GetVectorClockReq, HandshakeReq, HandshakeRes, MessageType, PullChangesReq, PushChangesReq,
    SnapshotChunkMsg, ClockRes, VectorClockRes,
};
