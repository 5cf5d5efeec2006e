// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-peer sync client: owns the persistent connection to one remote
//! node, performs the handshake, and exposes the
//! request/response pairs the orchestrator drives `sync_with` through.

use std::time::Duration;

use entgl_core::{Hlc, OplogEntry, VectorClock};
use entgl_protocol::message::{
    AckRes, ChainRangeRes, ChangeSetRes, ClockRes, GetChainRangeReq, GetClockReq,
    GetSnapshotReq, GetVectorClockReq, HandshakeReq, HandshakeRes, MessageType, PullChangesReq,
    PushChangesReq, SnapshotChunkMsg, VectorClockRes,
};
use entgl_protocol::{read_frame, write_frame, Frame};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub node_id: String,
    pub auth_token: String,
    pub request_timeout: Duration,
    pub compression_enabled: bool,
}

/// Connection lifecycle of a [`SyncClient`], mirrored from the backoff
/// table the orchestrator keeps per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// A client connection to one remote peer, reconnected on demand.
pub struct SyncClient {
    config: ClientConfig,
    conn: Option<Connection>,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    selected_compression: bool,
}

impl SyncClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, conn: None }
    }

    pub fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Connects (if not already) and performs the handshake.
    pub async fn ensure_connected(&mut self, addr: &str) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let socket_ref = socket2::SockRef::from(&stream);
        socket_ref.set_keepalive(true)?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        let req = HandshakeReq {
            node_id: self.config.node_id.clone(),
            auth_token: self.config.auth_token.clone(),
            supported_compression: vec!["brotli".to_string()],
        };
        write_frame(&mut writer, &Frame::new(MessageType::HandshakeReq, serde_json::to_vec(&req)?), false).await?;

        let frame = read_frame(&mut reader).await?;
        let res: HandshakeRes = serde_json::from_slice(&frame.payload)?;
        if !res.accepted {
            return Err(Error::HandshakeRejected(res.node_id));
        }

        let selected_compression = res.selected_compression.is_some() && self.config.compression_enabled;
        self.conn = Some(Connection { reader, writer, selected_compression });
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.conn = None;
    }

    pub async fn get_clock(&mut self) -> Result<Hlc> {
        let res: ClockRes = self.roundtrip(MessageType::GetClockReq, &GetClockReq).await?;
        Ok(res.0)
    }

    pub async fn get_vector_clock(&mut self) -> Result<VectorClock> {
        let res: VectorClockRes = self.roundtrip(MessageType::GetVectorClockReq, &GetVectorClockReq).await?;
        Ok(res.0)
    }

    pub async fn pull_changes(&mut self, node_id: &str, since: &Hlc) -> Result<Vec<OplogEntry>> {
        let req = PullChangesReq { node_id: node_id.to_string(), since_phys: since.physical, since_log: since.logical };
        let res: ChangeSetRes = self.roundtrip(MessageType::PullChangesReq, &req).await?;
        Ok(res.entries)
    }

    pub async fn push_changes(&mut self, entries: Vec<OplogEntry>) -> Result<AckRes> {
        let req = PushChangesReq { entries };
        self.roundtrip(MessageType::PushChangesReq, &req).await
    }

    pub async fn get_chain_range(&mut self, node_id: &str, start_hash: &str, end_hash: &str) -> Result<ChainRangeRes> {
        let req = GetChainRangeReq { node_id: node_id.to_string(), start_hash: start_hash.to_string(), end_hash: end_hash.to_string() };
        self.roundtrip(MessageType::GetChainRangeReq, &req).await
    }

    /// Downloads a full snapshot to `dest`, writing each streamed chunk
    /// as it arrives.
    pub async fn download_snapshot(&mut self, dest: &std::path::Path) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(|| Error::NotConnected(self.config.node_id.clone()))?;

        let payload = serde_json::to_vec(&GetSnapshotReq)?;
        write_frame(&mut conn.writer, &Frame::new(MessageType::GetSnapshotReq, payload), conn.selected_compression)
            .await?;

        let mut file = tokio::fs::File::create(dest).await?;
        loop {
            let frame = read_frame(&mut conn.reader).await?;
            let chunk: SnapshotChunkMsg = serde_json::from_slice(&frame.payload)?;
            file.write_all(&chunk.data).await?;
            if chunk.is_last {
                break;
            }
        }
        file.flush().await?;
        Ok(())
    }

    async fn roundtrip<Req, Res>(&mut self, message_type: MessageType, req: &Req) -> Result<Res>
    where
        Req: serde::Serialize,
        Res: serde::de::DeserializeOwned,
    {
        let conn = self.conn.as_mut().ok_or_else(|| Error::NotConnected(self.config.node_id.clone()))?;
        let payload = serde_json::to_vec(req)?;
        let timeout = self.config.request_timeout;

        let write_result = tokio::time::timeout(
            timeout,
            write_frame(&mut conn.writer, &Frame::new(message_type, payload), conn.selected_compression),
        )
        .await;
        match write_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.conn = None;
                return Err(e.into());
            }
            Err(_) => {
                self.conn = None;
                return Err(Error::Timeout(timeout));
            }
        }

        let conn = self.conn.as_mut().ok_or_else(|| Error::NotConnected(self.config.node_id.clone()))?;
        let read_result = tokio::time::timeout(timeout, read_frame(&mut conn.reader)).await;
        let frame = match read_result {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                self.conn = None;
                return Err(e.into());
            }
            Err(_) => {
                self.conn = None;
                return Err(Error::Timeout(timeout));
            }
        };

        serde_json::from_slice(&frame.payload).map_err(Error::from)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
