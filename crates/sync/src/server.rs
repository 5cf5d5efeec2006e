// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync Server: accepts peer connections over raw TCP, runs each
//! through the `Accept → Handshake →
//! Authenticated → serve → Close` state machine, and routes requests
//! to the store. `Get*` requests are read-only; `PushChangesReq` is the
//! only path that mutates state, via `apply_batch`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use entgl_core::{ConflictResolver, Hlc};
use entgl_protocol::message::{
    AckRes, ChainRangeRes, ChangeSetRes, ClockRes, GetChainRangeReq, GetClockReq,
    GetVectorClockReq, HandshakeReq, HandshakeRes, MessageType, PullChangesReq, PushChangesReq,
    SnapshotChunkMsg, VectorClockRes,
};
use entgl_protocol::{read_frame, write_frame, Frame, COMPRESSION_THRESHOLD};
use entgl_store::SqliteStore;
use tokio::io::{AsyncReadExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::Metrics;

/// Byte length of the largest chunk we hand back for `GetSnapshotReq`.
const SNAPSHOT_CHUNK_SIZE: usize = 80 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub node_id: String,
    pub auth_token: String,
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub compression_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            auth_token: String::new(),
            max_connections: 100,
            idle_timeout: Duration::from_secs(60),
            compression_enabled: true,
        }
    }
}

pub struct SyncServer {
    store: SqliteStore,
    resolver: ConflictResolver,
    config: ServerConfig,
    metrics: Metrics,
}

impl SyncServer {
    pub fn new(store: SqliteStore, resolver: ConflictResolver, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self { store, resolver, config, metrics: Metrics::new() })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Runs the accept loop until `cancel` fires. Connections past
    /// `max_connections` are refused immediately.
    pub async fn run(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sync server stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = accepted?;
                    self.dispatch(stream, peer_addr, semaphore.clone(), cancel.clone());
                }
            }
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
        semaphore: Arc<Semaphore>,
        cancel: CancellationToken,
    ) {
        let permit = semaphore.try_acquire_owned();
        let permit = match permit {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.record_connection_rejected();
                warn!(%peer_addr, "connection cap reached, rejecting");
                return;
            }
        };
        self.metrics.record_connection_accepted();

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = this.handle_connection(stream, peer_addr, cancel).await {
                warn!(%peer_addr, error = %e, "connection ended with error");
            }
        });
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<()> {
        stream.set_nodelay(true)?;
        let socket_ref = socket2::SockRef::from(&stream);
        socket_ref.set_keepalive(true)?;

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);

        let node_id = match self.handshake(&mut reader, &mut writer).await? {
            Some(node_id) => node_id,
            None => return Ok(()),
        };
        info!(%peer_addr, peer_node = %node_id, "peer authenticated");

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                frame = tokio::time::timeout(self.config.idle_timeout, read_frame(&mut reader)) => {
                    match frame {
                        Ok(Ok(frame)) => frame,
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => {
                            debug!(%peer_addr, "idle timeout, closing connection");
                            return Ok(());
                        }
                    }
                }
            };

            self.metrics.record_bytes_in(frame.payload.len() as u64);

            if frame.message_type == MessageType::GetSnapshotReq {
                self.stream_snapshot(&mut writer).await?;
                continue;
            }

            let response = self.serve_request(frame).await?;
            self.metrics.record_bytes_out(response.payload.len() as u64);
            self.metrics
                .record_frame_compression(self.config.compression_enabled && response.payload.len() >= COMPRESSION_THRESHOLD);
            write_frame(&mut writer, &response, self.config.compression_enabled).await?;
        }
    }

    async fn handshake<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<Option<String>>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let started = tokio::time::Instant::now();
        let frame = read_frame(reader).await?;
        if frame.message_type != MessageType::HandshakeReq {
            return Err(Error::UnexpectedResponse("expected HandshakeReq".into()));
        }
        let req: HandshakeReq = serde_json::from_slice(&frame.payload)?;

        let accepted = req.auth_token == self.config.auth_token;
        let selected_compression =
            if accepted && self.config.compression_enabled && req.supported_compression.iter().any(|c| c == "brotli") {
                Some("brotli".to_string())
            } else {
                None
            };

        let res = HandshakeRes { node_id: self.config.node_id.clone(), accepted, selected_compression };
        let payload = serde_json::to_vec(&res)?;
        write_frame(writer, &Frame::new(MessageType::HandshakeRes, payload), false).await?;
        self.metrics.record_handshake(started.elapsed());

        if !accepted {
            warn!(peer_node = %req.node_id, "handshake rejected: bad auth token");
            return Ok(None);
        }
        Ok(Some(req.node_id))
    }

    async fn serve_request(&self, frame: Frame) -> Result<Frame> {
        match frame.message_type {
            MessageType::GetClockReq => {
                let _req: GetClockReq = serde_json::from_slice(&frame.payload)?;
                let ts = self.store.latest_timestamp()?.unwrap_or_else(Hlc::min);
                Ok(Frame::new(MessageType::ClockRes, serde_json::to_vec(&ClockRes(ts))?))
            }
            MessageType::GetVectorClockReq => {
                let _req: GetVectorClockReq = serde_json::from_slice(&frame.payload)?;
                let vc = self.store.vector_clock()?;
                Ok(Frame::new(MessageType::VectorClockRes, serde_json::to_vec(&VectorClockRes(vc))?))
            }
            MessageType::PullChangesReq => {
                let req: PullChangesReq = serde_json::from_slice(&frame.payload)?;
                let since = Hlc::new(req.since_phys, req.since_log, req.node_id.clone());
                let entries = self.store.oplog_for_node_after(&req.node_id, &since)?;
                Ok(Frame::new(MessageType::ChangeSetRes, serde_json::to_vec(&ChangeSetRes { entries })?))
            }
            MessageType::PushChangesReq => {
                let req: PushChangesReq = serde_json::from_slice(&frame.payload)?;
                let outcome = self.store.apply_batch(self.resolver, &req.entries);
                let res = match outcome {
                    Ok(_) => AckRes { success: true, snapshot_required: false },
                    Err(entgl_store::Error::CorruptDatabase(_)) => AckRes { success: false, snapshot_required: true },
                    Err(e) => return Err(e.into()),
                };
                Ok(Frame::new(MessageType::AckRes, serde_json::to_vec(&res)?))
            }
            MessageType::GetChainRangeReq => {
                let req: GetChainRangeReq = serde_json::from_slice(&frame.payload)?;
                let range = self.store.chain_range(&req.node_id, &req.start_hash, &req.end_hash)?;
                let (entries, snapshot_required) = match range {
                    Some(entries) => (Some(entries), false),
                    None => (None, true),
                };
                Ok(Frame::new(MessageType::ChainRangeRes, serde_json::to_vec(&ChainRangeRes { entries, snapshot_required })?))
            }
            other => Err(Error::UnexpectedResponse(format!("{other:?} is not a valid request from a peer"))),
        }
    }

    /// Streams a consistent snapshot of the store to `writer` in
    /// `SNAPSHOT_CHUNK_SIZE` chunks, terminated by an `is_last` chunk.
    pub async fn stream_snapshot<W: tokio::io::AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let tmp = tempfile::NamedTempFile::new()?;
        self.store.create_snapshot(tmp.path())?;

        let mut file = tokio::fs::File::open(tmp.path()).await?;
        let mut buf = vec![0u8; SNAPSHOT_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            let is_last = n < SNAPSHOT_CHUNK_SIZE;
            let chunk = SnapshotChunkMsg { data: buf[..n].to_vec(), is_last };
            let payload = serde_json::to_vec(&chunk)?;
            write_frame(writer, &Frame::new(MessageType::SnapshotChunkMsg, payload), self.config.compression_enabled)
                .await?;
            if is_last {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
