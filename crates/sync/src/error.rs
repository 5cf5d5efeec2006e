use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] entgl_core::Error),
    #[error(transparent)]
    Store(#[from] entgl_store::Error),
    #[error(transparent)]
    Protocol(#[from] entgl_protocol::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("handshake rejected by peer {0}")]
    HandshakeRejected(String),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("peer requires a snapshot merge before sync can continue")]
    SnapshotRequired,
    #[error("local database is corrupt and needs emergency replacement: {0}")]
    CorruptDatabase(String),
    #[error("not connected to peer {0}")]
    NotConnected(String),
    #[error("unexpected response from peer: {0}")]
    UnexpectedResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
