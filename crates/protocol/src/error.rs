use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] entgl_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(u32, u32),
    #[error("unknown message type byte: {0}")]
    UnknownMessageType(u8),
    #[error("payload does not match message type {0:?}")]
    PayloadMismatch(MessageType),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compression(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use crate::message::MessageType;
