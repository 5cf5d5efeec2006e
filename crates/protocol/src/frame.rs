// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Frame codec: `[u32 length][u8 type][u8 flags][payload]` over an async
//! byte stream. `length` counts the type byte, the flags byte, and the
//! payload that follows.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::message::MessageType;

/// Frames above this size are refused outright; a misbehaving or
/// malicious peer should not be able to force an unbounded allocation.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Payloads at or above this size are eligible for Brotli compression,
/// provided both peers advertised support during the handshake.
pub const COMPRESSION_THRESHOLD: usize = 4 * 1024;

const FLAG_COMPRESSED: u8 = 0b0000_0001;

const BROTLI_QUALITY: u32 = 5;
const BROTLI_LG_WINDOW_SIZE: u32 = 22;

/// A decoded frame: message type, whether it traveled compressed on
/// the wire, and the (already decompressed) payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_type: MessageType,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(message_type: MessageType, payload: Vec<u8>) -> Self {
        Self { message_type, payload }
    }
}

/// Write `frame` to `writer`, compressing the payload first when
/// `compression_enabled` is set and the payload clears
/// [`COMPRESSION_THRESHOLD`].
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
    compression_enabled: bool,
) -> Result<()> {
    let (flags, body) = if compression_enabled && frame.payload.len() >= COMPRESSION_THRESHOLD {
        (FLAG_COMPRESSED, compress(&frame.payload)?)
    } else {
        (0u8, frame.payload.clone())
    };

    let length = u32::try_from(body.len() + 2)
        .map_err(|_| Error::FrameTooLarge(u32::MAX, MAX_FRAME_SIZE))?;
    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(length, MAX_FRAME_SIZE));
    }

    writer.write_all(&length.to_be_bytes()).await?;
    writer.write_all(&[frame.message_type.as_byte(), flags]).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from `reader`, decompressing the payload if the
/// wire-level compressed flag is set.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let length = u32::from_be_bytes(len_buf);

    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(length, MAX_FRAME_SIZE));
    }
    if length < 2 {
        return Err(Error::MalformedFrame(format!(
            "frame length {length} is too short to hold a type and flags byte"
        )));
    }

    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;
    let message_type = MessageType::from_byte(header[0]).ok_or(Error::UnknownMessageType(header[0]))?;
    let flags = header[1];

    let body_len = (length - 2) as usize;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;

    let payload = if flags & FLAG_COMPRESSED != 0 {
        decompress(&body)?
    } else {
        body
    };

    Ok(Frame { message_type, payload })
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: BROTLI_QUALITY as i32,
        lgwin: BROTLI_LG_WINDOW_SIZE as i32,
        ..Default::default()
    };
    brotli::BrotliCompress(&mut io::Cursor::new(data), &mut out, &params)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(out)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut io::Cursor::new(data), &mut out)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
