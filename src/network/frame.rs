//! Length-Prefixed Framing
//!
//! Each frame is a 4-byte little-endian payload length followed by exactly
//! that many bytes. Zero-length and oversize frames end the connection.

use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Framing failures. Every variant ends the connection.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Peer closed the stream between frames.
    #[error("connection closed")]
    Closed,

    /// Stream ended inside a frame.
    #[error("truncated frame: expected {expected} bytes")]
    Truncated { expected: usize },

    #[error("empty frame")]
    Empty,

    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one frame payload.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(header) as usize;
    if len == 0 {
        return Err(FrameError::Empty);
    }
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(payload),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            Err(FrameError::Truncated { expected: len })
        }
        Err(e) => Err(e.into()),
    }
}

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_len: usize) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    if payload.len() > max_len {
        return Err(FrameError::TooLarge { len: payload.len(), max: max_len });
    }

    let header = (payload.len() as u32).to_le_bytes();
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
