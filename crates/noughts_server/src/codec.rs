//! Length-prefixed JSON frames.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! JSON.

use crate::error::ServerError;
use crate::protocol::Request;
use derive_more::{Display, Error};
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{instrument, trace};

/// Default upper bound on a frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Transport-level framing failure. Fatal to the connection.
#[derive(Debug, Display, Error)]
pub enum CodecError {
    /// Socket error.
    #[display("I/O error: {}", _0)]
    Io(io::Error),
    /// Announced body exceeds the configured limit.
    #[display("Frame of {} bytes exceeds limit of {} bytes", len, max)]
    FrameTooLarge {
        /// Announced length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
    /// Outbound message could not be encoded.
    #[display("Encode error: {}", _0)]
    Encode(serde_json::Error),
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err)
    }
}

/// Reads one frame body. Returns `None` on a clean end of stream.
///
/// # Errors
///
/// Fails on I/O errors, on a stream cut mid-frame, and on oversized frames.
#[instrument(skip(reader))]
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > max_len {
        return Err(CodecError::FrameTooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    trace!(len, "Frame read");
    Ok(Some(body))
}

/// Encodes `message` as JSON and writes it as one frame.
///
/// # Errors
///
/// Fails on I/O or encoding errors.
#[instrument(skip(writer, message))]
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_u32(len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    trace!(len, "Frame written");
    Ok(())
}

/// Decodes a frame body into a request.
///
/// # Errors
///
/// A body that is not a valid request is a validation error; the connection
/// stays usable.
pub fn decode_request(body: &[u8]) -> Result<Request, ServerError> {
    serde_json::from_slice(body)
        .map_err(|e| ServerError::validation(format!("Malformed request: {}", e)))
}
