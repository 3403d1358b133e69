//! Frame I/O over async byte streams.
//!
//! Works on any `AsyncRead`/`AsyncWrite`: tokio TCP streams in production,
//! turmoil streams in simulation, in-memory duplex pipes in tests.

use gavel_proto::{FrameHeader, decode_payload, encode_frame};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

/// Encode `value` as one frame and write it.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = Vec::new();
    encode_frame(value, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode its payload.
///
/// Returns `Ok(None)` if the peer closed the stream cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, TransportError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];
    let mut filled = 0;
    while filled < FrameHeader::SIZE {
        let n = reader.read(&mut header_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::UnexpectedEof);
        }
        filled += n;
    }

    let header = FrameHeader::from_bytes(&header_buf)?;
    let mut payload = vec![0u8; header.payload_len()];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => TransportError::UnexpectedEof,
        _ => TransportError::Io(e),
    })?;

    Ok(Some(decode_payload(&payload)?))
}
