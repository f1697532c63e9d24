//! Wire protocol utilities
//!
//! Framing over any `AsyncRead`/`AsyncWrite` byte stream.

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::{Handshake, HandshakeError, Message, ProtocolError, HANDSHAKE_LENGTH};

/// Largest frame body accepted from a peer
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// Read one length-prefixed message from the stream
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    let mut length_buf = [0u8; 4];
    reader.read_exact(&mut length_buf).await?;
    let length = u32::from_be_bytes(length_buf) as usize;

    if length == 0 {
        trace!("Read keep-alive frame");
        return Ok(Message::KeepAlive);
    }

    if length > MAX_FRAME_LENGTH {
        return Err(ProtocolError::MessageTooLarge(length).into());
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    trace!("Read frame of {} bytes", length);

    Ok(Message::parse(&body)?)
}

/// Write a message to the stream and flush it
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Message) -> Result<()> {
    writer.write_all(&message.serialize()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one 68-byte handshake.
///
/// A connection that closes before 68 bytes arrive yields
/// [`HandshakeError::NoResponse`].
pub async fn read_handshake<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Handshake, HandshakeError> {
    let mut buf = [0u8; HANDSHAKE_LENGTH];
    match reader.read_exact(&mut buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("Peer closed the connection during handshake");
            return Err(HandshakeError::NoResponse);
        }
        Err(e) => return Err(HandshakeError::Io(e)),
    }

    Handshake::deserialize(&buf)
}

/// Write a handshake to the stream and flush it
pub async fn write_handshake<W: AsyncWrite + Unpin>(writer: &mut W, handshake: &Handshake) -> Result<(), HandshakeError> {
    writer.write_all(&handshake.serialize()).await?;
    writer.flush().await?;
    Ok(())
}
