//! BitTorrent protocol messages
//!
//! Every message except keep-alive is `<u32 length><u8 id><payload>`, with
//! all integers big-endian and the length covering id and payload.

use bytes::{Buf, BufMut, BytesMut};
use tracing::{error, trace};

use crate::protocol::error::ProtocolError;

/// BitTorrent message IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
}

impl TryFrom<u8> for MessageId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            9 => Ok(MessageId::Port),
            _ => {
                error!("Invalid message ID: {}", value);
                Err(ProtocolError::InvalidMessageId(value))
            }
        }
    }
}

/// BitTorrent protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece_index: u32 },
    Bitfield { bitfield: Vec<u8> },
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, block: Vec<u8> },
    Cancel { index: u32, begin: u32, length: u32 },
    Port { listen_port: u16 },
}

impl Message {
    /// Get the message ID (returns None for KeepAlive)
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Message::Choke => Some(MessageId::Choke),
            Message::Unchoke => Some(MessageId::Unchoke),
            Message::Interested => Some(MessageId::Interested),
            Message::NotInterested => Some(MessageId::NotInterested),
            Message::Have { .. } => Some(MessageId::Have),
            Message::Bitfield { .. } => Some(MessageId::Bitfield),
            Message::Request { .. } => Some(MessageId::Request),
            Message::Piece { .. } => Some(MessageId::Piece),
            Message::Cancel { .. } => Some(MessageId::Cancel),
            Message::Port { .. } => Some(MessageId::Port),
            Message::KeepAlive => None,
        }
    }

    /// Message name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Message::KeepAlive => "KEEP_ALIVE",
            Message::Choke => "CHOKE",
            Message::Unchoke => "UNCHOKE",
            Message::Interested => "INTERESTED",
            Message::NotInterested => "NOT_INTERESTED",
            Message::Have { .. } => "HAVE",
            Message::Bitfield { .. } => "BITFIELD",
            Message::Request { .. } => "REQUEST",
            Message::Piece { .. } => "PIECE",
            Message::Cancel { .. } => "CANCEL",
            Message::Port { .. } => "PORT",
        }
    }

    /// Get the message length (excluding the length prefix)
    pub fn length(&self) -> u32 {
        match self {
            Message::KeepAlive => 0,
            Message::Choke | Message::Unchoke | Message::Interested | Message::NotInterested => 1,
            Message::Have { .. } => 5,
            Message::Bitfield { bitfield } => 1 + bitfield.len() as u32,
            Message::Request { .. } | Message::Cancel { .. } => 13,
            Message::Piece { block, .. } => 9 + block.len() as u32,
            Message::Port { .. } => 3,
        }
    }

    /// Serialize the message to bytes (including length prefix)
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(4 + self.length() as usize);
        buf.put_u32(self.length());

        if let Some(id) = self.message_id() {
            buf.put_u8(id as u8);
        }

        match self {
            Message::Have { piece_index } => buf.put_u32(*piece_index),
            Message::Bitfield { bitfield } => buf.put_slice(bitfield),
            Message::Request { index, begin, length } | Message::Cancel { index, begin, length } => {
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Piece { index, begin, block } => {
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_slice(block);
            }
            Message::Port { listen_port } => buf.put_u16(*listen_port),
            _ => {}
        }

        trace!("Serialized {} message: {} bytes", self.name(), buf.len());
        buf.to_vec()
    }

    /// Deserialize a message from bytes (including length prefix)
    pub fn deserialize(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = data;
        if buf.remaining() < 4 {
            return Err(ProtocolError::MessageTooShort {
                kind: "framed",
                expected: 4,
                actual: buf.remaining(),
            });
        }

        let declared = buf.get_u32() as usize;
        if declared != buf.remaining() {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: buf.remaining(),
            });
        }

        Self::parse(buf)
    }

    /// Parse a frame body (`<id><payload>`, no length prefix).
    ///
    /// An empty body is a keep-alive.
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = body;
        if !buf.has_remaining() {
            return Ok(Message::KeepAlive);
        }

        let message_id = MessageId::try_from(buf.get_u8())?;

        let need = |kind: &'static str, expected: usize, buf: &&[u8]| {
            if buf.remaining() < expected {
                error!("{} message too short: expected {} bytes, got {}", kind, expected, buf.remaining());
                Err(ProtocolError::MessageTooShort {
                    kind,
                    expected,
                    actual: buf.remaining(),
                })
            } else {
                Ok(())
            }
        };

        let message = match message_id {
            MessageId::Choke => Message::Choke,
            MessageId::Unchoke => Message::Unchoke,
            MessageId::Interested => Message::Interested,
            MessageId::NotInterested => Message::NotInterested,
            MessageId::Have => {
                need("HAVE", 4, &buf)?;
                Message::Have { piece_index: buf.get_u32() }
            }
            MessageId::Bitfield => Message::Bitfield { bitfield: buf.to_vec() },
            MessageId::Request => {
                need("REQUEST", 12, &buf)?;
                Message::Request {
                    index: buf.get_u32(),
                    begin: buf.get_u32(),
                    length: buf.get_u32(),
                }
            }
            MessageId::Piece => {
                need("PIECE", 8, &buf)?;
                let index = buf.get_u32();
                let begin = buf.get_u32();
                Message::Piece {
                    index,
                    begin,
                    block: buf.to_vec(),
                }
            }
            MessageId::Cancel => {
                need("CANCEL", 12, &buf)?;
                Message::Cancel {
                    index: buf.get_u32(),
                    begin: buf.get_u32(),
                    length: buf.get_u32(),
                }
            }
            MessageId::Port => {
                need("PORT", 2, &buf)?;
                Message::Port { listen_port: buf.get_u16() }
            }
        };

        trace!("Parsed {} message", message.name());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_is_four_zero_bytes() {
        assert_eq!(Message::KeepAlive.serialize(), vec![0, 0, 0, 0]);
        assert_eq!(Message::deserialize(&[0, 0, 0, 0]).unwrap(), Message::KeepAlive);
    }

    #[test]
    fn test_interested_wire_format() {
        assert_eq!(Message::Interested.serialize(), vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_request_wire_format() {
        let bytes = Message::Request { index: 1, begin: 16384, length: 16384 }.serialize();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 13, 6, 0, 0, 0, 1, 0, 0, 0x40, 0, 0, 0, 0x40, 0]
        );
    }

    #[test]
    fn test_piece_parse() {
        let bytes = [0, 0, 0, 12, 7, 0, 0, 0, 3, 0, 0, 0x40, 0, 0xaa, 0xbb, 0xcc];
        assert_eq!(
            Message::deserialize(&bytes).unwrap(),
            Message::Piece { index: 3, begin: 16384, block: vec![0xaa, 0xbb, 0xcc] }
        );
    }

    #[test]
    fn test_have_parse() {
        assert_eq!(
            Message::parse(&[4, 0, 0, 1, 0]).unwrap(),
            Message::Have { piece_index: 256 }
        );
    }

    #[test]
    fn test_bitfield_round_trip() {
        let message = Message::Bitfield { bitfield: vec![0b1010_0000, 0xff] };
        assert_eq!(Message::deserialize(&message.serialize()).unwrap(), message);
    }

    #[test]
    fn test_short_payloads_rejected() {
        assert!(matches!(
            Message::parse(&[4, 0, 0]),
            Err(ProtocolError::MessageTooShort { kind: "HAVE", .. })
        ));
        assert!(matches!(
            Message::parse(&[7, 0, 0, 0, 1]),
            Err(ProtocolError::MessageTooShort { kind: "PIECE", .. })
        ));
        assert!(matches!(
            Message::parse(&[6, 0, 0, 0, 1, 0, 0, 0, 0]),
            Err(ProtocolError::MessageTooShort { kind: "REQUEST", .. })
        ));
    }

    #[test]
    fn test_invalid_id() {
        assert_eq!(Message::parse(&[20]), Err(ProtocolError::InvalidMessageId(20)));
        assert!(MessageId::try_from(10).is_err());
        assert_eq!(MessageId::try_from(7).unwrap(), MessageId::Piece);
    }

    #[test]
    fn test_length_prefix_mismatch() {
        assert_eq!(
            Message::deserialize(&[0, 0, 0, 5, 1]),
            Err(ProtocolError::LengthMismatch { declared: 5, actual: 1 })
        );
    }

    #[test]
    fn test_message_length() {
        assert_eq!(Message::KeepAlive.length(), 0);
        assert_eq!(Message::Choke.length(), 1);
        assert_eq!(Message::Have { piece_index: 0 }.length(), 5);
        assert_eq!(Message::Request { index: 0, begin: 0, length: 0 }.length(), 13);
        assert_eq!(Message::Piece { index: 0, begin: 0, block: vec![1, 2, 3] }.length(), 12);
        assert_eq!(Message::Port { listen_port: 0 }.length(), 3);
    }

    #[test]
    fn test_message_names() {
        assert_eq!(Message::Cancel { index: 0, begin: 0, length: 0 }.name(), "CANCEL");
        assert_eq!(Message::KeepAlive.message_id(), None);
        assert_eq!(Message::Port { listen_port: 1 }.message_id(), Some(MessageId::Port));
    }
}
