//! BitTorrent handshake protocol
//!
//! Handles the initial handshake between peers.

use bytes::{BufMut, BytesMut};
use rand::Rng;
use tracing::{debug, error, info, trace, warn};

use crate::protocol::error::HandshakeError;

/// BitTorrent protocol identifier string
pub const PROTOCOL_STRING: &[u8; 19] = b"BitTorrent protocol";

/// Length of the protocol string
pub const PROTOCOL_LENGTH: u8 = 19;

/// Size of a serialized handshake
pub const HANDSHAKE_LENGTH: usize = 68;

const INFO_HASH_OFFSET: usize = 28;
const PEER_ID_OFFSET: usize = 48;

/// Client tag prefixed to generated peer ids
const PEER_ID_PREFIX: &[u8; 8] = b"-RL0100-";

/// BitTorrent handshake message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Reserved extension bytes, all zero when we send
    pub reserved: [u8; 8],
    /// Torrent info hash
    pub info_hash: [u8; 20],
    /// Sender's peer ID
    pub peer_id: [u8; 20],
}

impl Handshake {
    /// Create a new handshake with info_hash and peer_id
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        debug!("Creating new handshake for info_hash: {}", hex::encode(info_hash));
        Self {
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    /// Generate a peer ID: client tag followed by 12 random ASCII digits
    pub fn generate_peer_id() -> [u8; 20] {
        let mut rng = rand::thread_rng();
        let mut peer_id = [0u8; 20];
        peer_id[..8].copy_from_slice(PEER_ID_PREFIX);
        for byte in &mut peer_id[8..] {
            *byte = b'0' + rng.gen_range(0..10u8);
        }
        info!("Generated new peer ID: {}", String::from_utf8_lossy(&peer_id));
        peer_id
    }

    /// Serialize the handshake to bytes
    pub fn serialize(&self) -> Vec<u8> {
        trace!("Serializing handshake");
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LENGTH);
        buf.put_u8(PROTOCOL_LENGTH);
        buf.put_slice(PROTOCOL_STRING);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.to_vec()
    }

    /// Deserialize a handshake from bytes
    pub fn deserialize(data: &[u8]) -> Result<Self, HandshakeError> {
        trace!("Deserializing handshake from {} bytes", data.len());

        if data.len() < HANDSHAKE_LENGTH {
            error!("Handshake data too short: expected {} bytes, got {}", HANDSHAKE_LENGTH, data.len());
            return Err(HandshakeError::NoResponse);
        }

        let protocol_length = data[0];
        if protocol_length != PROTOCOL_LENGTH || &data[1..20] != PROTOCOL_STRING {
            error!("Invalid protocol header (pstrlen {})", protocol_length);
            return Err(HandshakeError::InvalidProtocol(protocol_length));
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..INFO_HASH_OFFSET]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[INFO_HASH_OFFSET..PEER_ID_OFFSET]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[PEER_ID_OFFSET..HANDSHAKE_LENGTH]);
        debug!("Handshake peer_id: {}", hex::encode(peer_id));

        Ok(Self {
            reserved,
            info_hash,
            peer_id,
        })
    }

    /// Check the remote info hash against ours
    pub fn validate(&self, expected_info_hash: &[u8; 20]) -> Result<(), HandshakeError> {
        if self.info_hash != *expected_info_hash {
            warn!("Handshake validation failed: info hash mismatch");
            return Err(HandshakeError::InfoHashMismatch {
                expected: hex::encode(expected_info_hash),
                received: hex::encode(self.info_hash),
            });
        }

        debug!("Handshake validation successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_layout() {
        let handshake = Handshake::new([1u8; 20], [2u8; 20]);
        let bytes = handshake.serialize();

        assert_eq!(bytes.len(), HANDSHAKE_LENGTH);
        assert_eq!(bytes[0], 0x13);
        assert_eq!(&bytes[1..20], b"BitTorrent protocol");
        assert_eq!(&bytes[20..28], &[0u8; 8]);
        assert_eq!(&bytes[28..48], &[1u8; 20]);
        assert_eq!(&bytes[48..68], &[2u8; 20]);
    }

    #[test]
    fn test_handshake_deserialize() {
        let bytes = Handshake::new([1u8; 20], [2u8; 20]).serialize();
        let parsed = Handshake::deserialize(&bytes).unwrap();
        assert_eq!(parsed.info_hash, [1u8; 20]);
        assert_eq!(parsed.peer_id, [2u8; 20]);
    }

    #[test]
    fn test_handshake_deserialize_short() {
        assert!(matches!(Handshake::deserialize(&[0x13; 40]), Err(HandshakeError::NoResponse)));
        assert!(matches!(Handshake::deserialize(&[]), Err(HandshakeError::NoResponse)));
    }

    #[test]
    fn test_handshake_deserialize_wrong_protocol() {
        let mut bytes = Handshake::new([1u8; 20], [2u8; 20]).serialize();
        bytes[5] = b'x';
        assert!(matches!(Handshake::deserialize(&bytes), Err(HandshakeError::InvalidProtocol(19))));
    }

    #[test]
    fn test_generate_peer_id() {
        let peer_id = Handshake::generate_peer_id();
        assert_eq!(&peer_id[..8], b"-RL0100-");
        assert!(peer_id[8..].iter().all(u8::is_ascii_digit));
    }

    #[test]
    fn test_handshake_validate() {
        let handshake = Handshake::new([1u8; 20], [2u8; 20]);
        assert!(handshake.validate(&[1u8; 20]).is_ok());
        assert!(matches!(
            handshake.validate(&[3u8; 20]),
            Err(HandshakeError::InfoHashMismatch { .. })
        ));
    }
}
