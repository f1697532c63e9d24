//! Announce response decoding
//!
//! Trackers answer with a bencoded dictionary. Peers come either as a compact
//! byte string of 6-byte records or as a list of `{ip, peer id, port}`
//! dictionaries.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use num_bigint::Sign;
use tracing::{debug, error, warn};

use crate::bencode::{self, Value};
use crate::peer::{PeerInfo, COMPACT_PEER_LENGTH};
use crate::tracker::error::TrackerError;

/// Interval reported when the tracker could not be reached
pub const RETRY_NEVER: Duration = Duration::MAX;

/// Result of one announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    pub peers: Vec<PeerInfo>,
    pub interval: Duration,
}

impl AnnounceResponse {
    pub fn new(peers: Vec<PeerInfo>, interval: Duration) -> Self {
        Self { peers, interval }
    }

    /// Empty answer for a tracker that replied with a non-2xx status.
    ///
    /// The interval is [`RETRY_NEVER`]; callers compare elapsed time against
    /// it and must not add it to an instant.
    pub fn unavailable() -> Self {
        Self {
            peers: Vec::new(),
            interval: RETRY_NEVER,
        }
    }

    /// Whether this is the sentinel produced by [`AnnounceResponse::unavailable`]
    pub fn is_unavailable(&self) -> bool {
        self.interval == RETRY_NEVER
    }
}

/// Decode a bencoded announce response body
pub fn parse_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = bencode::decode(body).map_err(|e| {
        error!("Tracker response is not valid bencode: {}", e);
        TrackerError::Decode(e)
    })?;

    if value.as_dict().is_none() {
        return Err(TrackerError::InvalidResponse(format!(
            "expected dictionary, got {}",
            value.kind()
        )));
    }

    if let Some(reason) = value.get(b"failure reason") {
        let reason = String::from_utf8_lossy(reason.as_bytes().unwrap_or_default()).into_owned();
        warn!("Tracker reported failure: {}", reason);
        return Err(TrackerError::Failure(reason));
    }

    let interval = value
        .get(b"interval")
        .and_then(Value::as_integer)
        .ok_or_else(|| TrackerError::InvalidResponse("missing interval".into()))?;
    if interval.sign() == Sign::Minus {
        return Err(TrackerError::InvalidResponse(format!("negative interval {}", interval)));
    }
    // Anything past u64 seconds means "never" in practice.
    let interval = u64::try_from(interval).unwrap_or(u64::MAX);

    let peers = match value.get(b"peers") {
        None => Vec::new(),
        Some(Value::Bytes(bytes)) => parse_compact_peers(bytes)?,
        Some(Value::List(entries)) => parse_peer_dicts(entries),
        Some(other) => {
            return Err(TrackerError::InvalidResponse(format!(
                "peers must be a byte string or list, got {}",
                other.kind()
            )))
        }
    };

    debug!("Tracker returned {} peers, interval {}s", peers.len(), interval);
    Ok(AnnounceResponse::new(peers, Duration::from_secs(interval)))
}

/// Decode a compact peer list: 4 bytes IPv4 then 2 bytes port, big-endian
pub fn parse_compact_peers(bytes: &[u8]) -> Result<Vec<PeerInfo>, TrackerError> {
    if bytes.len() % COMPACT_PEER_LENGTH != 0 {
        error!("Compact peer list has invalid length {}", bytes.len());
        return Err(TrackerError::MalformedPeerList(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(COMPACT_PEER_LENGTH)
        .map(|chunk| {
            let mut record = [0u8; COMPACT_PEER_LENGTH];
            record.copy_from_slice(chunk);
            PeerInfo::from_compact(&record)
        })
        .collect())
}

fn parse_peer_dicts(entries: &[Value]) -> Vec<PeerInfo> {
    let mut peers = Vec::with_capacity(entries.len());
    for entry in entries {
        let ip = entry
            .get(b"ip")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<IpAddr>().ok());
        let port = entry
            .get(b"port")
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok());

        let (Some(ip), Some(port)) = (ip, port) else {
            warn!("Skipping tracker peer entry without a usable ip/port");
            continue;
        };

        let addr = SocketAddr::new(ip, port);
        let peer_id = entry
            .get(b"peer id")
            .and_then(Value::as_bytes)
            .and_then(|id| <[u8; 20]>::try_from(id).ok());

        peers.push(match peer_id {
            Some(id) => PeerInfo::with_peer_id(addr, id),
            None => PeerInfo::new(addr),
        });
    }
    peers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{encode, BigInt};

    #[test]
    fn test_compact_peer_record() {
        let peers = parse_compact_peers(&[192, 168, 1, 1, 0x1A, 0xE1]).unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].addr, "192.168.1.1:6881".parse::<SocketAddr>().unwrap());
        assert!(peers[0].peer_id.is_none());
    }

    #[test]
    fn test_compact_peer_list_bad_length() {
        assert_eq!(
            parse_compact_peers(&[1, 2, 3, 4, 5, 6, 7]),
            Err(TrackerError::MalformedPeerList(7))
        );
        assert!(parse_compact_peers(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_compact_response() {
        let body = encode(&Value::dict(vec![
            ("interval", Value::integer(1800)),
            ("peers", Value::Bytes(vec![10, 0, 0, 1, 0x1A, 0xE1, 10, 0, 0, 2, 0x1A, 0xE2])),
        ]));
        let response = parse_response(&body).unwrap();

        assert_eq!(response.interval, Duration::from_secs(1800));
        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[1].addr, "10.0.0.2:6882".parse::<SocketAddr>().unwrap());
        assert!(!response.is_unavailable());
    }

    #[test]
    fn test_parse_dictionary_response() {
        let body = encode(&Value::dict(vec![
            ("interval", Value::integer(60)),
            (
                "peers",
                Value::List(vec![
                    Value::dict(vec![
                        ("ip", Value::string("127.0.0.1")),
                        ("peer id", Value::Bytes(vec![b'a'; 20])),
                        ("port", Value::integer(51413)),
                    ]),
                    Value::dict(vec![("ip", Value::string("not-an-ip")), ("port", Value::integer(1))]),
                    Value::dict(vec![("ip", Value::string("::1")), ("port", Value::integer(6881))]),
                ]),
            ),
        ]));
        let response = parse_response(&body).unwrap();

        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[0].addr, "127.0.0.1:51413".parse::<SocketAddr>().unwrap());
        assert_eq!(response.peers[0].peer_id, Some([b'a'; 20]));
        assert_eq!(response.peers[1].addr, "[::1]:6881".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_parse_failure_reason() {
        let body = encode(&Value::dict(vec![("failure reason", Value::string("unregistered torrent"))]));
        assert_eq!(
            parse_response(&body),
            Err(TrackerError::Failure("unregistered torrent".to_string()))
        );
    }

    #[test]
    fn test_parse_missing_interval() {
        let body = encode(&Value::dict(vec![("peers", Value::Bytes(vec![]))]));
        assert!(matches!(parse_response(&body), Err(TrackerError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_oversized_integers() {
        let huge: BigInt = "99999999999999999999999".parse().unwrap();
        let body = encode(&Value::dict(vec![
            ("complete", Value::Integer(huge.clone())),
            ("interval", Value::Integer(huge.clone())),
            ("peers", Value::Bytes(vec![10, 0, 0, 1, 0x1A, 0xE1])),
        ]));
        let response = parse_response(&body).unwrap();
        assert_eq!(response.interval, Duration::from_secs(u64::MAX));
        assert_eq!(response.peers.len(), 1);

        let body = encode(&Value::dict(vec![("interval", Value::Integer(-huge))]));
        assert!(matches!(parse_response(&body), Err(TrackerError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_missing_peers_is_empty_swarm() {
        let body = encode(&Value::dict(vec![("interval", Value::integer(30))]));
        let response = parse_response(&body).unwrap();
        assert!(response.peers.is_empty());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response(b"<html>"), Err(TrackerError::Decode(_))));
        assert!(matches!(parse_response(b"i3e"), Err(TrackerError::InvalidResponse(_))));
    }

    #[test]
    fn test_unavailable() {
        let response = AnnounceResponse::unavailable();
        assert!(response.peers.is_empty());
        assert_eq!(response.interval, RETRY_NEVER);
        assert!(response.is_unavailable());
    }
}
