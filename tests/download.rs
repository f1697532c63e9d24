//! End-to-end download against an in-memory tracker and seeding peers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use irony_leech::protocol::{read_handshake, read_message, write_handshake, write_message};
use irony_leech::tracker::percent_encode_bytes;
use irony_leech::{
    encode, ClientConfig, Connector, Handshake, HttpGet, HttpResponse, Message, SessionConfig, TorrentClient,
    TorrentFile, TorrentParser, TrackerError, Value,
};
use sha1::{Digest, Sha1};
use tokio::io::DuplexStream;

const PIECE_LENGTH: usize = 32 * 1024;

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn torrent_for(data: &[u8]) -> TorrentFile {
    let pieces: Vec<u8> = data
        .chunks(PIECE_LENGTH)
        .flat_map(|chunk| Sha1::digest(chunk).to_vec())
        .collect();
    let info = Value::dict(vec![
        ("length", Value::integer(data.len() as i64)),
        ("name", Value::string("payload.bin")),
        ("piece length", Value::integer(PIECE_LENGTH as i64)),
        ("pieces", Value::Bytes(pieces)),
    ]);
    let descriptor = encode(&Value::dict(vec![
        ("announce", Value::string("http://tracker.test/announce")),
        ("info", info),
    ]));
    TorrentParser::parse_bytes(&descriptor).unwrap()
}

/// Tracker that always returns the same compact peer list
struct StaticTracker {
    peers: Vec<u8>,
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpGet for StaticTracker {
    async fn get(&self, url: &str) -> Result<HttpResponse, TrackerError> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = encode(&Value::dict(vec![
            ("interval", Value::integer(1800)),
            ("peers", Value::Bytes(self.peers.clone())),
        ]));
        Ok(HttpResponse::new(200, body))
    }
}

/// Serves every piece of `data` over one connection
async fn seed(mut stream: DuplexStream, torrent: TorrentFile, data: Arc<Vec<u8>>, peer_id: [u8; 20]) {
    let Ok(theirs) = read_handshake(&mut stream).await else {
        return;
    };
    assert_eq!(theirs.info_hash, torrent.info_hash);
    write_handshake(&mut stream, &Handshake::new(torrent.info_hash, peer_id)).await.unwrap();

    let mut bitfield = vec![0u8; torrent.piece_count().div_ceil(8)];
    for index in 0..torrent.piece_count() {
        bitfield[index / 8] |= 0x80 >> (index % 8);
    }
    if write_message(&mut stream, &Message::Bitfield { bitfield }).await.is_err() {
        return;
    }

    while let Ok(message) = read_message(&mut stream).await {
        let reply = match message {
            Message::Interested => Message::Unchoke,
            Message::Request { index, begin, length } => {
                let start = index as usize * PIECE_LENGTH + begin as usize;
                Message::Piece {
                    index,
                    begin,
                    block: data[start..start + length as usize].to_vec(),
                }
            }
            _ => continue,
        };
        if write_message(&mut stream, &reply).await.is_err() {
            return;
        }
    }
}

/// Connects known addresses to in-process seeders, refuses the rest
struct SwarmConnector {
    torrent: TorrentFile,
    data: Arc<Vec<u8>>,
    seeders: HashMap<SocketAddr, [u8; 20]>,
}

#[async_trait]
impl Connector for SwarmConnector {
    type Stream = DuplexStream;

    async fn connect(&self, addr: SocketAddr) -> anyhow::Result<DuplexStream> {
        let peer_id = *self
            .seeders
            .get(&addr)
            .ok_or_else(|| anyhow::anyhow!("connection refused: {}", addr))?;
        let (local, remote) = tokio::io::duplex(256 * 1024);
        tokio::spawn(seed(remote, self.torrent.clone(), Arc::clone(&self.data), peer_id));
        Ok(local)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn download_from_swarm() {
    let dir = tempfile::tempdir().unwrap();
    let data = content(5 * PIECE_LENGTH + 12_345);
    let torrent = torrent_for(&data);

    let peers: Vec<u8> = vec![
        [10, 0, 0, 1, 0x1A, 0xE1],
        [10, 0, 0, 2, 0x1A, 0xE1],
        [10, 0, 0, 3, 0x1A, 0xE1],
    ]
    .concat();
    let tracker = StaticTracker {
        peers,
        requests: Mutex::new(Vec::new()),
    };
    let connector = SwarmConnector {
        torrent: torrent.clone(),
        data: Arc::new(data.clone()),
        seeders: HashMap::from([
            ("10.0.0.1:6881".parse().unwrap(), *b"-SD0001-000000000001"),
            ("10.0.0.3:6881".parse().unwrap(), *b"-SD0001-000000000003"),
        ]),
    };

    let config = ClientConfig {
        output_dir: dir.path().join("downloads"),
        workers: 3,
        tick: Duration::from_millis(25),
        shutdown_grace: Duration::from_millis(500),
        quiet: true,
        session: SessionConfig {
            pipeline: 5,
            ..SessionConfig::default()
        },
        ..ClientConfig::default()
    };
    let client = TorrentClient::new(tracker, connector, config);

    let path = tokio::time::timeout(Duration::from_secs(30), client.download(&torrent))
        .await
        .expect("download timed out")
        .unwrap();

    assert_eq!(path, dir.path().join("downloads").join("payload.bin"));
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[tokio::test]
async fn announce_encodes_info_hash() {
    let dir = tempfile::tempdir().unwrap();
    let data = content(1000);
    let torrent = torrent_for(&data);

    let tracker = Arc::new(StaticTracker {
        peers: vec![10, 0, 0, 1, 0x1A, 0xE1],
        requests: Mutex::new(Vec::new()),
    });
    let connector = SwarmConnector {
        torrent: torrent.clone(),
        data: Arc::new(data.clone()),
        seeders: HashMap::from([("10.0.0.1:6881".parse().unwrap(), *b"-SD0001-000000000001")]),
    };
    let config = ClientConfig {
        output_dir: dir.path().to_path_buf(),
        workers: 1,
        tick: Duration::from_millis(25),
        shutdown_grace: Duration::from_millis(500),
        quiet: true,
        ..ClientConfig::default()
    };

    let client = TorrentClient::new(SharedTracker(Arc::clone(&tracker)), connector, config);
    client.download(&torrent).await.unwrap();

    let requests = tracker.requests.lock().unwrap();
    let expected = format!("info_hash={}", percent_encode_bytes(&torrent.info_hash));
    assert!(requests[0].starts_with("http://tracker.test/announce?"));
    assert!(requests[0].contains(&expected));
    assert!(requests[0].ends_with("&left=1000&compact=1"));
}

/// Lets the test keep a handle on the tracker after handing it to the client
struct SharedTracker(Arc<StaticTracker>);

#[async_trait]
impl HttpGet for SharedTracker {
    async fn get(&self, url: &str) -> Result<HttpResponse, TrackerError> {
        self.0.get(url).await
    }
}
