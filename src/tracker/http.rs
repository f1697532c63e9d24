//! HTTP tracker announce
//!
//! The HTTP transport is a capability behind [`HttpGet`], so the announce
//! logic can run against an in-memory tracker in tests.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::tracker::error::TrackerError;
use crate::tracker::response::{parse_response, AnnounceResponse};

#[cfg(feature = "http")]
use std::time::Duration;

/// Timeout applied by [`ReqwestHttp`] to a whole request
#[cfg(feature = "http")]
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Perform a GET on a fully built URL
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TrackerError>;
}

/// [`HttpGet`] backed by a `reqwest` client
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl HttpGet for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, TrackerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TrackerError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TrackerError::Http(e.to_string()))?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Parameters of one announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub compact: bool,
}

impl AnnounceRequest {
    /// Request for a fresh download with nothing transferred yet
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], port: u16, left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left,
            compact: true,
        }
    }
}

/// Percent-encode every byte that is not an ASCII alphanumeric
pub fn percent_encode_bytes(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        if b.is_ascii_alphanumeric() {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    encoded
}

/// Build the announce URL with its query string.
///
/// Only `http` and `https` trackers are accepted.
pub fn build_announce_url(announce: &str, request: &AnnounceRequest) -> Result<String, TrackerError> {
    let parsed = url::Url::parse(announce).map_err(|e| {
        error!("Invalid announce URL '{}': {}", announce, e);
        TrackerError::InvalidUrl(announce.to_string())
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        error!("Unsupported tracker scheme '{}'", parsed.scheme());
        return Err(TrackerError::InvalidUrl(announce.to_string()));
    }

    let separator = if announce.contains('?') { '&' } else { '?' };
    Ok(format!(
        "{}{}info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact={}",
        announce,
        separator,
        percent_encode_bytes(&request.info_hash),
        percent_encode_bytes(&request.peer_id),
        request.port,
        request.uploaded,
        request.downloaded,
        request.left,
        u8::from(request.compact)
    ))
}

/// Announces to HTTP trackers through an [`HttpGet`] capability
#[derive(Debug, Clone)]
pub struct TrackerClient<H> {
    http: H,
}

impl<H: HttpGet> TrackerClient<H> {
    pub fn new(http: H) -> Self {
        Self { http }
    }

    #[cfg(test)]
    pub(crate) fn http(&self) -> &H {
        &self.http
    }

    /// Announce to `announce` and decode the peer list.
    ///
    /// A non-2xx status is not an error: it yields
    /// [`AnnounceResponse::unavailable`].
    pub async fn announce(&self, announce: &str, request: &AnnounceRequest) -> Result<AnnounceResponse, TrackerError> {
        let url = build_announce_url(announce, request)?;
        debug!("Announcing: {}", url);

        let response = self.http.get(&url).await.map_err(|e| {
            warn!("Tracker request to {} failed: {}", announce, e);
            e
        })?;

        if !response.is_success() {
            warn!("Tracker {} answered with status {}", announce, response.status);
            return Ok(AnnounceResponse::unavailable());
        }

        let parsed = parse_response(&response.body)?;
        info!("Tracker returned {} peers", parsed.peers.len());
        Ok(parsed)
    }
}
