//! HTTP tracker client
//!
//! Announces to the tracker and decodes compact and dictionary peer lists.

mod error;
mod http;
mod response;

pub use error::TrackerError;
#[cfg(feature = "http")]
pub use http::{ReqwestHttp, HTTP_TIMEOUT};
pub use http::{build_announce_url, percent_encode_bytes, AnnounceRequest, HttpGet, HttpResponse, TrackerClient};
pub use response::{parse_compact_peers, parse_response, AnnounceResponse, RETRY_NEVER};

#[cfg(test)]
pub(crate) use http::tests::FakeHttp;
