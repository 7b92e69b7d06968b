//! HTTP tracker announces (BEP-3, BEP-23)
//!
//! The tracker is an external collaborator: this module fixes the shape of the
//! request and decodes the response, and [`HttpTracker`] supplies the
//! transport. Anything implementing [`Announce`] can stand in for it.

mod error;
mod http;
mod request;
mod response;

pub use error::TrackerError;
pub use http::HttpTracker;
pub use request::AnnounceRequest;
pub use response::{parse_compact_peers, AnnounceResponse, CompactPeer};

use std::future::Future;
use tracing::warn;

/// Something that can answer an announce for a tracker URL.
pub trait Announce {
    fn announce(
        &self,
        announce: &str,
        request: &AnnounceRequest,
    ) -> impl Future<Output = Result<AnnounceResponse, TrackerError>> + Send;
}

/// Tries each tracker in order and returns the first successful response.
///
/// Failures are logged and the next tracker is tried. If every tracker
/// fails, the last error is returned.
pub async fn announce_any<A: Announce>(
    tracker: &A,
    trackers: &[String],
    request: &AnnounceRequest,
) -> Result<AnnounceResponse, TrackerError> {
    let mut last_error = TrackerError::NoTrackers;

    for url in trackers {
        match tracker.announce(url, request).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(tracker = %url, error = %e, "announce failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}
