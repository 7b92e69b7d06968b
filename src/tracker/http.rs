use super::error::TrackerError;
use super::request::AnnounceRequest;
use super::response::AnnounceResponse;
use super::Announce;
use crate::constants::{HTTP_TRACKER_TIMEOUT, USER_AGENT};
use reqwest::Client;
use std::future::Future;
use tracing::debug;

/// Announces over HTTP(S) with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTracker {
    client: Client,
}

impl HttpTracker {
    pub fn new() -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(HTTP_TRACKER_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TrackerError::Http)?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, announce: &str, request: &AnnounceRequest) -> Result<AnnounceResponse, TrackerError> {
        check_scheme(announce)?;

        let url = request.url(announce);
        debug!(tracker = announce, left = request.left, "announcing");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        AnnounceResponse::from_bytes(&body)
    }
}

impl Announce for HttpTracker {
    fn announce(
        &self,
        announce: &str,
        request: &AnnounceRequest,
    ) -> impl Future<Output = Result<AnnounceResponse, TrackerError>> + Send {
        self.get(announce, request)
    }
}

fn check_scheme(url: &str) -> Result<(), TrackerError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else if url.starts_with("udp://") {
        Err(TrackerError::UnsupportedProtocol(url.to_string()))
    } else {
        Err(TrackerError::InvalidUrl(url.to_string()))
    }
}
