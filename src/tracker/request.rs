use crate::constants::DEFAULT_PORT;
use crate::metainfo::{InfoHash, Metainfo};

/// Query parameters of an HTTP announce.
///
/// A download-only client always reports `uploaded=0` and `downloaded=0`
/// and asks for the compact peer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: [u8; 20],
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

impl AnnounceRequest {
    pub fn new(info_hash: InfoHash, peer_id: [u8; 20], left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            port: DEFAULT_PORT,
            uploaded: 0,
            downloaded: 0,
            left,
        }
    }

    /// Announce for a full download of `metainfo`.
    pub fn for_metainfo(metainfo: &Metainfo, peer_id: [u8; 20]) -> Self {
        Self::new(metainfo.info_hash, peer_id, metainfo.info.total_length)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
            url_encode(self.info_hash.as_bytes()),
            url_encode(&self.peer_id),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left
        )
    }

    /// Full announce URL, respecting a query the tracker URL may already carry.
    pub fn url(&self, announce: &str) -> String {
        let separator = if announce.contains('?') { '&' } else { '?' };
        format!("{}{}{}", announce, separator, self.query_string())
    }
}

pub(crate) fn url_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~' {
                format!("{}", b as char)
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
