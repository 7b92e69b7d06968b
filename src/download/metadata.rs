use super::error::DownloadError;
use crate::metainfo::{MagnetLink, Metainfo};
use crate::pool::ConnectionPool;
use tracing::{debug, info};

/// Fetches the info dictionary for `magnet` from the pooled peers.
///
/// Peers that offer `ut_metadata` and announced a `metadata_size` are tried
/// one at a time. The first payload whose SHA-1 matches the info hash is
/// parsed into a [`Metainfo`] carrying the magnet's trackers. Peers whose
/// session broke while fetching are evicted.
pub async fn fetch_metadata(
    pool: &ConnectionPool,
    magnet: &MagnetLink,
) -> Result<Metainfo, DownloadError> {
    for handle in pool.handles() {
        if handle.metadata_size().is_none() {
            continue;
        }

        match handle.fetch_metadata().await {
            Ok(raw) => {
                let metainfo = Metainfo::from_info_bytes(&raw, magnet.trackers.clone())?;
                info!(
                    peer = %handle.addr(),
                    name = %metainfo.info.name,
                    pieces = metainfo.info.piece_count(),
                    "metadata resolved"
                );
                return Ok(metainfo);
            }
            Err(e) => {
                debug!(peer = %handle.addr(), error = %e, "metadata fetch failed");
                if e.closes_session() {
                    pool.remove(handle.addr());
                }
            }
        }
    }

    Err(DownloadError::MetadataUnavailable)
}
