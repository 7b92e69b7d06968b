use super::error::DownloadError;
use super::metadata::fetch_metadata;
use super::sink::PieceSink;
use super::{Download, DownloadStats, PieceSelection};
use crate::config::DownloadConfig;
use crate::metainfo::{InfoHash, MagnetLink, Metainfo};
use crate::peer::{FixedIdentity, IdentityGenerator, PeerId, RandomIdentity};
use crate::pool::ConnectionPool;
use crate::tracker::{announce_any, Announce, AnnounceRequest, HttpTracker};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Announces, connects and downloads.
///
/// Every call builds its own pool and closes all of its sessions before
/// returning. Cancelling [`Client::cancellation_token`] aborts every call in
/// progress.
pub struct Client<A = HttpTracker> {
    tracker: A,
    identity: Arc<dyn IdentityGenerator>,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl Client<HttpTracker> {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        Ok(Self::with_tracker(HttpTracker::new()?, config))
    }
}

impl<A: Announce> Client<A> {
    pub fn with_tracker(tracker: A, config: DownloadConfig) -> Self {
        Self {
            tracker,
            identity: Arc::new(RandomIdentity),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the peer ID source.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityGenerator>) -> Self {
        self.identity = identity;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn tracker(&self) -> &A {
        &self.tracker
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Downloads the selected pieces of `metainfo` into `sink`.
    pub async fn download<S: PieceSink>(
        &self,
        metainfo: &Metainfo,
        selection: PieceSelection,
        sink: S,
    ) -> Result<DownloadStats, DownloadError> {
        selection.indices(metainfo.info.piece_count())?;

        let peer_id = self.identity.generate();
        let request = AnnounceRequest::for_metainfo(metainfo, peer_id.0).with_port(self.config.port);
        let response = announce_any(&self.tracker, &metainfo.trackers, &request).await?;
        info!(
            info_hash = %metainfo.info_hash.to_hex(),
            peers = response.peers.len(),
            "tracker announce succeeded"
        );

        let cancel = self.cancel.child_token();
        let pool = self.pool(metainfo.info_hash, peer_id, cancel.clone());
        let result = Download::new(metainfo, &pool, self.config.clone(), cancel)
            .with_candidates(response.peers)
            .run(selection, sink)
            .await;

        pool.drain_all();
        result
    }

    /// Resolves a magnet link into a full descriptor by fetching the info
    /// dictionary from the swarm.
    pub async fn resolve_magnet(&self, magnet: &MagnetLink) -> Result<Metainfo, DownloadError> {
        let peer_id = self.identity.generate();
        // The content length is unknown until the metadata arrives.
        let request = AnnounceRequest::new(magnet.info_hash, peer_id.0, 1).with_port(self.config.port);
        let response = announce_any(&self.tracker, &magnet.trackers, &request).await?;

        let cancel = self.cancel.child_token();
        let pool = self.pool(magnet.info_hash, peer_id, cancel.clone());
        pool.admit(response.peers).await;
        let result = fetch_metadata(&pool, magnet).await;
        pool.drain_all();

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        result
    }

    /// Every session of one download handshakes with the id it announced.
    fn pool(
        &self,
        info_hash: InfoHash,
        peer_id: PeerId,
        cancel: CancellationToken,
    ) -> ConnectionPool {
        ConnectionPool::new(
            info_hash,
            self.config.pool.clone(),
            Arc::new(FixedIdentity(peer_id)),
            cancel,
        )
    }
}
