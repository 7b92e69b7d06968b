//! Download orchestration.
//!
//! [`Download`] assigns pending pieces to idle sessions, one piece in flight
//! per session, and hands verified pieces to a [`PieceSink`] in piece-index
//! order. Failures stay contained to the peer that caused them:
//!
//! - a hash mismatch re-queues the piece and gives the peer a strike; a peer
//!   reaching `max_peer_strikes` is evicted
//! - a peer that advertises it lacks a piece keeps its place and is simply
//!   not asked for that piece again
//! - any other session failure evicts the peer and re-queues its piece
//!
//! Evicted peers are replaced from the untried candidates. The download only
//! fails with [`DownloadError::SwarmExhausted`] once no pooled or candidate
//! peer can make progress.
//!
//! [`Client`] ties this together with a tracker announce.

mod client;
mod error;
mod metadata;
mod sink;

pub use client::Client;
pub use error::DownloadError;
pub use metadata::fetch_metadata;
pub use sink::{MemorySink, PieceSink, WriterSink};

use crate::config::DownloadConfig;
use crate::metainfo::Metainfo;
use crate::peer::PeerError;
use crate::pool::ConnectionPool;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which pieces a download covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PieceSelection {
    #[default]
    All,
    /// Only the piece with this index; the download stops once it verifies.
    Single(u32),
}

impl PieceSelection {
    /// The selected indices in emission order.
    pub fn indices(&self, piece_count: usize) -> Result<Vec<u32>, DownloadError> {
        match *self {
            PieceSelection::All => Ok((0..piece_count as u32).collect()),
            PieceSelection::Single(index) if (index as usize) < piece_count => Ok(vec![index]),
            PieceSelection::Single(index) => Err(DownloadError::PieceOutOfRange {
                index,
                count: piece_count,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub pieces_verified: usize,
    pub bytes_written: u64,
    pub hash_failures: usize,
    pub peers_evicted: usize,
}

type PieceResult = (SocketAddr, u32, Result<Bytes, PeerError>);

/// One download of a torrent through a connection pool.
pub struct Download<'a> {
    metainfo: &'a Metainfo,
    pool: &'a ConnectionPool,
    candidates: VecDeque<SocketAddr>,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl<'a> Download<'a> {
    pub fn new(
        metainfo: &'a Metainfo,
        pool: &'a ConnectionPool,
        config: DownloadConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            metainfo,
            pool,
            candidates: VecDeque::new(),
            config,
            cancel,
        }
    }

    /// Peers to admit whenever the pool has room. They are tried in order,
    /// each at most once.
    pub fn with_candidates(mut self, peers: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.candidates.extend(peers);
        self
    }

    /// Runs the download to completion.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::PieceOutOfRange`] for a single-piece selection past
    ///   the last piece
    /// - [`DownloadError::SwarmExhausted`] when no peer can make progress
    /// - [`DownloadError::Cancelled`] when the token fires
    /// - [`DownloadError::Sink`] when the sink refuses a piece
    pub async fn run<S: PieceSink>(
        self,
        selection: PieceSelection,
        mut sink: S,
    ) -> Result<DownloadStats, DownloadError> {
        let Download {
            metainfo,
            pool,
            mut candidates,
            config,
            cancel,
        } = self;

        let order = selection.indices(metainfo.info.piece_count())?;
        let mut pending: VecDeque<u32> = order.iter().copied().collect();
        let mut verified: BTreeMap<u32, Bytes> = BTreeMap::new();
        let mut emitted = 0;

        let mut idle: VecDeque<SocketAddr> = pool.addrs().into();
        let mut parked: HashSet<SocketAddr> = HashSet::new();
        let mut refused: HashSet<(SocketAddr, u32)> = HashSet::new();
        let mut strikes: HashMap<SocketAddr, u32> = HashMap::new();
        let mut tasks: JoinSet<PieceResult> = JoinSet::new();
        let mut stats = DownloadStats::default();

        let drained = Arc::new(AtomicBool::new(false));
        arm_drained(pool, &drained);

        info!(
            info_hash = %metainfo.info_hash.to_hex(),
            pieces = order.len(),
            peers = pool.size(),
            candidates = candidates.len(),
            "download started"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            while let Some(&index) = order.get(emitted) {
                let Some(data) = verified.remove(&index) else {
                    break;
                };
                let offset = metainfo.info.pieces[index as usize].offset;
                let len = data.len() as u64;
                sink.write_piece(offset, data)?;
                stats.bytes_written += len;
                emitted += 1;
            }
            if emitted == order.len() {
                info!(
                    pieces = stats.pieces_verified,
                    bytes = stats.bytes_written,
                    hash_failures = stats.hash_failures,
                    "download complete"
                );
                return Ok(stats);
            }

            if !pending.is_empty() && !candidates.is_empty() && pool.size() < pool.bound() {
                let admitted = pool
                    .admit(std::iter::from_fn(|| candidates.pop_front()))
                    .await;
                if !admitted.is_empty() {
                    debug!(admitted = admitted.len(), "pool replenished");
                    idle.extend(admitted);
                    drained.store(false, Ordering::SeqCst);
                    arm_drained(pool, &drained);
                }
            }

            while let Some(addr) = idle.pop_front() {
                let Some(handle) = pool.get(addr) else {
                    continue;
                };
                let Some(position) = pending
                    .iter()
                    .position(|index| !refused.contains(&(addr, *index)))
                else {
                    parked.insert(addr);
                    continue;
                };
                let Some(index) = pending.remove(position) else {
                    continue;
                };

                let piece = metainfo.info.pieces[index as usize].clone();
                debug!(peer = %addr, piece = index, "piece assigned");
                tasks.spawn(async move { (addr, index, handle.download_piece(piece).await) });
            }

            if tasks.is_empty() {
                let remaining = order.len() - emitted;
                if candidates.is_empty() {
                    let reason = if drained.load(Ordering::SeqCst) {
                        "every peer was evicted"
                    } else if pool.size() == 0 {
                        "no peer could be reached"
                    } else {
                        "no peer has the remaining pieces"
                    };
                    warn!(remaining, peers = pool.size(), reason, "swarm exhausted");
                    return Err(DownloadError::SwarmExhausted { remaining });
                }
                // The pool is full of peers that cannot serve what is left;
                // make room for untried candidates.
                for addr in parked.drain() {
                    if pool.remove(addr) {
                        stats.peers_evicted += 1;
                    }
                }
                continue;
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                continue;
            };
            let (addr, index, result) = joined?;

            match result {
                Ok(data) => {
                    debug!(peer = %addr, piece = index, "piece verified");
                    stats.pieces_verified += 1;
                    verified.insert(index, data);
                    idle.push_back(addr);
                }
                Err(e) => {
                    pending.push_back(index);
                    idle.extend(parked.drain());

                    match e {
                        PeerError::PieceHashMismatch(_) => {
                            stats.hash_failures += 1;
                            let count = strikes.entry(addr).or_default();
                            *count += 1;
                            warn!(peer = %addr, piece = index, strikes = *count, "piece failed hash check");
                            if *count >= config.max_peer_strikes {
                                evict(pool, addr, &e, &mut stats);
                            } else {
                                idle.push_back(addr);
                            }
                        }
                        PeerError::PieceUnavailable(_) => {
                            debug!(peer = %addr, piece = index, "peer lacks piece");
                            refused.insert((addr, index));
                            idle.push_back(addr);
                        }
                        _ => evict(pool, addr, &e, &mut stats),
                    }
                }
            }
        }
    }
}

fn arm_drained(pool: &ConnectionPool, drained: &Arc<AtomicBool>) {
    let flag = drained.clone();
    pool.on_drained(move || flag.store(true, Ordering::SeqCst));
}

fn evict(pool: &ConnectionPool, addr: SocketAddr, error: &PeerError, stats: &mut DownloadStats) {
    if pool.remove(addr) {
        warn!(peer = %addr, error = %error, "peer evicted");
        stats.peers_evicted += 1;
    }
}

#[cfg(test)]
mod tests;
