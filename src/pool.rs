//! Bounded set of live peer sessions.
//!
//! The pool maps peer addresses to [`SessionHandle`]s. The map sits behind a
//! single lock that is never held across an await; the size bound is checked
//! under that lock at insertion time, so concurrent admissions cannot
//! overshoot it.

mod handle;

pub use handle::SessionHandle;

use crate::config::{PoolConfig, SessionConfig};
use crate::metainfo::{InfoHash, Piece};
use crate::peer::{IdentityGenerator, PeerError, PeerId, PeerSession};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type DrainedCallback = Box<dyn FnOnce() + Send + 'static>;

pub struct ConnectionPool {
    info_hash: InfoHash,
    config: PoolConfig,
    identity: Arc<dyn IdentityGenerator>,
    cancel: CancellationToken,
    sessions: Mutex<HashMap<SocketAddr, SessionHandle>>,
    on_drained: Mutex<Option<DrainedCallback>>,
}

impl ConnectionPool {
    /// Sessions get child tokens of `cancel`; cancelling it stops them all.
    pub fn new(
        info_hash: InfoHash,
        config: PoolConfig,
        identity: Arc<dyn IdentityGenerator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            info_hash,
            config,
            identity,
            cancel,
            sessions: Mutex::new(HashMap::new()),
            on_drained: Mutex::new(None),
        }
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// The concurrency bound in effect for the next admission.
    pub fn bound(&self) -> usize {
        self.config.bound()
    }

    /// Connects to candidates until the pool is full or they run out.
    ///
    /// Candidates are pulled lazily, so whatever the iterator still holds
    /// once the pool is full stays untried. Up to `bound - size` connections
    /// are attempted concurrently; a failed attempt frees its slot for the
    /// next candidate. Addresses already in the pool are skipped.
    ///
    /// Returns the addresses that were admitted.
    pub async fn admit<I>(&self, peers: I) -> Vec<SocketAddr>
    where
        I: IntoIterator<Item = SocketAddr>,
        I::IntoIter: Send,
    {
        let bound = self.bound();
        let mut candidates = peers.into_iter();
        let mut seen = HashSet::new();
        let mut attempts = JoinSet::new();
        let mut admitted = Vec::new();

        loop {
            while !self.cancel.is_cancelled() && self.size() + attempts.len() < bound {
                let Some(addr) = candidates.next() else {
                    break;
                };
                if !seen.insert(addr) || self.contains(addr) {
                    continue;
                }
                attempts.spawn(open_session(
                    addr,
                    self.info_hash,
                    self.identity.generate(),
                    self.config.session.clone(),
                    self.cancel.child_token(),
                ));
            }

            let Some(joined) = attempts.join_next().await else {
                break;
            };

            match joined {
                Ok((addr, Ok(handle))) => {
                    if self.insert(handle.clone(), bound) {
                        info!(peer = %addr, peer_id = ?handle.peer_id(), "peer admitted");
                        admitted.push(addr);
                    } else {
                        handle.close();
                    }
                }
                Ok((addr, Err(e))) => debug!(peer = %addr, error = %e, "admission failed"),
                Err(e) => warn!(error = %e, "connect task failed"),
            }
        }

        admitted
    }

    fn insert(&self, handle: SessionHandle, bound: usize) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= bound || sessions.contains_key(&handle.addr()) {
            return false;
        }
        sessions.insert(handle.addr(), handle);
        true
    }

    /// Registers the callback fired when a [`remove`](Self::remove) empties
    /// the pool. Each registered callback fires at most once; registering
    /// replaces any callback that has not fired yet.
    pub fn on_drained(&self, callback: impl FnOnce() + Send + 'static) {
        *self.on_drained.lock() = Some(Box::new(callback));
    }

    /// Evicts and closes one session. Returns false if it was not pooled.
    pub fn remove(&self, addr: SocketAddr) -> bool {
        let (handle, emptied) = {
            let mut sessions = self.sessions.lock();
            let handle = sessions.remove(&addr);
            let emptied = handle.is_some() && sessions.is_empty();
            (handle, emptied)
        };

        let Some(handle) = handle else {
            return false;
        };
        handle.close();
        debug!(peer = %addr, "peer removed from pool");

        if emptied {
            let callback = self.on_drained.lock().take();
            if let Some(callback) = callback {
                callback();
            }
        }
        true
    }

    /// Closes every session and empties the pool without firing the drained
    /// callback. Returns how many sessions were closed.
    pub fn drain_all(&self) -> usize {
        let sessions = std::mem::take(&mut *self.sessions.lock());
        for handle in sessions.values() {
            handle.close();
        }
        if !sessions.is_empty() {
            debug!(count = sessions.len(), "pool drained");
        }
        sessions.len()
    }

    pub fn size(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.sessions.lock().contains_key(&addr)
    }

    pub fn get(&self, addr: SocketAddr) -> Option<SessionHandle> {
        self.sessions.lock().get(&addr).cloned()
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.sessions.lock().keys().copied().collect()
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.lock().values().cloned().collect()
    }

    /// Downloads a piece through the session for `addr`.
    ///
    /// Safe to call concurrently; calls for the same peer are queued by its
    /// session task.
    pub async fn download_piece(&self, addr: SocketAddr, piece: Piece) -> Result<Bytes, PeerError> {
        let handle = self.get(addr).ok_or(PeerError::ConnectionClosed)?;
        handle.download_piece(piece).await
    }
}

async fn open_session(
    addr: SocketAddr,
    info_hash: InfoHash,
    local_id: PeerId,
    config: SessionConfig,
    cancel: CancellationToken,
) -> (SocketAddr, Result<SessionHandle, PeerError>) {
    let mut session = PeerSession::new(addr, info_hash, local_id, config, cancel.clone());
    let result = session
        .connect()
        .await
        .map(|()| SessionHandle::spawn(session, cancel));
    (addr, result)
}
