//! Runtime configuration.
//!
//! Every struct has a `Default` built from [`crate::constants`]; override
//! individual fields with struct update syntax:
//!
//! ```
//! use leech::config::{DownloadConfig, PoolConfig};
//!
//! let config = DownloadConfig {
//!     pool: PoolConfig {
//!         max_sessions: Some(4),
//!         ..PoolConfig::default()
//!     },
//!     ..DownloadConfig::default()
//! };
//! assert_eq!(config.pool.bound(), 4);
//! ```

use crate::constants::{
    BLOCK_REQUEST_TIMEOUT, BLOCK_SIZE, CONNECTION_TIMEOUT, DEFAULT_PORT, HANDSHAKE_TIMEOUT,
    MAX_PEER_STRIKES, MAX_POOL_SIZE, PIPELINE_DEPTH, SESSIONS_PER_CPU,
};
use std::time::Duration;

/// Per-connection timeouts and request pipelining.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    /// Applies to the handshake and the extension handshake exchange.
    pub handshake_timeout: Duration,
    /// Longest wait for the next block (or metadata piece) before the
    /// session is considered failed.
    pub request_timeout: Duration,
    pub block_size: u32,
    pub pipeline_depth: usize,
    /// Advertise the extension protocol in the handshake reserved bits.
    pub extensions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECTION_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            request_timeout: BLOCK_REQUEST_TIMEOUT,
            block_size: BLOCK_SIZE,
            pipeline_depth: PIPELINE_DEPTH,
            extensions: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Explicit session bound. When `None` the bound is derived from the
    /// available parallelism each time peers are admitted.
    pub max_sessions: Option<usize>,
    pub session: SessionConfig,
}

impl PoolConfig {
    /// The effective concurrency bound, never below one.
    pub fn bound(&self) -> usize {
        self.max_sessions
            .unwrap_or_else(|| {
                let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
                (SESSIONS_PER_CPU * cpus).min(MAX_POOL_SIZE)
            })
            .max(1)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Listening port reported to trackers.
    pub port: u16,
    /// Hash mismatches tolerated from one peer before it is evicted.
    pub max_peer_strikes: u32,
    pub pool: PoolConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_peer_strikes: MAX_PEER_STRIKES,
            pool: PoolConfig::default(),
        }
    }
}
