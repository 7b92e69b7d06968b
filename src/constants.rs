//! Protocol constants and tuning parameters.
//!
//! Runtime-adjustable values are surfaced through [`crate::config`], whose
//! `Default` impls are built from the values here.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &str = "-LE0001-";

/// User agent string for HTTP tracker requests
pub const USER_AGENT: &str = "leech/0.1.0";

/// Default BitTorrent listen port reported to trackers
pub const DEFAULT_PORT: u16 = 6881;

// ============================================================================
// Wire protocol
// ============================================================================

/// Protocol string sent in the handshake (BEP-3)
pub const PROTOCOL_STRING: &[u8; 19] = b"BitTorrent protocol";

/// Total handshake size: pstrlen + pstr + reserved + info hash + peer id
pub const HANDSHAKE_LEN: usize = 68;

/// Byte and mask of the reserved bit advertising the extension protocol (BEP-10)
pub const EXTENSION_RESERVED_BYTE: usize = 5;
pub const EXTENSION_RESERVED_MASK: u8 = 0x10;

/// Extended message id used for the extension handshake itself
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// Local id we assign to ut_metadata in our extension handshake
pub const LOCAL_UT_METADATA_ID: u8 = 1;

/// Largest frame accepted from a peer. Anything bigger is treated as a
/// protocol violation rather than buffered.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// Block and piece sizes
// ============================================================================

/// Standard block size (16KB)
pub const BLOCK_SIZE: u32 = 16384;

/// Metadata piece size (BEP-9)
pub const METADATA_PIECE_SIZE: usize = 16384;

/// Upper bound for an advertised metadata_size. Info dictionaries of real
/// torrents are far smaller.
pub const MAX_METADATA_SIZE: usize = 64 * 1024 * 1024;

/// Outstanding block requests kept in flight per session
pub const PIPELINE_DEPTH: usize = 5;

// ============================================================================
// Timeouts
// ============================================================================

/// TCP connection timeout
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Handshake (and extension handshake) exchange timeout
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed between block responses before a session is considered failed
pub const BLOCK_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP tracker request timeout
pub const HTTP_TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Pool and orchestration
// ============================================================================

/// Absolute ceiling on concurrent peer sessions
pub const MAX_POOL_SIZE: usize = 30;

/// Sessions per available CPU when the pool bound is derived
pub const SESSIONS_PER_CPU: usize = 2;

/// Hash mismatches tolerated from one peer before it is evicted
pub const MAX_PEER_STRIKES: u32 = 2;

/// Command queue depth for each session task
pub const SESSION_COMMAND_BUFFER: usize = 4;
