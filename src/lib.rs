//! leech - a download-only BitTorrent client library
//!
//! Given a torrent descriptor (or a magnet link), leech announces to the
//! swarm's HTTP trackers, opens a bounded pool of peer-wire sessions,
//! downloads and SHA-1 verifies every piece, and hands verified pieces to a
//! caller-supplied sink in piece order. It never uploads and never touches
//! the filesystem itself.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`metainfo`] - BEP-3 torrent descriptors, info hashes, magnet links
//! - [`tracker`] - BEP-3/23 HTTP tracker announces
//! - [`peer`] - BEP-3/9/10 peer wire protocol, extension protocol, ut_metadata
//! - [`pool`] - bounded pool of live peer sessions
//! - [`download`] - piece scheduling and the [`Client`] entry point
//! - [`config`] / [`constants`] - runtime settings and their defaults
//!
//! # Example
//!
//! ```no_run
//! use leech::{Client, DownloadConfig, MemorySink, Metainfo, PieceSelection};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let torrent = Metainfo::from_bytes(&std::fs::read("debian.iso.torrent")?)?;
//! let client = Client::new(DownloadConfig::default())?;
//!
//! let mut sink = MemorySink::new();
//! let stats = client
//!     .download(&torrent, PieceSelection::All, &mut sink)
//!     .await?;
//! assert_eq!(stats.bytes_written, torrent.info.total_length);
//! # Ok(())
//! # }
//! ```

pub mod bencode;
pub mod config;
pub mod constants;
pub mod download;
pub mod metainfo;
pub mod peer;
pub mod pool;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use config::{DownloadConfig, PoolConfig, SessionConfig};
pub use download::{
    fetch_metadata, Client, Download, DownloadError, DownloadStats, MemorySink, PieceSelection,
    PieceSink, WriterSink,
};
pub use metainfo::{File, Info, InfoHash, MagnetLink, Metainfo, MetainfoError, Piece};
pub use peer::{
    Bitfield, FixedIdentity, Handshake, IdentityGenerator, Message, PeerError, PeerId,
    PeerSession, RandomIdentity, SessionState,
};
pub use pool::{ConnectionPool, SessionHandle};
pub use tracker::{
    announce_any, Announce, AnnounceRequest, AnnounceResponse, HttpTracker, TrackerError,
};
