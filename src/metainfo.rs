//! Torrent metainfo handling ([BEP-3], [BEP-9]).
//!
//! A torrent file (`.torrent`) is a bencoded dictionary describing the
//! content to fetch:
//!
//! - **announce** / **announce-list** - tracker URLs
//! - **info** - core metadata, hashed to form the info hash
//!   - `name` - suggested file or directory name
//!   - `piece length` - size of each piece in bytes
//!   - `pieces` - concatenated SHA-1 hashes, 20 bytes per piece
//!   - `length` (single file) or `files` (multi-file)
//!
//! [`Metainfo`] is the parsed descriptor. [`MagnetLink`] carries the info hash
//! and trackers for swarms whose info dictionary must first be fetched from
//! peers.
//!
//! # Examples
//!
//! ```
//! use leech::metainfo::Metainfo;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut data = b"d8:announce21:http://tracker.test/a4:infod6:lengthi20e4:name8:test.bin12:piece lengthi16e6:pieces40:".to_vec();
//! data.extend_from_slice(&[0u8; 40]);
//! data.extend_from_slice(b"ee");
//!
//! let torrent = Metainfo::from_bytes(&data)?;
//! assert_eq!(torrent.info.piece_count(), 2);
//! assert_eq!(torrent.info.pieces[1].length, 4);
//! assert_eq!(torrent.trackers, vec!["http://tracker.test/a".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html
//! [BEP-9]: http://bittorrent.org/beps/bep_0009.html

mod error;
mod fields;
mod info_hash;
mod magnet;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub(crate) use info_hash::hex_encode;
pub use magnet::MagnetLink;
pub use torrent::{File, Info, Metainfo, Piece};
