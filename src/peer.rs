//! Peer wire protocol (BEP-3, BEP-9, BEP-10)
//!
//! A [`PeerSession`] owns one connection: it runs the handshake and
//! extension handshake, frames messages through [`PeerTransport`], downloads
//! hash-verified pieces and fetches metadata over ut_metadata.

mod bitfield;
mod error;
mod extension;
mod message;
mod metadata;
mod peer_id;
mod piece;
mod session;
mod transport;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use extension::{ExtensionHandshake, UT_METADATA};
pub use message::{Handshake, Message, MessageId};
pub use metadata::{
    metadata_piece_count, metadata_piece_size, MetadataMessage, MetadataMessageType,
};
pub use peer_id::{FixedIdentity, IdentityGenerator, PeerId, RandomIdentity};
pub use piece::{compute_block_count, compute_block_length, BlockRequest, PieceAssembler};
pub use session::{PeerSession, SessionState};
pub use transport::PeerTransport;
