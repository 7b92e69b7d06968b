use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur during peer communication.
///
/// Every variant is contained to the session that produced it; the download
/// orchestrator decides whether the peer is evicted or reused.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The TCP connection could not be established in time.
    #[error("peer {addr} unreachable: {reason}")]
    Unreachable { addr: SocketAddr, reason: String },

    /// The peer sent an invalid handshake.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// The peer's info hash doesn't match ours.
    #[error("info hash mismatch")]
    InfoHashMismatch,

    /// Received a malformed protocol message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Received an unknown message ID.
    #[error("invalid message id: {0}")]
    InvalidMessageId(u8),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("timeout")]
    Timeout,

    /// The download context was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// An operation was attempted in a state that does not allow it.
    #[error("session is {0}, operation not allowed")]
    InvalidState(&'static str),

    /// Protocol violation by the peer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Extension protocol error.
    #[error("extension error: {0}")]
    Extension(String),

    /// The peer rejected a metadata piece request.
    #[error("metadata piece {0} rejected")]
    MetadataRejected(u32),

    /// The peer does not offer ut_metadata or did not announce a usable
    /// metadata_size.
    #[error("peer does not offer metadata exchange")]
    MetadataUnsupported,

    /// The fetched info dictionary does not hash to the info hash.
    #[error("metadata does not match the info hash")]
    MetadataHashMismatch,

    /// The assembled piece did not hash to the expected value.
    #[error("piece {0} failed hash verification")]
    PieceHashMismatch(u32),

    /// The peer advertised that it does not have the piece.
    #[error("peer does not have piece {0}")]
    PieceUnavailable(u32),

    /// Error decoding bencode in extension messages.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),
}

impl PeerError {
    /// Whether the error leaves the connection unusable.
    ///
    /// Hash mismatches, missing pieces and refused metadata say nothing about
    /// the socket, so the session stays open for other work.
    pub fn closes_session(&self) -> bool {
        !matches!(
            self,
            PeerError::PieceHashMismatch(_)
                | PeerError::PieceUnavailable(_)
                | PeerError::MetadataRejected(_)
                | PeerError::MetadataUnsupported
                | PeerError::MetadataHashMismatch
                | PeerError::InvalidState(_)
        )
    }
}
