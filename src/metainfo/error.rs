use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors that can occur when building a torrent descriptor.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The input is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// A required key is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A key is present but has the wrong type or an unusable value.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The `pieces` string is empty or not a whole number of SHA-1 digests.
    #[error("corrupt piece table: {0} bytes is not a non-zero multiple of 20")]
    CorruptPieceTable(usize),

    /// The number of piece hashes does not cover the declared content length.
    #[error("piece table holds {actual} hashes but the content needs {expected}")]
    PieceCountMismatch { expected: u64, actual: usize },

    /// An info hash was not 20 bytes (or 40 hex characters).
    #[error("invalid info hash length")]
    InvalidInfoHashLength,
}
