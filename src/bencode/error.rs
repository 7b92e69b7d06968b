use thiserror::Error;

/// Reasons a byte sequence is not valid canonical bencode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("invalid integer at byte {pos}: {reason}")]
    InvalidInteger { pos: usize, reason: &'static str },

    #[error("invalid string length at byte {0}")]
    InvalidStringLength(usize),

    #[error("unexpected character {ch:?} at byte {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("dictionary keys out of order at byte {0}")]
    UnsortedKeys(usize),

    #[error("trailing data after value at byte {0}")]
    TrailingData(usize),
}
