use crate::constants::MAX_MESSAGE_SIZE;
use bytes::Bytes;

/// Which pieces a peer has advertised.
///
/// Bits are numbered from the high bit of the first byte. The field grows on
/// demand because a session may learn availability before it knows the
/// torrent's piece count (magnet downloads).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
}

impl Bitfield {
    /// Piece indices a peer may advertise: the bits in the largest
    /// `bitfield` payload a frame can carry.
    pub const MAX_PIECES: usize = (MAX_MESSAGE_SIZE - 1) * 8;

    /// Creates an empty bitfield sized for `piece_count` pieces.
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
        }
    }

    /// Wraps the payload of a `bitfield` message.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self {
            bits: bytes.to_vec(),
        }
    }

    /// A bitfield with every one of `piece_count` pieces set.
    pub fn full(piece_count: usize) -> Self {
        let mut bf = Self::new(piece_count);
        for index in 0..piece_count {
            bf.set_piece(index);
        }
        bf
    }

    pub fn has_piece(&self, index: usize) -> bool {
        self.bits
            .get(index / 8)
            .is_some_and(|byte| (byte >> (7 - (index % 8))) & 1 == 1)
    }

    pub fn set_piece(&mut self, index: usize) {
        let byte_index = index / 8;
        if byte_index >= self.bits.len() {
            self.bits.resize(byte_index + 1, 0);
        }
        self.bits[byte_index] |= 1 << (7 - (index % 8));
    }

    /// Number of pieces available.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bits)
    }
}
