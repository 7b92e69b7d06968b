use super::error::PeerError;
use crate::metainfo::Piece;
use bytes::Bytes;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub piece: u32,
    pub offset: u32,
    pub length: u32,
}

impl BlockRequest {
    pub fn new(piece: u32, offset: u32, length: u32) -> Self {
        Self {
            piece,
            offset,
            length,
        }
    }
}

pub fn compute_block_count(piece_length: u64, block_size: u32) -> u32 {
    piece_length.div_ceil(block_size as u64) as u32
}

pub fn compute_block_length(piece_length: u64, block_index: u32, block_size: u32) -> u32 {
    let offset = block_index as u64 * block_size as u64;
    let remaining = piece_length.saturating_sub(offset);
    remaining.min(block_size as u64) as u32
}

/// Reassembly buffer for one piece.
///
/// Blocks are written at their declared offset, so the final buffer does not
/// depend on the order responses arrive in.
#[derive(Debug)]
pub struct PieceAssembler {
    index: u32,
    hash: [u8; 20],
    block_size: u32,
    buf: Vec<u8>,
    received: Vec<bool>,
    missing: usize,
}

impl PieceAssembler {
    pub fn new(piece: &Piece, block_size: u32) -> Self {
        let blocks = compute_block_count(piece.length, block_size) as usize;
        Self {
            index: piece.index,
            hash: piece.hash,
            block_size,
            buf: vec![0; piece.length as usize],
            received: vec![false; blocks],
            missing: blocks,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Requests for every block not yet received, in offset order.
    pub fn missing_requests(&self) -> Vec<BlockRequest> {
        self.received
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(i, _)| self.request_for(i as u32))
            .collect()
    }

    fn request_for(&self, block: u32) -> BlockRequest {
        BlockRequest::new(
            self.index,
            block * self.block_size,
            compute_block_length(self.buf.len() as u64, block, self.block_size),
        )
    }

    /// Stores a block. Returns `Ok(false)` for a duplicate.
    ///
    /// A block that does not line up with a block boundary or has the wrong
    /// length is a protocol violation.
    pub fn insert(&mut self, offset: u32, data: &[u8]) -> Result<bool, PeerError> {
        if offset % self.block_size != 0 {
            return Err(PeerError::Protocol(format!(
                "block offset {} is not aligned to {}",
                offset, self.block_size
            )));
        }

        let block = offset / self.block_size;
        let expected = self.request_for(block);
        if block as usize >= self.received.len() || data.len() != expected.length as usize {
            return Err(PeerError::Protocol(format!(
                "unexpected block at offset {} with {} bytes for piece {}",
                offset,
                data.len(),
                self.index
            )));
        }

        if self.received[block as usize] {
            return Ok(false);
        }

        let start = offset as usize;
        self.buf[start..start + data.len()].copy_from_slice(data);
        self.received[block as usize] = true;
        self.missing -= 1;
        Ok(true)
    }

    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    /// Consumes the assembler, returning the buffer if its SHA-1 matches.
    pub fn verify(self) -> Result<Bytes, PeerError> {
        let digest: [u8; 20] = Sha1::digest(&self.buf).into();
        if digest != self.hash {
            return Err(PeerError::PieceHashMismatch(self.index));
        }
        Ok(Bytes::from(self.buf))
    }
}
