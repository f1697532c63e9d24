//! Piece storage module
//!
//! A piece is split into 16 KiB blocks, the unit of network requests. Blocks
//! collect their payloads until the piece is complete and can be verified.

use sha1::{Digest, Sha1};
use tracing::trace;

use crate::protocol::ProtocolError;

/// Size of a requested block
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Status of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStatus {
    /// Not requested yet, or reset after a failed hash check
    #[default]
    Missing,
    /// Requested from a peer, not yet received
    Pending,
    /// Payload stored
    Retrieved,
}

/// Represents a block within a piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Piece index this block belongs to
    pub piece_index: u32,
    /// Offset within the piece
    pub offset: u32,
    /// Length of the block
    pub length: u32,
    pub status: BlockStatus,
    /// Payload, present once retrieved
    pub data: Option<Vec<u8>>,
}

impl Block {
    /// Create a new missing block
    pub fn new(piece_index: u32, offset: u32, length: u32) -> Self {
        Self {
            piece_index,
            offset,
            length,
            status: BlockStatus::Missing,
            data: None,
        }
    }

    fn reset(&mut self) {
        self.status = BlockStatus::Missing;
        self.data = None;
    }
}

/// Represents a piece of the torrent
#[derive(Debug, Clone)]
pub struct Piece {
    /// Piece index
    pub index: u32,
    /// Expected SHA1 hash
    pub hash: [u8; 20],
    /// Blocks in offset order
    pub blocks: Vec<Block>,
}

impl Piece {
    /// Create a new piece of `length` bytes; only the last block may be short.
    ///
    /// `length` must not exceed [`MAX_PIECE_LENGTH`](crate::torrent::MAX_PIECE_LENGTH) so block offsets fit the
    /// 32-bit wire fields.
    pub fn new(index: u32, length: u64, expected_hash: [u8; 20]) -> Self {
        let mut blocks = Vec::with_capacity(length.div_ceil(BLOCK_SIZE as u64) as usize);
        let mut offset = 0u64;
        while offset < length {
            let block_length = (length - offset).min(BLOCK_SIZE as u64) as u32;
            blocks.push(Block::new(index, offset as u32, block_length));
            offset += block_length as u64;
        }

        Self {
            index,
            hash: expected_hash,
            blocks,
        }
    }

    /// Total length of the piece
    pub fn length(&self) -> u64 {
        self.blocks.iter().map(|b| b.length as u64).sum()
    }

    /// First missing block, marked pending
    pub fn next_missing_block(&mut self) -> Option<&Block> {
        let block = self.blocks.iter_mut().find(|b| b.status == BlockStatus::Missing)?;
        block.status = BlockStatus::Pending;
        Some(block)
    }

    /// Mark the block at `offset` pending again (re-issued request)
    pub fn mark_pending(&mut self, offset: u32) {
        if let Some(block) = self.block_mut(offset) {
            if block.status != BlockStatus::Retrieved {
                block.status = BlockStatus::Pending;
            }
        }
    }

    /// Store a block payload.
    ///
    /// The offset must be a block boundary and the payload must match the
    /// block length.
    pub fn block_received(&mut self, offset: u32, data: Vec<u8>) -> Result<(), ProtocolError> {
        let index = self.index;
        let block = self
            .block_mut(offset)
            .ok_or(ProtocolError::UnknownBlock { index, offset })?;

        if data.len() != block.length as usize {
            return Err(ProtocolError::BlockLengthMismatch {
                index,
                offset,
                expected: block.length,
                actual: data.len(),
            });
        }

        block.status = BlockStatus::Retrieved;
        block.data = Some(data);
        trace!("Stored block {}/{}", index, offset);
        Ok(())
    }

    /// Check if all blocks are retrieved
    pub fn is_complete(&self) -> bool {
        self.blocks.iter().all(|b| b.status == BlockStatus::Retrieved)
    }

    /// Compare the SHA1 of the assembled blocks with the expected hash.
    ///
    /// Only meaningful once the piece is complete.
    pub fn is_hash_matching(&self) -> bool {
        let mut hasher = Sha1::new();
        for block in &self.blocks {
            if let Some(data) = &block.data {
                hasher.update(data);
            }
        }
        hasher.finalize().as_slice() == self.hash
    }

    /// Concatenated block payloads in offset order
    pub fn data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.length() as usize);
        for block in &self.blocks {
            if let Some(bytes) = &block.data {
                data.extend_from_slice(bytes);
            }
        }
        data
    }

    /// Reset every block to missing and drop payloads
    pub fn reset(&mut self) {
        self.blocks.iter_mut().for_each(Block::reset);
    }

    /// Drop payloads but keep block statuses; used once the piece is on disk
    pub fn release_data(&mut self) {
        for block in &mut self.blocks {
            block.data = None;
        }
    }

    fn block_mut(&mut self, offset: u32) -> Option<&mut Block> {
        if offset % BLOCK_SIZE != 0 {
            return None;
        }
        self.blocks.get_mut((offset / BLOCK_SIZE) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha1(data: &[u8]) -> [u8; 20] {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&Sha1::digest(data));
        hash
    }

    #[test]
    fn test_block_new() {
        let block = Block::new(3, 16384, 1024);
        assert_eq!(block.piece_index, 3);
        assert_eq!(block.offset, 16384);
        assert_eq!(block.length, 1024);
        assert_eq!(block.status, BlockStatus::Missing);
        assert!(block.data.is_none());
    }

    #[test]
    fn test_piece_new_block_layout() {
        let piece = Piece::new(0, 40_000, [0u8; 20]);
        let layout: Vec<_> = piece.blocks.iter().map(|b| (b.offset, b.length)).collect();
        assert_eq!(layout, vec![(0, 16384), (16384, 16384), (32768, 7232)]);
        assert_eq!(piece.length(), 40_000);
    }

    #[test]
    fn test_piece_exact_multiple() {
        let piece = Piece::new(1, 32 * 1024, [0u8; 20]);
        assert_eq!(piece.blocks.len(), 2);
        assert!(piece.blocks.iter().all(|b| b.length == BLOCK_SIZE));
    }

    #[test]
    fn test_next_missing_block_marks_pending() {
        let mut piece = Piece::new(0, 32 * 1024, [0u8; 20]);

        assert_eq!(piece.next_missing_block().map(|b| b.offset), Some(0));
        assert_eq!(piece.blocks[0].status, BlockStatus::Pending);
        assert_eq!(piece.next_missing_block().map(|b| b.offset), Some(BLOCK_SIZE));
        assert!(piece.next_missing_block().is_none());
    }

    #[test]
    fn test_is_complete_after_last_block() {
        let data = vec![5u8; 20_000];
        let mut piece = Piece::new(0, 20_000, sha1(&data));

        piece.block_received(0, data[..16384].to_vec()).unwrap();
        assert!(!piece.is_complete());
        piece.block_received(16384, data[16384..].to_vec()).unwrap();
        assert!(piece.is_complete());
        assert!(piece.is_hash_matching());
        assert_eq!(piece.data(), data);
    }

    #[test]
    fn test_hash_mismatch_and_reset() {
        let data = vec![5u8; 100];
        let mut piece = Piece::new(0, 100, sha1(&data));

        let mut tampered = data.clone();
        tampered[10] = 6;
        piece.block_received(0, tampered).unwrap();
        assert!(piece.is_complete());
        assert!(!piece.is_hash_matching());

        piece.reset();
        assert!(piece.blocks.iter().all(|b| b.status == BlockStatus::Missing && b.data.is_none()));
        assert_eq!(piece.next_missing_block().map(|b| b.offset), Some(0));
    }

    #[test]
    fn test_block_received_errors() {
        let mut piece = Piece::new(2, 20_000, [0u8; 20]);

        assert_eq!(
            piece.block_received(100, vec![0; 10]),
            Err(ProtocolError::UnknownBlock { index: 2, offset: 100 })
        );
        assert_eq!(
            piece.block_received(3 * BLOCK_SIZE, vec![0; 10]),
            Err(ProtocolError::UnknownBlock { index: 2, offset: 3 * BLOCK_SIZE })
        );
        assert_eq!(
            piece.block_received(BLOCK_SIZE, vec![0; 10]),
            Err(ProtocolError::BlockLengthMismatch {
                index: 2,
                offset: BLOCK_SIZE,
                expected: 20_000 - BLOCK_SIZE,
                actual: 10,
            })
        );
    }
}
