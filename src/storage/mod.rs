//! Storage module
//!
//! Handles piece bookkeeping, block scheduling and the output file.

pub mod file;
pub mod manager;
pub mod piece;

// Re-export piece types
pub use piece::{Block, BlockStatus, Piece, BLOCK_SIZE};

// Re-export file storage types
pub use file::OutputFile;

// Re-export manager types
pub use manager::{
    peer_label, BlockOutcome, BlockRequest, ManagerError, PeerId, PendingRequest, PieceManager, ProgressSnapshot,
    REQUEST_TIMEOUT,
};
