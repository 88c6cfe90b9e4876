//! Error types for parsing positions at the engine boundary.
//!
//! Everything past the boundary assumes a valid position; invariant violations inside the
//! engine panic instead of returning these.

use thiserror::Error;

/// Errors that can occur while parsing a FEN string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// Fewer than the four mandatory fields
    #[error("FEN needs at least 4 space-separated fields, got {found}")]
    MissingField { found: usize },

    /// Piece placement does not describe eight ranks
    #[error("piece placement must have 8 ranks, got {found}")]
    BadRankCount { found: usize },

    /// A rank describes more or fewer than eight files
    #[error("rank {rank} of the placement covers {files} files")]
    BadRank { rank: u8, files: u32 },

    /// Unknown character in the placement field
    #[error("unexpected character {found:?} in piece placement")]
    BadPlacement { found: char },

    #[error("side to move must be `w` or `b`, got {found:?}")]
    BadSideToMove { found: String },

    #[error("invalid castling field {found:?}")]
    BadCastling { found: String },

    #[error("invalid en-passant field {found:?}")]
    BadEnPassant { found: String },

    #[error("invalid move counter {found:?}")]
    BadCounter { found: String },

    /// Each side needs exactly one king
    #[error("{color} has {count} kings")]
    KingCount { color: &'static str, count: u32 },
}

/// Result type alias for FEN parsing
pub type FenResult<T> = Result<T, FenError>;

/// Errors from building a `PerftEngine`
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("pipeline_plies must be between 1 and {max}, got {found}")]
    BadPipelinePlies { found: usize, max: usize },

    #[error("batch_size must be at least 1")]
    EmptyBatch,

    #[error("failed to start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
