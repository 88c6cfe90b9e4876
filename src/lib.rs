pub mod types;
pub mod error;
pub mod magic;
pub mod zobrist;
pub mod bitboard;
pub mod moves;
pub mod movelist;
pub mod board;
pub mod legality;
pub mod movegen;
pub mod apply;
pub mod stats;
pub mod tt;
pub mod perft;
pub mod pipeline;
pub mod engine;
