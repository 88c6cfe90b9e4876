//! Bitboard helpers and the precomputed attack tables shared by every component.
//!
//! A bitboard is a 64-bit integer where each bit represents a square on the chess board.
//! Square indexing: a1 = 0, b1 = 1, ..., h1 = 7, a2 = 8, ..., h8 = 63
//!
//! `AttackTables` is built once with an explicit `AttackTables::build()` call and then shared
//! read-only (by reference or `Arc`) between all threads. Nothing here is global.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::magic::{MagicTable, Slider};
use crate::types::{Color, NO_EN_PASSANT};
use crate::zobrist::ZobristKeys;

pub const RANK_2: u64 = 0x0000_0000_0000_FF00;
pub const RANK_7: u64 = 0x00FF_0000_0000_0000;

/// Convert a square index to a bitboard with that single bit set
#[inline(always)]
pub const fn sq_to_bb(sq: u8) -> u64 {
    1u64 << sq
}

/// Rank (0-7) of a square index
#[inline(always)]
pub const fn sq_rank(sq: u8) -> u8 {
    sq >> 3
}

/// File (0-7) of a square index
#[inline(always)]
pub const fn sq_file(sq: u8) -> u8 {
    sq & 7
}

/// Index of the lowest set bit. The board must be non-empty.
#[inline(always)]
pub fn lsb(bb: u64) -> u8 {
    debug_assert!(bb != 0);
    bb.trailing_zeros() as u8
}

/// Iterate over set bits in a bitboard, returning square indices in ascending order
pub struct BitboardIter(pub u64);

impl Iterator for BitboardIter {
    type Item = u8;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            None
        } else {
            let sq = self.0.trailing_zeros() as u8;
            self.0 &= self.0 - 1; // Clear the lowest set bit
            Some(sq)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (-2, -1), (-2, 1), (-1, -2), (-1, 2),
    (1, -2), (1, 2), (2, -1), (2, 1),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Directions: 0..4 straight (N, S, E, W), 4..8 diagonal (NE, NW, SE, SW)
const DIRECTIONS: [(i8, i8); 8] = [
    (1, 0), (-1, 0), (0, 1), (0, -1),
    (1, 1), (1, -1), (-1, 1), (-1, -1),
];

/// Precomputed lookup tables
#[derive(Debug, Clone)]
pub struct AttackTables {
    /// Knight attacks for each square
    pub knight: [u64; 64],
    /// King attacks for each square
    pub king: [u64; 64],
    /// Pawn attacks for each color and square: pawn_attacks[color as usize][square]
    pub pawn_attacks: [[u64; 64]; 2],
    /// Single push plus, from the starting rank, the double-push square
    pub pawn_pushes: [[u64; 64]; 2],
    /// En-passant destination for a pawn on `sq` given the en-passant file,
    /// indexed `[color][sq * 9 + file]`; zero when no capture is possible
    en_passant_targets: [Vec<u64>; 2],
    /// Rook rays to the edge of the board, no blockers
    pub rook_all: [u64; 64],
    /// Bishop rays to the edge of the board, no blockers
    pub bishop_all: [u64; 64],
    /// Squares strictly between two aligned squares
    line: Vec<u64>,
    /// `line` plus both endpoints; a single square when both endpoints coincide
    line_inclusive: Vec<u64>,
    /// `line` restricted to rank/file alignments
    line_straight: Vec<u64>,
    /// `line` restricted to diagonal alignments
    line_diagonal: Vec<u64>,
    /// Whole rank/file through two aligned squares, both endpoints removed
    straight_to_edge: Vec<u64>,
    /// Whole diagonal through two aligned squares, both endpoints removed
    diagonal_to_edge: Vec<u64>,
    rook: MagicTable,
    bishop: MagicTable,
    pub zobrist: ZobristKeys,
}

impl AttackTables {
    /// Build all tables, seeding the magic search from the OS entropy source.
    pub fn build() -> Self {
        Self::build_with_rng(&mut StdRng::from_entropy())
    }

    /// Build with a fixed seed for the magic search. Lookups are identical for every seed;
    /// only the multipliers differ.
    pub fn build_with_seed(seed: u64) -> Self {
        Self::build_with_rng(&mut StdRng::seed_from_u64(seed))
    }

    pub fn build_with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let start = Instant::now();

        let mut knight = [0u64; 64];
        let mut king = [0u64; 64];
        let mut pawn_attacks = [[0u64; 64]; 2];
        let mut pawn_pushes = [[0u64; 64]; 2];
        let mut rook_all = [0u64; 64];
        let mut bishop_all = [0u64; 64];

        for sq in 0..64u8 {
            let s = sq as usize;
            knight[s] = leaper_attacks(sq, &KNIGHT_DELTAS);
            king[s] = leaper_attacks(sq, &KING_DELTAS);
            pawn_attacks[0][s] = leaper_attacks(sq, &[(1, -1), (1, 1)]);
            pawn_attacks[1][s] = leaper_attacks(sq, &[(-1, -1), (-1, 1)]);

            let rank = sq_rank(sq);
            if (1..7).contains(&rank) {
                pawn_pushes[0][s] = sq_to_bb(sq + 8);
                pawn_pushes[1][s] = sq_to_bb(sq - 8);
                if rank == 1 {
                    pawn_pushes[0][s] |= sq_to_bb(sq + 16);
                }
                if rank == 6 {
                    pawn_pushes[1][s] |= sq_to_bb(sq - 16);
                }
            }

            rook_all[s] = Slider::Rook.attacks_slow(sq, 0);
            bishop_all[s] = Slider::Bishop.attacks_slow(sq, 0);
        }

        let mut en_passant_targets = [vec![0u64; 64 * 9], vec![0u64; 64 * 9]];
        for sq in 0..64u8 {
            for file in 0..8u8 {
                if sq_file(sq).abs_diff(file) != 1 {
                    continue;
                }
                let index = sq as usize * 9 + file as usize;
                // White captures from rank 5 onto rank 6, black from rank 4 onto rank 3
                if sq_rank(sq) == 4 {
                    en_passant_targets[0][index] = sq_to_bb(40 + file);
                }
                if sq_rank(sq) == 3 {
                    en_passant_targets[1][index] = sq_to_bb(16 + file);
                }
            }
        }

        let mut line = vec![0u64; 64 * 64];
        let mut line_inclusive = vec![0u64; 64 * 64];
        let mut line_straight = vec![0u64; 64 * 64];
        let mut line_diagonal = vec![0u64; 64 * 64];
        let mut straight_to_edge = vec![0u64; 64 * 64];
        let mut diagonal_to_edge = vec![0u64; 64 * 64];

        for from in 0..64u8 {
            line_inclusive[from as usize * 64 + from as usize] = sq_to_bb(from);

            for (dir, &(dr, df)) in DIRECTIONS.iter().enumerate() {
                let straight = dir < 4;
                let full_line = ray(from, dr, df) | ray(from, -dr, -df);

                let mut between = 0u64;
                let mut r = sq_rank(from) as i8 + dr;
                let mut f = sq_file(from) as i8 + df;
                while (0..8).contains(&r) && (0..8).contains(&f) {
                    let to = (r * 8 + f) as u8;
                    let index = from as usize * 64 + to as usize;
                    let to_bb = sq_to_bb(to);

                    line[index] = between;
                    line_inclusive[index] = between | sq_to_bb(from) | to_bb;
                    if straight {
                        line_straight[index] = between;
                        straight_to_edge[index] = full_line & !to_bb;
                    } else {
                        line_diagonal[index] = between;
                        diagonal_to_edge[index] = full_line & !to_bb;
                    }

                    between |= to_bb;
                    r += dr;
                    f += df;
                }
            }
        }

        let rook = MagicTable::build(Slider::Rook, rng);
        let bishop = MagicTable::build(Slider::Bishop, rng);

        let tables = AttackTables {
            knight,
            king,
            pawn_attacks,
            pawn_pushes,
            en_passant_targets,
            rook_all,
            bishop_all,
            line,
            line_inclusive,
            line_straight,
            line_diagonal,
            straight_to_edge,
            diagonal_to_edge,
            rook,
            bishop,
            zobrist: ZobristKeys::new(),
        };
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "attack tables built");
        tables
    }

    #[inline(always)]
    pub fn rook_attacks(&self, sq: u8, occupied: u64) -> u64 {
        self.rook.attacks(sq, occupied)
    }

    #[inline(always)]
    pub fn bishop_attacks(&self, sq: u8, occupied: u64) -> u64 {
        self.bishop.attacks(sq, occupied)
    }

    #[inline(always)]
    pub fn queen_attacks(&self, sq: u8, occupied: u64) -> u64 {
        self.rook_attacks(sq, occupied) | self.bishop_attacks(sq, occupied)
    }

    #[inline(always)]
    pub fn pawn_attacks(&self, color: Color, sq: u8) -> u64 {
        self.pawn_attacks[color.index()][sq as usize]
    }

    #[inline(always)]
    pub fn pawn_pushes(&self, color: Color, sq: u8) -> u64 {
        self.pawn_pushes[color.index()][sq as usize]
    }

    #[inline(always)]
    pub fn en_passant_target(&self, color: Color, sq: u8, file: u8) -> u64 {
        if file == NO_EN_PASSANT {
            return 0;
        }
        self.en_passant_targets[color.index()][sq as usize * 9 + file as usize]
    }

    #[inline(always)]
    pub fn line(&self, a: u8, b: u8) -> u64 {
        self.line[a as usize * 64 + b as usize]
    }

    #[inline(always)]
    pub fn line_inclusive(&self, a: u8, b: u8) -> u64 {
        self.line_inclusive[a as usize * 64 + b as usize]
    }

    #[inline(always)]
    pub fn line_straight(&self, a: u8, b: u8) -> u64 {
        self.line_straight[a as usize * 64 + b as usize]
    }

    #[inline(always)]
    pub fn line_diagonal(&self, a: u8, b: u8) -> u64 {
        self.line_diagonal[a as usize * 64 + b as usize]
    }

    #[inline(always)]
    pub fn straight_to_edge(&self, a: u8, b: u8) -> u64 {
        self.straight_to_edge[a as usize * 64 + b as usize]
    }

    #[inline(always)]
    pub fn diagonal_to_edge(&self, a: u8, b: u8) -> u64 {
        self.diagonal_to_edge[a as usize * 64 + b as usize]
    }
}

fn leaper_attacks(sq: u8, deltas: &[(i8, i8)]) -> u64 {
    let rank = sq_rank(sq) as i8;
    let file = sq_file(sq) as i8;
    deltas
        .iter()
        .filter_map(|&(dr, df)| {
            let (r, f) = (rank + dr, file + df);
            ((0..8).contains(&r) && (0..8).contains(&f)).then(|| sq_to_bb((r * 8 + f) as u8))
        })
        .fold(0, |acc, bb| acc | bb)
}

/// Empty-board ray from `sq` (exclusive) to the edge.
fn ray(sq: u8, dr: i8, df: i8) -> u64 {
    let mut bb = 0u64;
    let mut r = sq_rank(sq) as i8 + dr;
    let mut f = sq_file(sq) as i8 + df;
    while (0..8).contains(&r) && (0..8).contains(&f) {
        bb |= sq_to_bb((r * 8 + f) as u8);
        r += dr;
        f += df;
    }
    bb
}
