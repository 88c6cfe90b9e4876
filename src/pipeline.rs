//! Batched multi-ply expansion.
//!
//! A pass takes a batch of root boards, all with the same side to move, and expands them up to
//! three plies. Each ply runs as separate stages with a join between them:
//!
//! 1. count: legal move count per board
//! 2. scan: exclusive prefix sum of the counts, giving every board its output offset
//! 3. generate: moves written straight into the board's slot of an exactly sized buffer
//!
//! Intermediate boards are never stored; a board of level `n` is rebuilt from its root and the
//! first `n` moves of its `MoveChain`. After the last ply every leaf is classified, the flags
//! are packed 64 leaves to a word, and per-root totals are popcounts over word ranges.

use std::mem;

use rayon::prelude::*;
use tracing::trace;

use crate::bitboard::AttackTables;
use crate::board::Board;
use crate::legality::compute_masks;
use crate::movegen::{count_with_masks, generate};
use crate::movelist::SliceSink;
use crate::moves::{Move, MoveChain};
use crate::stats::{classify_leaf, LeafFlags, PerftStats, STAT_COUNT};
use crate::types::{CastleRights, Color};

/// Boards per parallel job in the generate stage
const GENERATE_CHUNK: usize = 256;
/// Entries per parallel job in the scan
const SCAN_CHUNK: usize = 4096;
const WORD_BITS: usize = 64;

/// Root boards in structure-of-arrays form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardLayer {
    pub pawn: Vec<u64>,
    pub knight: Vec<u64>,
    pub bishop: Vec<u64>,
    pub rook: Vec<u64>,
    pub queen: Vec<u64>,
    pub white: Vec<u64>,
    pub black: Vec<u64>,
    pub white_king: Vec<u8>,
    pub black_king: Vec<u8>,
    pub castle_rights: Vec<u8>,
    pub en_passant_file: Vec<u8>,
    pub hash: Vec<u64>,
}

impl BoardLayer {
    pub fn with_capacity(capacity: usize) -> Self {
        BoardLayer {
            pawn: Vec::with_capacity(capacity),
            knight: Vec::with_capacity(capacity),
            bishop: Vec::with_capacity(capacity),
            rook: Vec::with_capacity(capacity),
            queen: Vec::with_capacity(capacity),
            white: Vec::with_capacity(capacity),
            black: Vec::with_capacity(capacity),
            white_king: Vec::with_capacity(capacity),
            black_king: Vec::with_capacity(capacity),
            castle_rights: Vec::with_capacity(capacity),
            en_passant_file: Vec::with_capacity(capacity),
            hash: Vec::with_capacity(capacity),
        }
    }

    pub fn from_boards(boards: &[Board]) -> Self {
        let mut layer = BoardLayer::with_capacity(boards.len());
        for board in boards {
            layer.push(board);
        }
        layer
    }

    pub fn push(&mut self, board: &Board) {
        self.pawn.push(board.pawn);
        self.knight.push(board.knight);
        self.bishop.push(board.bishop);
        self.rook.push(board.rook);
        self.queen.push(board.queen);
        self.white.push(board.white);
        self.black.push(board.black);
        self.white_king.push(board.white_king);
        self.black_king.push(board.black_king);
        self.castle_rights.push(board.castle_rights.0);
        self.en_passant_file.push(board.en_passant_file);
        self.hash.push(board.hash);
    }

    pub fn len(&self) -> usize {
        self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }

    /// Gather slot `idx` back into a `Board`.
    #[inline]
    pub fn board(&self, idx: usize) -> Board {
        Board {
            pawn: self.pawn[idx],
            knight: self.knight[idx],
            bishop: self.bishop[idx],
            rook: self.rook[idx],
            queen: self.queen[idx],
            white: self.white[idx],
            black: self.black[idx],
            white_king: self.white_king[idx],
            black_king: self.black_king[idx],
            castle_rights: CastleRights(self.castle_rights[idx]),
            en_passant_file: self.en_passant_file[idx],
            hash: self.hash[idx],
        }
    }
}

/// One expansion level: a move chain and the root it starts from, per board.
#[derive(Debug, Clone, Default)]
pub struct MoveLayer {
    pub chains: Vec<MoveChain>,
    /// Index into the root `BoardLayer`; ascending
    pub roots: Vec<u32>,
    /// Moves already in every chain
    pub plies: usize,
}

impl MoveLayer {
    /// Level 0: every root with an empty chain.
    pub fn roots(count: usize) -> Self {
        MoveLayer {
            chains: vec![MoveChain::EMPTY; count],
            roots: (0..count as u32).collect(),
            plies: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Rebuild board `idx` of this level.
    #[inline]
    pub fn board(&self, tables: &AttackTables, roots: &BoardLayer, idx: usize) -> Board {
        let mut board = roots.board(self.roots[idx] as usize);
        for mv in self.chains[idx].moves(self.plies) {
            board.apply(&tables.zobrist, mv);
        }
        board
    }

    /// Range of entries descending from root `root`.
    pub fn root_range(&self, root: u32) -> (usize, usize) {
        let start = self.roots.partition_point(|&r| r < root);
        let end = self.roots.partition_point(|&r| r <= root);
        (start, end)
    }
}

/// Leaf flags packed one bit per leaf, `STAT_COUNT` words per 64 leaves.
#[derive(Debug, Clone, Default)]
pub struct StatsLayer {
    words: Vec<[u64; STAT_COUNT]>,
    len: usize,
}

impl StatsLayer {
    pub fn pack(leaves: &[LeafFlags]) -> Self {
        let words = leaves
            .par_chunks(WORD_BITS)
            .map(|chunk| {
                let mut word = [0u64; STAT_COUNT];
                for (bit, leaf) in chunk.iter().enumerate() {
                    let counters = leaf.counter_mask();
                    for (category, w) in word.iter_mut().enumerate() {
                        *w |= u64::from((counters >> category) & 1) << bit;
                    }
                }
                word
            })
            .collect();
        StatsLayer {
            words,
            len: leaves.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Popcount every category over leaves `start..end`.
    pub fn reduce_range(&self, start: usize, end: usize) -> PerftStats {
        debug_assert!(start <= end && end <= self.len);
        let mut totals = [0u64; STAT_COUNT];
        if start == end {
            return PerftStats::default();
        }

        let first = start / WORD_BITS;
        let last = (end - 1) / WORD_BITS;
        for (w, word) in self.words[first..=last].iter().enumerate() {
            let w = first + w;
            let lo = if w == first { start % WORD_BITS } else { 0 };
            let hi = if w == last { (end - 1) % WORD_BITS + 1 } else { WORD_BITS };
            let mask = bit_range(lo, hi);
            for (total, bits) in totals.iter_mut().zip(word) {
                *total += u64::from((bits & mask).count_ones());
            }
        }
        PerftStats::from_array(totals)
    }

    pub fn reduce(&self) -> PerftStats {
        self.words
            .par_iter()
            .map(|&word| PerftStats::from_array(word.map(|bits| u64::from(bits.count_ones()))))
            .sum()
    }
}

/// Bits `lo..hi` set.
#[inline]
fn bit_range(lo: usize, hi: usize) -> u64 {
    let upper = if hi == WORD_BITS { !0 } else { (1u64 << hi) - 1 };
    upper & !((1u64 << lo) - 1)
}

/// Exclusive prefix sum of `counts`, and the grand total.
pub fn exclusive_scan(counts: &[u32]) -> (Vec<usize>, usize) {
    let chunk_totals: Vec<usize> = counts
        .par_chunks(SCAN_CHUNK)
        .map(|chunk| chunk.iter().map(|&n| n as usize).sum())
        .collect();

    let mut chunk_offsets = Vec::with_capacity(chunk_totals.len());
    let mut total = 0;
    for chunk_total in chunk_totals {
        chunk_offsets.push(total);
        total += chunk_total;
    }

    let mut offsets = vec![0usize; counts.len()];
    offsets
        .par_chunks_mut(SCAN_CHUNK)
        .zip(counts.par_chunks(SCAN_CHUNK))
        .zip(chunk_offsets.par_iter())
        .for_each(|((out, chunk), &base)| {
            let mut running = base;
            for (slot, &n) in out.iter_mut().zip(chunk) {
                *slot = running;
                running += n as usize;
            }
        });
    (offsets, total)
}

/// Cut `buf` into consecutive pieces starting at each of `starts` (the first must be 0) and
/// ending at `total`.
fn split_at_starts<'a, T>(mut buf: &'a mut [T], starts: &[usize], total: usize) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(starts.len());
    let mut consumed = 0;
    for &end in starts.iter().skip(1).chain(std::iter::once(&total)) {
        let (head, tail) = mem::take(&mut buf).split_at_mut(end - consumed);
        parts.push(head);
        buf = tail;
        consumed = end;
    }
    parts
}

#[inline]
fn side_at(root_side: Color, plies: usize) -> Color {
    if plies % 2 == 0 {
        root_side
    } else {
        root_side.other()
    }
}

/// Count stage: legal moves of every board in `level`.
pub fn count_level(tables: &AttackTables, roots: &BoardLayer, level: &MoveLayer, side: Color) -> Vec<u32> {
    (0..level.len())
        .into_par_iter()
        .map(|idx| {
            let board = level.board(tables, roots, idx);
            let masks = compute_masks(tables, &board, side);
            count_with_masks(tables, &board, side, &masks)
        })
        .collect()
}

/// Generate stage: expand `level` by one ply into a buffer of exactly `total` moves.
///
/// Panics if a board generates a different number of moves than it counted.
pub fn generate_level(
    tables: &AttackTables,
    roots: &BoardLayer,
    level: &MoveLayer,
    side: Color,
    counts: &[u32],
    offsets: &[usize],
    total: usize,
) -> MoveLayer {
    let ply = level.plies;
    if level.is_empty() {
        return MoveLayer {
            plies: ply + 1,
            ..MoveLayer::default()
        };
    }

    let mut moves = vec![Move::default(); total];
    let mut chains = vec![MoveChain::EMPTY; total];
    let mut next_roots = vec![0u32; total];

    let starts: Vec<usize> = offsets.iter().step_by(GENERATE_CHUNK).copied().collect();
    let move_parts = split_at_starts(&mut moves, &starts, total);
    let chain_parts = split_at_starts(&mut chains, &starts, total);
    let root_parts = split_at_starts(&mut next_roots, &starts, total);

    move_parts
        .into_par_iter()
        .zip(chain_parts)
        .zip(root_parts)
        .enumerate()
        .for_each(|(chunk, ((move_out, chain_out), root_out))| {
            let first = chunk * GENERATE_CHUNK;
            let last = (first + GENERATE_CHUNK).min(level.len());
            let base = offsets[first];

            for idx in first..last {
                let start = offsets[idx] - base;
                let count = counts[idx] as usize;
                let slots = &mut move_out[start..start + count];

                let board = level.board(tables, roots, idx);
                let masks = compute_masks(tables, &board, side);
                let mut sink = SliceSink::new(slots);
                generate(tables, &board, side, &masks, &mut sink);
                assert_eq!(
                    sink.written(),
                    count,
                    "move count mismatch at ply {ply} for board {idx}: counted {count}, generated {}",
                    sink.written()
                );

                let parent = level.chains[idx];
                for k in start..start + count {
                    chain_out[k] = parent.with(ply, move_out[k]);
                    root_out[k] = level.roots[idx];
                }
            }
        });

    MoveLayer {
        chains,
        roots: next_roots,
        plies: ply + 1,
    }
}

/// Classify stage: rebuild every leaf and flag what its last move did.
pub fn classify_level(tables: &AttackTables, roots: &BoardLayer, leaves: &MoveLayer, root_side: Color) -> Vec<LeafFlags> {
    assert!(leaves.plies > 0, "classifying the roots themselves");
    let last_ply = leaves.plies - 1;
    let defender = side_at(root_side, leaves.plies);

    (0..leaves.len())
        .into_par_iter()
        .map(|idx| {
            let board = leaves.board(tables, roots, idx);
            classify_leaf(tables, &board, leaves.chains[idx].get(last_ply), defender)
        })
        .collect()
}

/// Expand every root `plies` plies deep and return statistics per root.
pub fn expand(tables: &AttackTables, roots: &BoardLayer, side: Color, plies: usize) -> Vec<PerftStats> {
    assert!(
        (1..=MoveChain::MAX_PLIES).contains(&plies),
        "a pass covers 1 to {} plies, got {plies}",
        MoveChain::MAX_PLIES
    );

    let mut level = MoveLayer::roots(roots.len());
    for ply in 0..plies {
        let to_move = side_at(side, ply);
        let counts = count_level(tables, roots, &level, to_move);
        let (offsets, total) = exclusive_scan(&counts);
        trace!(ply, boards = level.len(), moves = total, "expanded level");
        level = generate_level(tables, roots, &level, to_move, &counts, &offsets, total);
    }

    let flags = classify_level(tables, roots, &level, side);
    let stats = StatsLayer::pack(&flags);
    trace!(leaves = stats.len(), "classified leaves");

    (0..roots.len() as u32)
        .into_par_iter()
        .map(|root| {
            let (start, end) = level.root_range(root);
            stats.reduce_range(start, end)
        })
        .collect()
}

/// `expand` summed over all roots.
pub fn expand_total(tables: &AttackTables, roots: &BoardLayer, side: Color, plies: usize) -> PerftStats {
    expand(tables, roots, side, plies).into_iter().sum()
}
