//! Destinations for generated moves.
//!
//! The generator is written once against `MoveSink`. `MoveList` materialises moves on the
//! stack; `MoveCounter` only counts them, adding whole target bitboards with a popcount,
//! which is what the pipeline's count stage needs.

use crate::bitboard::BitboardIter;
use crate::moves::{Move, MoveKind};
use crate::types::PieceType;

/// Maximum number of moves in any legal chess position.
/// The theoretical maximum is 218, but 256 provides nice alignment.
pub const MAX_MOVES: usize = 256;

pub trait MoveSink {
    fn push(&mut self, mv: Move);

    /// One move of `kind` from `from` to every square of `targets`, ascending.
    #[inline(always)]
    fn push_targets(&mut self, piece: PieceType, from: u8, targets: u64, kind: MoveKind) {
        for to in BitboardIter(targets) {
            self.push(Move::new(piece, from, to, kind));
        }
    }

    /// Pawn moves onto the last rank: four promotions per target, knight first.
    #[inline(always)]
    fn push_promotions(&mut self, from: u8, targets: u64, capture: bool) {
        let kinds = if capture {
            MoveKind::CAPTURE_PROMOTIONS
        } else {
            MoveKind::PROMOTIONS
        };
        for to in BitboardIter(targets) {
            for kind in kinds {
                self.push(Move::new(PieceType::Pawn, from, to, kind));
            }
        }
    }
}

/// Stack-allocated move list, about 1KB.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; MAX_MOVES],
    count: usize,
}

impl MoveList {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            moves: [Move(0); MAX_MOVES],
            count: 0,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get a move by index (copy by value - 4 bytes).
    #[inline(always)]
    pub fn get(&self, idx: usize) -> Move {
        debug_assert!(idx < self.count, "MoveList index out of bounds");
        self.moves[idx]
    }

    #[inline(always)]
    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.count]
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.as_slice().contains(&mv)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Move> + '_ {
        self.as_slice().iter().copied()
    }
}

impl MoveSink for MoveList {
    #[inline(always)]
    fn push(&mut self, mv: Move) {
        debug_assert!(self.count < MAX_MOVES, "MoveList overflow");
        self.moves[self.count] = mv;
        self.count += 1;
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveList")
            .field("count", &self.count)
            .field(
                "moves",
                &self.iter().take(10).map(Move::to_uci).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Counts moves without storing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoveCounter(pub u32);

impl MoveSink for MoveCounter {
    #[inline(always)]
    fn push(&mut self, _mv: Move) {
        self.0 += 1;
    }

    #[inline(always)]
    fn push_targets(&mut self, _piece: PieceType, _from: u8, targets: u64, _kind: MoveKind) {
        self.0 += targets.count_ones();
    }

    #[inline(always)]
    fn push_promotions(&mut self, _from: u8, targets: u64, _capture: bool) {
        self.0 += 4 * targets.count_ones();
    }
}

/// Writes into a pre-sized slice, as the pipeline's generate stage does with the slot the
/// scan stage reserved. Overrunning the slot is an invariant violation and panics.
pub struct SliceSink<'a> {
    slots: &'a mut [Move],
    written: usize,
}

impl<'a> SliceSink<'a> {
    pub fn new(slots: &'a mut [Move]) -> Self {
        SliceSink { slots, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl MoveSink for SliceSink<'_> {
    #[inline(always)]
    fn push(&mut self, mv: Move) {
        assert!(
            self.written < self.slots.len(),
            "generated more moves than counted ({} slots)",
            self.slots.len()
        );
        self.slots[self.written] = mv;
        self.written += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movelist_basic() {
        let mut list = MoveList::new();
        assert!(list.is_empty());

        let m1 = Move::new(PieceType::Pawn, 12, 28, MoveKind::DoublePush); // e2e4
        let m2 = Move::new(PieceType::Pawn, 12, 20, MoveKind::Normal); // e2e3
        list.push(m1);
        list.push(m2);

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0), m1);
        assert_eq!(list.get(1), m2);
        assert!(list.contains(m2));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![m1, m2]);

        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_push_targets_ascending() {
        let mut list = MoveList::new();
        // Rook a1 to a3, a2, b1
        list.push_targets(PieceType::Rook, 0, (1 << 16) | (1 << 8) | (1 << 1), MoveKind::Normal);
        let targets: Vec<u8> = list.iter().map(Move::to).collect();
        assert_eq!(targets, vec![1, 8, 16]);
    }

    #[test]
    fn test_counter_matches_list() {
        let mut list = MoveList::new();
        let mut counter = MoveCounter::default();
        let targets = 0b1011_0000u64;
        for sink in [&mut list as &mut dyn MoveSink, &mut counter] {
            sink.push_targets(PieceType::Knight, 1, targets, MoveKind::Normal);
            sink.push_promotions(52, (1 << 59) | (1 << 60), false);
            sink.push(Move::new(PieceType::King, 4, 6, MoveKind::Castle));
        }
        assert_eq!(list.len(), counter.0 as usize);
        assert_eq!(counter.0, 3 + 8 + 1);
        // Promotion order is knight, bishop, rook, queen
        assert_eq!(list.get(3).kind(), MoveKind::KnightPromotion);
        assert_eq!(list.get(6).kind(), MoveKind::QueenPromotion);
    }

    #[test]
    #[should_panic(expected = "generated more moves than counted")]
    fn test_slice_sink_overflow_panics() {
        let mut slots = [Move(0); 1];
        let mut sink = SliceSink::new(&mut slots);
        sink.push_targets(PieceType::Queen, 0, 0b110, MoveKind::Normal);
    }
}
