//! Making moves on a `Board`.
//!
//! Every mutation XORs the matching Zobrist key into the hash as it happens, so after
//! `apply` the hash describes exactly the new board with the other side to move.

use crate::bitboard::sq_to_bb;
use crate::board::Board;
use crate::moves::{Move, MoveKind};
use crate::types::{CastleRights, Color, PieceType, NO_EN_PASSANT};
use crate::zobrist::ZobristKeys;

/// Castle rights that survive a move touching each square. Moving from or onto a corner
/// or a king's home square drops the matching rights.
const CASTLE_KEEP: [u8; 64] = {
    let mut keep = [15u8; 64];
    keep[0] = 15 & !CastleRights::WHITE_QUEEN_SIDE;
    keep[4] = 15 & !(CastleRights::WHITE_KING_SIDE | CastleRights::WHITE_QUEEN_SIDE);
    keep[7] = 15 & !CastleRights::WHITE_KING_SIDE;
    keep[56] = 15 & !CastleRights::BLACK_QUEEN_SIDE;
    keep[60] = 15 & !(CastleRights::BLACK_KING_SIDE | CastleRights::BLACK_QUEEN_SIDE);
    keep[63] = 15 & !CastleRights::BLACK_KING_SIDE;
    keep
};

impl Board {
    /// Play a legal move for whichever side owns the from-square.
    pub fn apply(&mut self, keys: &ZobristKeys, mv: Move) {
        let from = mv.from();
        let to = mv.to();
        let piece = mv.piece();
        let us = if self.white & sq_to_bb(from) != 0 {
            Color::White
        } else {
            Color::Black
        };
        debug_assert!(self.color_bb(us) & sq_to_bb(from) != 0, "no piece on {from} for {mv:?}");

        let old_rights = self.castle_rights;
        let old_en_passant = self.en_passant_file;
        let mut new_en_passant = NO_EN_PASSANT;
        let mut hash = self.hash ^ keys.side_to_move;

        match mv.kind() {
            MoveKind::Normal => {
                hash ^= self.move_piece(keys, us, piece, from, to);
            }
            MoveKind::Capture => {
                hash ^= self.remove_captured(keys, us.other(), to);
                hash ^= self.move_piece(keys, us, piece, from, to);
            }
            MoveKind::DoublePush => {
                hash ^= self.move_piece(keys, us, PieceType::Pawn, from, to);
                new_en_passant = from & 7;
            }
            MoveKind::EnPassant => {
                debug_assert!(old_en_passant < NO_EN_PASSANT);
                // The captured pawn stands beside the mover, on the en-passant file
                let captured = (from & !7) | old_en_passant;
                hash ^= self.remove_captured(keys, us.other(), captured);
                hash ^= self.move_piece(keys, us, PieceType::Pawn, from, to);
            }
            MoveKind::Castle => {
                let (rook_from, rook_to) = if to > from {
                    (from + 3, from + 1)
                } else {
                    (from - 4, from - 1)
                };
                hash ^= self.move_piece(keys, us, PieceType::King, from, to);
                hash ^= self.move_piece(keys, us, PieceType::Rook, rook_from, rook_to);
            }
            kind => {
                let promoted = match kind.promotion_piece() {
                    Some(promoted) => promoted,
                    None => unreachable!("every other kind is handled above"),
                };
                if kind.is_capture() {
                    hash ^= self.remove_captured(keys, us.other(), to);
                }
                hash ^= self.toggle(keys, us, PieceType::Pawn, from);
                hash ^= self.toggle(keys, us, promoted, to);
            }
        }

        let new_rights = CastleRights(old_rights.0 & CASTLE_KEEP[from as usize] & CASTLE_KEEP[to as usize]);
        hash ^= keys.castle(old_rights, new_rights) ^ keys.en_passant(old_en_passant, new_en_passant);

        self.castle_rights = new_rights;
        self.en_passant_file = new_en_passant;
        self.hash = hash;
        debug_assert!(self.is_consistent(), "inconsistent board after {mv:?}");
    }

    /// Copying variant of `apply`.
    #[inline]
    pub fn after(&self, keys: &ZobristKeys, mv: Move) -> Board {
        let mut next = *self;
        next.apply(keys, mv);
        next
    }

    /// Flip one non-king piece on or off a square, returning the hash delta.
    #[inline(always)]
    fn toggle(&mut self, keys: &ZobristKeys, color: Color, piece: PieceType, sq: u8) -> u64 {
        let bb = sq_to_bb(sq);
        *self.piece_bb_mut(piece) ^= bb;
        *self.color_bb_mut(color) ^= bb;
        keys.piece(color, piece, sq)
    }

    #[inline(always)]
    fn move_piece(&mut self, keys: &ZobristKeys, color: Color, piece: PieceType, from: u8, to: u8) -> u64 {
        let from_to = sq_to_bb(from) | sq_to_bb(to);
        *self.color_bb_mut(color) ^= from_to;
        if piece == PieceType::King {
            match color {
                Color::White => self.white_king = to,
                Color::Black => self.black_king = to,
            }
        } else {
            *self.piece_bb_mut(piece) ^= from_to;
        }
        keys.piece(color, piece, from) ^ keys.piece(color, piece, to)
    }

    /// Clear an enemy piece from `sq`, whatever its type.
    #[inline(always)]
    fn remove_captured(&mut self, keys: &ZobristKeys, color: Color, sq: u8) -> u64 {
        let captured = self.piece_type_at(sq);
        debug_assert!(captured != PieceType::King, "capturing a king on {sq}");
        let keep = !sq_to_bb(sq);
        self.pawn &= keep;
        self.knight &= keep;
        self.bishop &= keep;
        self.rook &= keep;
        self.queen &= keep;
        *self.color_bb_mut(color) &= keep;
        keys.piece(color, captured, sq)
    }
}
