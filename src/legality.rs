//! Check and pin detection.
//!
//! Everything is computed from the king outward: a square is attacked by an enemy knight
//! exactly when a knight standing on it would attack that knight, and likewise for the other
//! piece types (pawns use the table of the defending color).

use crate::bitboard::{lsb, sq_to_bb, AttackTables, BitboardIter};
use crate::board::Board;
use crate::types::Color;

/// Legality constraints for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckMasks {
    /// Enemy pieces giving check
    pub checkers: u64,
    pub num_checkers: u32,
    /// Squares non-king moves may land on: everything when not in check, the checker and
    /// the squares between it and the king under single check, nothing under double check
    pub move_mask: u64,
    /// Own pieces pinned to the king, diagonal and straight pins combined
    pub pin_mask: u64,
}

impl CheckMasks {
    #[inline(always)]
    pub fn in_check(&self) -> bool {
        self.checkers != 0
    }
}

/// Enemy pieces attacking the king of `side`.
pub fn checkers(tables: &AttackTables, board: &Board, side: Color) -> u64 {
    let king = board.king_square(side);
    attackers_to(tables, board, king, side.other(), board.occupied())
}

/// Pieces of color `by` attacking `sq` with the given occupancy.
#[inline]
pub fn attackers_to(tables: &AttackTables, board: &Board, sq: u8, by: Color, occupied: u64) -> u64 {
    let enemy = board.color_bb(by);
    (tables.bishop_attacks(sq, occupied) & board.diagonal_sliders(by))
        | (tables.rook_attacks(sq, occupied) & board.straight_sliders(by))
        | (tables.knight[sq as usize] & board.knight & enemy)
        | (tables.pawn_attacks(by.other(), sq) & board.pawn & enemy)
}

pub fn move_mask(tables: &AttackTables, king: u8, checkers: u64) -> u64 {
    match checkers.count_ones() {
        0 => !0,
        1 => checkers | tables.line_inclusive(king, lsb(checkers)),
        _ => 0,
    }
}

/// Own pieces pinned along a diagonal: for every enemy bishop or queen on a diagonal through
/// the king, a lone piece between the two.
pub fn pins_diagonal(tables: &AttackTables, board: &Board, side: Color) -> u64 {
    let king = board.king_square(side);
    let snipers = tables.bishop_all[king as usize] & board.diagonal_sliders(side.other());
    collect_pins(board, side, snipers, |slider| tables.line_diagonal(king, slider))
}

/// Own pieces pinned along a rank or file.
pub fn pins_straight(tables: &AttackTables, board: &Board, side: Color) -> u64 {
    let king = board.king_square(side);
    let snipers = tables.rook_all[king as usize] & board.straight_sliders(side.other());
    collect_pins(board, side, snipers, |slider| tables.line_straight(king, slider))
}

#[inline]
fn collect_pins(board: &Board, side: Color, snipers: u64, between: impl Fn(u8) -> u64) -> u64 {
    let occupied = board.occupied();
    let own = board.color_bb(side);
    let mut pinned = 0u64;
    for slider in BitboardIter(snipers) {
        let blockers = between(slider) & occupied;
        if blockers.count_ones() == 1 {
            pinned |= blockers & own;
        }
    }
    pinned
}

/// Checkers, move mask and pin mask for `side` to move.
pub fn compute_masks(tables: &AttackTables, board: &Board, side: Color) -> CheckMasks {
    let checkers = checkers(tables, board, side);
    CheckMasks {
        checkers,
        num_checkers: checkers.count_ones(),
        move_mask: move_mask(tables, board.king_square(side), checkers),
        pin_mask: pins_diagonal(tables, board, side) | pins_straight(tables, board, side),
    }
}

/// Every square attacked by `by`, sliders seeing through the defending king so that the
/// king cannot step back along a checking ray.
pub fn king_danger(tables: &AttackTables, board: &Board, by: Color) -> u64 {
    let defender_king = sq_to_bb(board.king_square(by.other()));
    attacked_squares(tables, board, by, board.occupied() & !defender_king)
}

pub fn attacked_squares(tables: &AttackTables, board: &Board, by: Color, occupied: u64) -> u64 {
    let enemy = board.color_bb(by);
    let mut attacked = tables.king[board.king_square(by) as usize];

    for sq in BitboardIter(board.pawn & enemy) {
        attacked |= tables.pawn_attacks(by, sq);
    }
    for sq in BitboardIter(board.knight & enemy) {
        attacked |= tables.knight[sq as usize];
    }
    for sq in BitboardIter(board.diagonal_sliders(by)) {
        attacked |= tables.bishop_attacks(sq, occupied);
    }
    for sq in BitboardIter(board.straight_sliders(by)) {
        attacked |= tables.rook_attacks(sq, occupied);
    }
    attacked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::tests::tables;
    use crate::board::Position;
    use crate::types::START_FEN;

    fn board(fen: &str) -> Board {
        Position::from_fen(fen, &tables().zobrist).unwrap().board
    }

    #[test]
    fn test_no_check_at_start() {
        let b = board(START_FEN);
        let masks = compute_masks(tables(), &b, Color::White);
        assert_eq!(masks.checkers, 0);
        assert_eq!(masks.move_mask, !0);
        assert_eq!(masks.pin_mask, 0);
    }

    #[test]
    fn test_single_slider_check() {
        // Black rook on e8 checks the king on e1
        let b = board("4r2k/8/8/8/8/8/8/4K3 w - - 0 1");
        let masks = compute_masks(tables(), &b, Color::White);
        assert_eq!(masks.checkers, sq_to_bb(60));
        assert_eq!(masks.num_checkers, 1);
        // e2..e8 (king square included by the inclusive line)
        assert_eq!(masks.move_mask & !sq_to_bb(4), 0x1010_1010_1010_1000);
    }

    #[test]
    fn test_knight_and_pawn_checks() {
        // Knight on f3 and pawn on d2 both attack e1
        let b = board("4k3/8/8/8/8/5n2/3p4/4K3 w - - 0 1");
        let c = checkers(tables(), &b, Color::White);
        assert_eq!(c, sq_to_bb(21) | sq_to_bb(11));
        let masks = compute_masks(tables(), &b, Color::White);
        assert_eq!(masks.move_mask, 0);

        // A black pawn on e2 does not check
        let b = board("4k3/8/8/8/8/8/4p3/4K3 w - - 0 1");
        assert_eq!(checkers(tables(), &b, Color::White), 0);
    }

    #[test]
    fn test_knight_check_mask_is_checker_only() {
        let b = board("4k3/8/8/8/8/5n2/8/4K3 w - - 0 1");
        let masks = compute_masks(tables(), &b, Color::White);
        assert_eq!(masks.move_mask, sq_to_bb(21));
    }

    #[test]
    fn test_pins() {
        // White bishop d2 pinned by the b4 bishop, white rook e4 pinned by the e8 rook
        let b = board("4r2k/8/8/8/1b2R3/8/3B4/4K3 w - - 0 1");
        assert_eq!(pins_diagonal(tables(), &b, Color::White), sq_to_bb(11));
        assert_eq!(pins_straight(tables(), &b, Color::White), sq_to_bb(28));
        let masks = compute_masks(tables(), &b, Color::White);
        assert_eq!(masks.pin_mask, sq_to_bb(11) | sq_to_bb(28));
    }

    #[test]
    fn test_two_blockers_is_not_a_pin() {
        let b = board("4r2k/8/8/8/4R3/8/4N3/4K3 w - - 0 1");
        assert_eq!(pins_straight(tables(), &b, Color::White), 0);
    }

    #[test]
    fn test_enemy_blocker_is_not_pinned_piece() {
        let b = board("4r2k/8/8/8/4n3/8/8/4K3 w - - 0 1");
        assert_eq!(pins_straight(tables(), &b, Color::White), 0);
    }

    #[test]
    fn test_pinned_piece_exposes_king_when_removed() {
        let b = board("4r2k/8/8/8/4R3/8/8/4K3 w - - 0 1");
        let pinned = pins_straight(tables(), &b, Color::White);
        assert_eq!(pinned, sq_to_bb(28));

        let mut without = b;
        without.rook &= !pinned;
        without.white &= !pinned;
        assert_eq!(checkers(tables(), &without, Color::White), sq_to_bb(60));
    }

    #[test]
    fn test_king_danger_sees_through_king() {
        // Rook on a1 checks king on d1; e1 stays attacked behind the king
        let b = board("7k/8/8/8/8/8/8/r2K4 w - - 0 1");
        let danger = king_danger(tables(), &b, Color::Black);
        assert!(danger & sq_to_bb(4) != 0); // e1
        assert!(danger & sq_to_bb(11) == 0); // d2
        // The black king's own neighbourhood counts too
        assert!(danger & sq_to_bb(62) != 0); // g8
    }
}
