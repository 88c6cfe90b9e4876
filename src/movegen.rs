//! Legal move generation.
//!
//! Moves are produced fully legal, never pseudo-legal: king moves avoid attacked squares,
//! other pieces are confined to the check-evasion mask and, when pinned, to the line through
//! their king. Order is king, castling, knights, bishops, rooks, queens, pawns; squares
//! ascend within a piece type and captures come before quiet moves from the same square.

use crate::bitboard::{lsb, sq_to_bb, AttackTables, BitboardIter, RANK_2, RANK_7};
use crate::board::Board;
use crate::legality::{checkers, compute_masks, king_danger, CheckMasks};
use crate::movelist::{MoveCounter, MoveList, MoveSink};
use crate::moves::{Move, MoveKind};
use crate::types::{CastleRights, Color, PieceType};

/// Generate every legal move for `side` into `sink`, given masks from `compute_masks`.
pub fn generate<S: MoveSink>(
    tables: &AttackTables,
    board: &Board,
    side: Color,
    masks: &CheckMasks,
    sink: &mut S,
) {
    let them = side.other();
    let own = board.color_bb(side);
    let enemy = board.color_bb(them);
    let empty = !(own | enemy);
    let king = board.king_square(side);

    let danger = king_danger(tables, board, them);
    let king_targets = tables.king[king as usize] & !own & !danger;
    sink.push_targets(PieceType::King, king, king_targets & enemy, MoveKind::Capture);
    sink.push_targets(PieceType::King, king, king_targets & empty, MoveKind::Normal);

    // Only a king move can evade double check
    if masks.num_checkers > 1 {
        return;
    }

    if masks.checkers == 0 {
        generate_castles(board, side, danger, sink);
    }

    let move_mask = masks.move_mask;
    let pinned = masks.pin_mask;
    let occupied = !empty;

    for sq in BitboardIter(board.knight & own & !pinned) {
        let targets = tables.knight[sq as usize] & !own & move_mask;
        push_captures_then_quiets(sink, PieceType::Knight, sq, targets, enemy);
    }

    for sq in BitboardIter(board.bishop & own) {
        let mut targets = tables.bishop_attacks(sq, occupied) & !own & move_mask;
        if pinned & sq_to_bb(sq) != 0 {
            targets &= tables.diagonal_to_edge(king, sq);
        }
        push_captures_then_quiets(sink, PieceType::Bishop, sq, targets, enemy);
    }

    for sq in BitboardIter(board.rook & own) {
        let mut targets = tables.rook_attacks(sq, occupied) & !own & move_mask;
        if pinned & sq_to_bb(sq) != 0 {
            targets &= tables.straight_to_edge(king, sq);
        }
        push_captures_then_quiets(sink, PieceType::Rook, sq, targets, enemy);
    }

    for sq in BitboardIter(board.queen & own) {
        let mut targets = tables.queen_attacks(sq, occupied) & !own & move_mask;
        if pinned & sq_to_bb(sq) != 0 {
            targets &= tables.diagonal_to_edge(king, sq) | tables.straight_to_edge(king, sq);
        }
        push_captures_then_quiets(sink, PieceType::Queen, sq, targets, enemy);
    }

    generate_pawns(tables, board, side, masks, sink);
}

#[inline(always)]
fn push_captures_then_quiets<S: MoveSink>(sink: &mut S, piece: PieceType, from: u8, targets: u64, enemy: u64) {
    sink.push_targets(piece, from, targets & enemy, MoveKind::Capture);
    sink.push_targets(piece, from, targets & !enemy, MoveKind::Normal);
}

fn generate_castles<S: MoveSink>(board: &Board, side: Color, danger: u64, sink: &mut S) {
    let home: u8 = match side {
        Color::White => 4,
        Color::Black => 60,
    };
    if board.king_square(side) != home {
        return;
    }

    let rights = board.castle_rights;
    let rooks = board.rook & board.color_bb(side);
    let occupied = board.occupied();

    let king_side_path = sq_to_bb(home + 1) | sq_to_bb(home + 2);
    if rights.has(CastleRights::king_side(side))
        && rooks & sq_to_bb(home + 3) != 0
        && occupied & king_side_path == 0
        && danger & king_side_path == 0
    {
        sink.push(Move::new(PieceType::King, home, home + 2, MoveKind::Castle));
    }

    // The b-file square must be empty but may be attacked
    let queen_side_path = sq_to_bb(home - 1) | sq_to_bb(home - 2);
    if rights.has(CastleRights::queen_side(side))
        && rooks & sq_to_bb(home - 4) != 0
        && occupied & (queen_side_path | sq_to_bb(home - 3)) == 0
        && danger & queen_side_path == 0
    {
        sink.push(Move::new(PieceType::King, home, home - 2, MoveKind::Castle));
    }
}

fn generate_pawns<S: MoveSink>(
    tables: &AttackTables,
    board: &Board,
    side: Color,
    masks: &CheckMasks,
    sink: &mut S,
) {
    let own = board.color_bb(side);
    let enemy = board.color_bb(side.other());
    let empty = !(own | enemy);
    let king = board.king_square(side);
    let promoting_rank = match side {
        Color::White => RANK_7,
        Color::Black => RANK_2,
    };

    for sq in BitboardIter(board.pawn & own) {
        let bb = sq_to_bb(sq);
        let (push_ray, capture_ray) = if masks.pin_mask & bb != 0 {
            (tables.straight_to_edge(king, sq), tables.diagonal_to_edge(king, sq))
        } else {
            (!0, !0)
        };

        let captures = tables.pawn_attacks(side, sq) & enemy & masks.move_mask & capture_ray;

        let single = match side {
            Color::White => bb << 8,
            Color::Black => bb >> 8,
        };
        let pushes = if single & empty != 0 {
            tables.pawn_pushes(side, sq) & empty & masks.move_mask & push_ray
        } else {
            0
        };

        if bb & promoting_rank != 0 {
            sink.push_promotions(sq, captures, true);
            sink.push_promotions(sq, pushes, false);
            continue;
        }

        sink.push_targets(PieceType::Pawn, sq, captures, MoveKind::Capture);

        let target = tables.en_passant_target(side, sq, board.en_passant_file);
        if target != 0 {
            let mv = Move::new(PieceType::Pawn, sq, lsb(target), MoveKind::EnPassant);
            if en_passant_is_legal(tables, board, side, mv) {
                sink.push(mv);
            }
        }

        sink.push_targets(PieceType::Pawn, sq, pushes & single, MoveKind::Normal);
        sink.push_targets(PieceType::Pawn, sq, pushes & !single, MoveKind::DoublePush);
    }
}

/// En passant removes two pieces from one rank at once, which the pin mask does not model,
/// so the capture is played out and the king checked afterwards.
fn en_passant_is_legal(tables: &AttackTables, board: &Board, side: Color, mv: Move) -> bool {
    let after = board.after(&tables.zobrist, mv);
    checkers(tables, &after, side) == 0
}

/// All legal moves for `side`.
pub fn generate_legal(tables: &AttackTables, board: &Board, side: Color) -> MoveList {
    let masks = compute_masks(tables, board, side);
    let mut moves = MoveList::new();
    generate(tables, board, side, &masks, &mut moves);
    moves
}

/// Number of legal moves, without materialising them.
pub fn count_legal(tables: &AttackTables, board: &Board, side: Color) -> u32 {
    let masks = compute_masks(tables, board, side);
    count_with_masks(tables, board, side, &masks)
}

#[inline]
pub fn count_with_masks(tables: &AttackTables, board: &Board, side: Color, masks: &CheckMasks) -> u32 {
    let mut counter = MoveCounter::default();
    generate(tables, board, side, masks, &mut counter);
    counter.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::tests::tables;
    use crate::board::Position;
    use crate::types::{KIWIPETE_FEN, POSITION_3_FEN, POSITION_4_FEN, POSITION_5_FEN, START_FEN};

    fn legal(fen: &str) -> (Position, MoveList) {
        let pos = Position::from_fen(fen, &tables().zobrist).unwrap();
        let moves = generate_legal(tables(), &pos.board, pos.side_to_move);
        (pos, moves)
    }

    fn uci(moves: &MoveList) -> Vec<String> {
        let mut names: Vec<String> = moves.iter().map(Move::to_uci).collect();
        names.sort();
        names
    }

    /// UCI names of the matching moves, in generation order.
    fn names(moves: &MoveList, pred: impl Fn(Move) -> bool) -> Vec<String> {
        moves.iter().filter(|&mv| pred(mv)).map(Move::to_uci).collect()
    }

    fn count_kind(moves: &MoveList, pred: impl Fn(Move) -> bool) -> usize {
        moves.iter().filter(|&mv| pred(mv)).count()
    }

    #[test]
    fn test_start_position_moves() {
        let (_, moves) = legal(START_FEN);
        assert_eq!(moves.len(), 20);
        assert_eq!(count_kind(&moves, Move::is_capture), 0);
        assert_eq!(count_kind(&moves, |m| m.kind() == MoveKind::DoublePush), 8);
        // Knights come before pawns
        assert_eq!(moves.get(0).piece(), PieceType::Knight);
        assert_eq!(moves.get(19).piece(), PieceType::Pawn);
    }

    #[test]
    fn test_kiwipete_moves() {
        let (_, moves) = legal(KIWIPETE_FEN);
        assert_eq!(moves.len(), 48);
        assert_eq!(count_kind(&moves, Move::is_capture), 8);
        assert_eq!(count_kind(&moves, |m| m.kind() == MoveKind::Castle), 2);
    }

    #[test]
    fn test_reference_positions_move_counts() {
        assert_eq!(legal(POSITION_3_FEN).1.len(), 14);
        assert_eq!(legal(POSITION_4_FEN).1.len(), 6);
        assert_eq!(legal(POSITION_5_FEN).1.len(), 44);
    }

    #[test]
    fn test_double_check_only_king_moves() {
        // Rook e8 and bishop b4 both check the king on e1; the a4 queen could otherwise
        // capture the bishop
        let (_, moves) = legal("4r2k/8/8/8/Qb6/8/8/4K3 w - - 0 1");
        assert!(moves.iter().all(|m| m.piece() == PieceType::King));
        assert_eq!(uci(&moves), vec!["e1d1", "e1f1", "e1f2"]);
    }

    #[test]
    fn test_single_check_blocks() {
        // Rook e8 checks; the d2 queen can only interpose on e2 or e3
        let (_, moves) = legal("4r2k/8/8/8/8/8/3Q4/4K3 w - - 0 1");
        assert_eq!(names(&moves, |m| m.piece() == PieceType::Queen), vec!["d2e2", "d2e3"]);
    }

    #[test]
    fn test_pinned_pieces() {
        // Bishop d2 pinned by b4 may only slide along the pin, rook e4 pinned by the e8
        // rook may only move on the e-file
        let (_, moves) = legal("4r2k/8/8/8/1b2R3/8/3B4/4K3 w - - 0 1");
        assert_eq!(names(&moves, |m| m.piece() == PieceType::Bishop), vec!["d2b4", "d2c3"]);
        assert_eq!(
            names(&moves, |m| m.piece() == PieceType::Rook),
            vec!["e4e8", "e4e2", "e4e3", "e4e5", "e4e6", "e4e7"]
        );
    }

    #[test]
    fn test_pinned_pawns() {
        // Pinned on the file: pushes stay on the pin line
        let (_, moves) = legal("4r2k/8/8/8/8/8/4P3/4K3 w - - 0 1");
        assert_eq!(names(&moves, |m| m.piece() == PieceType::Pawn), vec!["e2e3", "e2e4"]);

        // Pinned on the d1-h5 diagonal by f3: may capture the pinner but not push
        let (_, moves) = legal("7k/8/8/8/8/5b2/4P3/3K4 w - - 0 1");
        assert_eq!(names(&moves, |m| m.piece() == PieceType::Pawn), vec!["e2f3"]);
    }

    #[test]
    fn test_en_passant_generated() {
        let (_, moves) = legal("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        assert_eq!(names(&moves, |m| m.kind() == MoveKind::EnPassant), vec!["e5f6"]);
    }

    #[test]
    fn test_en_passant_horizontal_pin() {
        // Capturing would clear the fifth rank between the a5 king and the h5 rook
        let (_, moves) = legal("7k/8/8/KPp4r/8/8/8/8 w - c6 0 1");
        assert_eq!(count_kind(&moves, |m| m.kind() == MoveKind::EnPassant), 0);
    }

    #[test]
    fn test_en_passant_evades_pawn_check() {
        // d7-d5 gave check to the e4 king; exd6 removes the checker
        let (_, moves) = legal("7k/8/8/3pP3/4K3/8/8/8 w - d6 0 1");
        assert_eq!(names(&moves, |m| m.kind() == MoveKind::EnPassant), vec!["e5d6"]);
    }

    #[test]
    fn test_castling_blocked_by_attack() {
        // The f8 rook covers f1: no king-side castling
        let (_, moves) = legal("5r1k/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert_eq!(names(&moves, |m| m.kind() == MoveKind::Castle), vec!["e1c1"]);

        // b1 attacked does not prevent queen-side castling
        let (_, moves) = legal("1r5k/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert_eq!(names(&moves, |m| m.kind() == MoveKind::Castle), vec!["e1g1", "e1c1"]);
    }

    #[test]
    fn test_no_castling_in_check_or_without_rook() {
        let (_, moves) = legal("4r2k/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert_eq!(count_kind(&moves, |m| m.kind() == MoveKind::Castle), 0);

        let (_, moves) = legal("7k/8/8/8/8/8/8/4K2R w KQ - 0 1");
        assert_eq!(names(&moves, |m| m.kind() == MoveKind::Castle), vec!["e1g1"]);
    }

    #[test]
    fn test_promotions() {
        let (_, moves) = legal("1r5k/P7/8/8/8/8/8/K7 w - - 0 1");
        assert_eq!(count_kind(&moves, Move::is_promotion), 8);
        assert_eq!(count_kind(&moves, |m| m.is_promotion() && m.is_capture()), 4);
    }

    #[test]
    fn test_count_matches_generate() {
        for fen in [
            START_FEN,
            KIWIPETE_FEN,
            POSITION_3_FEN,
            POSITION_4_FEN,
            POSITION_5_FEN,
            "4r2k/8/8/8/Qb6/8/8/4K3 w - - 0 1",
            "7k/8/8/KPp4r/8/8/8/8 w - c6 0 1",
            "1r5k/P7/8/8/8/8/8/K7 w - - 0 1",
        ] {
            let (pos, moves) = legal(fen);
            assert_eq!(
                count_legal(tables(), &pos.board, pos.side_to_move) as usize,
                moves.len(),
                "{fen}"
            );
        }
    }

    #[test]
    fn test_black_to_move() {
        let (_, moves) = legal("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert_eq!(moves.len(), 20);
        assert!(moves.iter().all(|m| m.from() >= 48));
    }
}
