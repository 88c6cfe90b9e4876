//! Bitboard position representation.
//!
//! Seven masks describe the placement: five piece-type unions (`pawn` .. `queen`, both colors
//! together) and two color masks. Kings have no mask of their own; a king is the bit of its
//! color mask not covered by any piece-type mask, and its square is cached in
//! `white_king` / `black_king`.

use itertools::Itertools;

use crate::bitboard::{sq_to_bb, BitboardIter};
use crate::error::{FenError, FenResult};
use crate::types::{parse_square, square_name, CastleRights, Color, PieceType, NO_EN_PASSANT};
use crate::zobrist::ZobristKeys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    pub pawn: u64,
    pub knight: u64,
    pub bishop: u64,
    pub rook: u64,
    pub queen: u64,
    pub white: u64,
    pub black: u64,
    pub white_king: u8,
    pub black_king: u8,
    pub castle_rights: CastleRights,
    /// 0-7, or `NO_EN_PASSANT`
    pub en_passant_file: u8,
    pub hash: u64,
}

impl Board {
    /// A board with no pieces at all. Both king squares read as a1 until kings are placed.
    pub const fn empty() -> Board {
        Board {
            pawn: 0,
            knight: 0,
            bishop: 0,
            rook: 0,
            queen: 0,
            white: 0,
            black: 0,
            white_king: 0,
            black_king: 0,
            castle_rights: CastleRights::NONE,
            en_passant_file: NO_EN_PASSANT,
            hash: 0,
        }
    }

    #[inline(always)]
    pub fn occupied(&self) -> u64 {
        self.white | self.black
    }

    #[inline(always)]
    pub fn color_bb(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    #[inline(always)]
    pub fn king_square(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white_king,
            Color::Black => self.black_king,
        }
    }

    /// Type mask for a non-king piece; for the king, both king squares.
    #[inline(always)]
    pub fn piece_bb(&self, piece: PieceType) -> u64 {
        match piece {
            PieceType::Pawn => self.pawn,
            PieceType::Knight => self.knight,
            PieceType::Bishop => self.bishop,
            PieceType::Rook => self.rook,
            PieceType::Queen => self.queen,
            PieceType::King => sq_to_bb(self.white_king) | sq_to_bb(self.black_king),
        }
    }

    #[inline(always)]
    pub(crate) fn piece_bb_mut(&mut self, piece: PieceType) -> &mut u64 {
        match piece {
            PieceType::Pawn => &mut self.pawn,
            PieceType::Knight => &mut self.knight,
            PieceType::Bishop => &mut self.bishop,
            PieceType::Rook => &mut self.rook,
            PieceType::Queen => &mut self.queen,
            PieceType::King => panic!("kings have no piece bitboard"),
        }
    }

    #[inline(always)]
    pub(crate) fn color_bb_mut(&mut self, color: Color) -> &mut u64 {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// Diagonal sliders (bishops and queens) of one color.
    #[inline(always)]
    pub fn diagonal_sliders(&self, color: Color) -> u64 {
        (self.bishop | self.queen) & self.color_bb(color)
    }

    /// Straight sliders (rooks and queens) of one color.
    #[inline(always)]
    pub fn straight_sliders(&self, color: Color) -> u64 {
        (self.rook | self.queen) & self.color_bb(color)
    }

    /// The piece standing on `sq`, if any. Falls back to `King` for a colored square that no
    /// type mask covers.
    pub fn piece_at(&self, sq: u8) -> Option<(Color, PieceType)> {
        let bb = sq_to_bb(sq);
        let color = if self.white & bb != 0 {
            Color::White
        } else if self.black & bb != 0 {
            Color::Black
        } else {
            return None;
        };
        Some((color, self.piece_type_at(sq)))
    }

    /// Type of the piece on an occupied square.
    #[inline]
    pub fn piece_type_at(&self, sq: u8) -> PieceType {
        let bb = sq_to_bb(sq);
        if self.pawn & bb != 0 {
            PieceType::Pawn
        } else if self.knight & bb != 0 {
            PieceType::Knight
        } else if self.bishop & bb != 0 {
            PieceType::Bishop
        } else if self.rook & bb != 0 {
            PieceType::Rook
        } else if self.queen & bb != 0 {
            PieceType::Queen
        } else {
            PieceType::King
        }
    }

    /// Place a piece on an empty square. Does not touch the hash.
    pub fn put(&mut self, color: Color, piece: PieceType, sq: u8) {
        debug_assert!(self.occupied() & sq_to_bb(sq) == 0, "square {sq} already occupied");
        *self.color_bb_mut(color) |= sq_to_bb(sq);
        match (piece, color) {
            (PieceType::King, Color::White) => self.white_king = sq,
            (PieceType::King, Color::Black) => self.black_king = sq,
            _ => *self.piece_bb_mut(piece) |= sq_to_bb(sq),
        }
    }

    /// Hash recomputed from scratch. Only used when loading a position and to verify the
    /// incremental updates.
    pub fn compute_hash(&self, keys: &ZobristKeys, side_to_move: Color) -> u64 {
        let mut hash = 0u64;
        for sq in BitboardIter(self.occupied()) {
            if let Some((color, piece)) = self.piece_at(sq) {
                hash ^= keys.piece(color, piece, sq);
            }
        }
        if side_to_move == Color::Black {
            hash ^= keys.side_to_move;
        }
        hash ^ keys.castle_state(self.castle_rights) ^ keys.en_passant_state(self.en_passant_file)
    }

    /// Structural invariants: disjoint colors, every piece typed exactly once, one king per side.
    pub fn is_consistent(&self) -> bool {
        let typed = [self.pawn, self.knight, self.bishop, self.rook, self.queen];
        let union = typed.iter().fold(0, |acc, bb| acc | bb);
        let overlapping = typed
            .iter()
            .tuple_combinations()
            .any(|(a, b)| a & b != 0);

        let kings = sq_to_bb(self.white_king) | sq_to_bb(self.black_king);
        self.white & self.black == 0
            && !overlapping
            && union & kings == 0
            && self.white & sq_to_bb(self.white_king) != 0
            && self.black & sq_to_bb(self.black_king) != 0
            && (self.white | self.black) == union | kings
            && self.en_passant_file <= NO_EN_PASSANT
    }

    /// An en-passant target must sit empty on the mover's sixth rank with the
    /// enemy pawn that just double-pushed directly behind it.
    fn en_passant_target_valid(&self, side_to_move: Color, target: u8) -> bool {
        let (rank, pushed) = match side_to_move {
            Color::White => (5, target.wrapping_sub(8)),
            Color::Black => (2, target + 8),
        };
        target / 8 == rank
            && self.piece_at(target).is_none()
            && self.piece_at(pushed) == Some((side_to_move.other(), PieceType::Pawn))
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::empty()
    }
}

/// A board together with the side to move: the engine's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub board: Board,
    pub side_to_move: Color,
}

impl Position {
    /// Parse a FEN string. The move counters are optional and ignored.
    pub fn from_fen(fen: &str, keys: &ZobristKeys) -> FenResult<Position> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::MissingField { found: fields.len() });
        }

        let mut board = Board::empty();
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadRankCount { found: ranks.len() });
        }

        let mut white_kings = 0;
        let mut black_kings = 0;
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u32;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip;
                    continue;
                }
                let piece = PieceType::from_char(c).ok_or(FenError::BadPlacement { found: c })?;
                if file >= 8 {
                    return Err(FenError::BadRank { rank: rank + 1, files: file + 1 });
                }
                let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
                if piece == PieceType::King {
                    match color {
                        Color::White => white_kings += 1,
                        Color::Black => black_kings += 1,
                    }
                    if white_kings > 1 || black_kings > 1 {
                        file += 1;
                        continue;
                    }
                }
                board.put(color, piece, rank * 8 + file as u8);
                file += 1;
            }
            if file != 8 {
                return Err(FenError::BadRank { rank: rank + 1, files: file });
            }
        }
        if white_kings != 1 {
            return Err(FenError::KingCount { color: "white", count: white_kings });
        }
        if black_kings != 1 {
            return Err(FenError::KingCount { color: "black", count: black_kings });
        }

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::BadSideToMove { found: other.to_string() }),
        };

        board.castle_rights = CastleRights::from_fen(fields[2]).ok_or_else(|| FenError::BadCastling {
            found: fields[2].to_string(),
        })?;

        board.en_passant_file = match fields[3] {
            "-" => NO_EN_PASSANT,
            square => match parse_square(square) {
                Some(sq) if board.en_passant_target_valid(side_to_move, sq) => sq % 8,
                _ => return Err(FenError::BadEnPassant { found: square.to_string() }),
            },
        };

        for counter in fields.iter().skip(4).take(2) {
            if counter.parse::<u32>().is_err() {
                return Err(FenError::BadCounter { found: counter.to_string() });
            }
        }

        board.hash = board.compute_hash(keys, side_to_move);
        Ok(Position { board, side_to_move })
    }

    /// FEN with zeroed half-move clock and full-move number 1.
    pub fn to_fen(&self) -> String {
        let board = &self.board;
        let placement = (0..8u8)
            .rev()
            .map(|rank| {
                let mut out = String::new();
                let mut empty = 0;
                for file in 0..8u8 {
                    match board.piece_at(rank * 8 + file) {
                        Some((color, piece)) => {
                            if empty > 0 {
                                out.push_str(&empty.to_string());
                                empty = 0;
                            }
                            let c = piece.to_char();
                            out.push(if color == Color::White { c.to_ascii_uppercase() } else { c });
                        }
                        None => empty += 1,
                    }
                }
                if empty > 0 {
                    out.push_str(&empty.to_string());
                }
                out
            })
            .join("/");

        let en_passant = if board.en_passant_file == NO_EN_PASSANT {
            "-".to_string()
        } else {
            // The target lies behind the pawn that just moved
            let rank = match self.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            square_name(rank * 8 + board.en_passant_file)
        };

        format!(
            "{} {} {} {} 0 1",
            placement,
            self.side_to_move.to_char(),
            board.castle_rights,
            en_passant
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KIWIPETE_FEN, START_FEN};

    fn keys() -> ZobristKeys {
        ZobristKeys::new()
    }

    #[test]
    fn test_start_position() {
        let pos = Position::from_fen(START_FEN, &keys()).unwrap();
        let board = pos.board;
        assert_eq!(pos.side_to_move, Color::White);
        assert_eq!(board.pawn, 0x00FF_0000_0000_FF00);
        assert_eq!(board.white, 0xFFFF);
        assert_eq!(board.black, 0xFFFF_0000_0000_0000);
        assert_eq!(board.white_king, 4); // e1
        assert_eq!(board.black_king, 60); // e8
        assert_eq!(board.castle_rights, CastleRights::ALL);
        assert_eq!(board.en_passant_file, NO_EN_PASSANT);
        assert!(board.is_consistent());
        assert_eq!(board.piece_at(3), Some((Color::White, PieceType::Queen))); // d1
        assert_eq!(board.piece_at(60), Some((Color::Black, PieceType::King))); // e8
        assert_eq!(board.piece_at(28), None); // e4
    }

    #[test]
    fn test_fen_round_trip() {
        let keys = keys();
        for fen in [
            START_FEN,
            KIWIPETE_FEN,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 1",
        ] {
            let pos = Position::from_fen(fen, &keys).unwrap();
            assert_eq!(pos.to_fen(), fen);
        }
    }

    #[test]
    fn test_en_passant_file() {
        let pos = Position::from_fen(
            "rnbqkbnr/pppp1ppp/8/8/3Pp3/8/PPP1PPPP/RNBQKBNR b KQkq d3 0 1",
            &keys(),
        )
        .unwrap();
        assert_eq!(pos.board.en_passant_file, 3);
    }

    #[test]
    fn test_missing_counters_accepted() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R b Kq -", &keys()).unwrap();
        assert_eq!(pos.side_to_move, Color::Black);
        assert_eq!(
            pos.board.castle_rights,
            CastleRights(CastleRights::WHITE_KING_SIDE | CastleRights::BLACK_QUEEN_SIDE)
        );
    }

    #[test]
    fn test_fen_errors() {
        let keys = keys();
        assert_eq!(
            Position::from_fen("8/8/8/8 w - -", &keys),
            Err(FenError::BadRankCount { found: 4 })
        );
        assert_eq!(
            Position::from_fen("8/8/8/8/8/8/8/8 w - -", &keys),
            Err(FenError::KingCount { color: "white", count: 0 })
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/4KK2 w - -", &keys),
            Err(FenError::KingCount { color: "white", count: 2 })
        );
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K2X w - -", &keys),
            Err(FenError::BadPlacement { found: 'X' })
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K w - -", &keys),
            Err(FenError::BadRank { rank: 1, .. })
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 x - -", &keys),
            Err(FenError::BadSideToMove { .. })
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - e4", &keys),
            Err(FenError::BadEnPassant { .. })
        ));
        // Target on the wrong rank for the side to move
        assert_eq!(
            Position::from_fen("4k3/8/8/3Pp3/8/8/8/4K3 w - e3 0 1", &keys),
            Err(FenError::BadEnPassant { found: "e3".to_string() })
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/8/3pP3/8/8/4K3 b - e6 0 1", &keys),
            Err(FenError::BadEnPassant { found: "e6".to_string() })
        );
        // Target square occupied
        assert_eq!(
            Position::from_fen("4k3/8/4n3/3Pp3/8/8/8/4K3 w - e6 0 1", &keys),
            Err(FenError::BadEnPassant { found: "e6".to_string() })
        );
        // No enemy pawn behind the target
        assert_eq!(
            Position::from_fen("4k3/8/8/3P4/8/8/8/4K3 w - e6 0 1", &keys),
            Err(FenError::BadEnPassant { found: "e6".to_string() })
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/3Pn3/8/8/8/4K3 w - e6 0 1", &keys),
            Err(FenError::BadEnPassant { found: "e6".to_string() })
        );
        assert!(Position::from_fen("4k3/8/8/3Pp3/8/8/8/4K3 w - e6 0 1", &keys).is_ok());
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w", &keys),
            Err(FenError::MissingField { found: 2 })
        ));
    }

    #[test]
    fn test_hash_depends_on_side_and_rights() {
        let keys = keys();
        let white = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1", &keys).unwrap();
        let black = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 b Q - 0 1", &keys).unwrap();
        let no_rights = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", &keys).unwrap();
        assert_ne!(white.board.hash, black.board.hash);
        assert_ne!(white.board.hash, no_rights.board.hash);
        assert_eq!(white.board.hash ^ black.board.hash, keys.side_to_move);
    }

    #[test]
    fn test_inconsistent_board_detected() {
        let keys = keys();
        let mut board = Position::from_fen(START_FEN, &keys).unwrap().board;
        board.knight |= board.pawn & board.white; // pawns typed twice
        assert!(!board.is_consistent());
    }
}
