use std::fmt;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const KIWIPETE_FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
pub const SJE_FEN: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
pub const POSITION_3_FEN: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
pub const POSITION_4_FEN: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
pub const POSITION_5_FEN: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

/// Resolve a well-known position name to its FEN, passing anything else through untouched.
pub fn resolve_fen(input: &str) -> &str {
    match input {
        "start" | "startpos" => START_FEN,
        "kiwipete" => KIWIPETE_FEN,
        "sje" => SJE_FEN,
        "pos3" => POSITION_3_FEN,
        "pos4" => POSITION_4_FEN,
        "pos5" => POSITION_5_FEN,
        other => other,
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    #[inline(always)]
    pub const fn other(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn to_char(self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    pub fn to_human(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

/// Piece ids as they appear in the low nibble of a packed move.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl PieceType {
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of `index`. Returns `None` for ids above the king.
    #[inline]
    pub const fn from_index(id: u8) -> Option<PieceType> {
        match id {
            0 => Some(PieceType::Pawn),
            1 => Some(PieceType::Knight),
            2 => Some(PieceType::Bishop),
            3 => Some(PieceType::Rook),
            4 => Some(PieceType::Queen),
            5 => Some(PieceType::King),
            _ => None,
        }
    }

    pub fn from_char(c: char) -> Option<PieceType> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceType::Pawn),
            'n' => Some(PieceType::Knight),
            'b' => Some(PieceType::Bishop),
            'r' => Some(PieceType::Rook),
            'q' => Some(PieceType::Queen),
            'k' => Some(PieceType::King),
            _ => None,
        }
    }

    /// Lowercase letter, as used for black pieces in FEN and for UCI promotions.
    pub fn to_char(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }
}

/// Castling availability, one bit per side and wing.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub struct CastleRights(pub u8);

impl CastleRights {
    pub const NONE: CastleRights = CastleRights(0);
    pub const WHITE_KING_SIDE: u8 = 1;
    pub const WHITE_QUEEN_SIDE: u8 = 2;
    pub const BLACK_KING_SIDE: u8 = 4;
    pub const BLACK_QUEEN_SIDE: u8 = 8;
    pub const ALL: CastleRights = CastleRights(15);

    #[inline(always)]
    pub const fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    #[inline(always)]
    pub const fn king_side(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_KING_SIDE,
            Color::Black => Self::BLACK_KING_SIDE,
        }
    }

    #[inline(always)]
    pub const fn queen_side(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_QUEEN_SIDE,
            Color::Black => Self::BLACK_QUEEN_SIDE,
        }
    }

    pub fn from_fen(field: &str) -> Option<CastleRights> {
        if field == "-" {
            return Some(CastleRights::NONE);
        }
        let mut rights = 0;
        for c in field.chars() {
            rights |= match c {
                'K' => Self::WHITE_KING_SIDE,
                'Q' => Self::WHITE_QUEEN_SIDE,
                'k' => Self::BLACK_KING_SIDE,
                'q' => Self::BLACK_QUEEN_SIDE,
                _ => return None,
            };
        }
        Some(CastleRights(rights))
    }
}

impl fmt::Display for CastleRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (flag, c) in [
            (Self::WHITE_KING_SIDE, 'K'),
            (Self::WHITE_QUEEN_SIDE, 'Q'),
            (Self::BLACK_KING_SIDE, 'k'),
            (Self::BLACK_QUEEN_SIDE, 'q'),
        ] {
            if self.has(flag) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Sentinel stored in `Board::en_passant_file` when there is no en-passant target.
pub const NO_EN_PASSANT: u8 = 8;

/// Algebraic name of a square index, a1 = 0 .. h8 = 63.
pub fn square_name(sq: u8) -> String {
    format!("{}{}", (b'a' + (sq & 7)) as char, (sq >> 3) + 1)
}

pub fn parse_square(s: &str) -> Option<u8> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].checked_sub(b'a')?;
    let rank = bytes[1].checked_sub(b'1')?;
    if file > 7 || rank > 7 {
        return None;
    }
    Some(rank * 8 + file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_castle_rights_round_trip() {
        for field in ["KQkq", "Kq", "k", "-"] {
            let rights = CastleRights::from_fen(field).unwrap();
            assert_eq!(rights.to_string(), field);
        }
        assert_eq!(CastleRights::from_fen("KX"), None);
    }

    #[test]
    fn test_square_names() {
        assert_eq!(square_name(0), "a1");
        assert_eq!(square_name(28), "e4");
        assert_eq!(square_name(63), "h8");
        assert_eq!(parse_square("e4"), Some(28));
        assert_eq!(parse_square("i1"), None);
        assert_eq!(parse_square("a9"), None);
    }

    #[test]
    fn test_piece_ids() {
        for piece in PieceType::ALL {
            assert_eq!(PieceType::from_index(piece as u8), Some(piece));
            assert_eq!(PieceType::from_char(piece.to_char()), Some(piece));
        }
        assert_eq!(PieceType::from_index(6), None);
    }

    #[test]
    fn test_resolve_fen() {
        assert_eq!(resolve_fen("start"), START_FEN);
        assert_eq!(resolve_fen("kiwipete"), KIWIPETE_FEN);
        assert_eq!(resolve_fen("8/8/8/8/8/8/8/8 w - - 0 1"), "8/8/8/8/8/8/8/8 w - - 0 1");
    }
}
