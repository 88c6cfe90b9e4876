//! Packed move encoding.
//!
//! A move occupies the low 20 bits of a `u32`:
//!
//! | bits  | field       |
//! | ----- | ----------- |
//! | 0-3   | moved piece (`PieceType` id) |
//! | 4-9   | from square |
//! | 10-15 | to square   |
//! | 16-19 | `MoveKind`  |
//!
//! The widths are fixed: move chains and anything shipped off-process depend on them.

use std::fmt;

use crate::types::{square_name, PieceType};

pub const MOVE_BITS: u32 = 20;
pub const MOVE_MASK: u64 = (1 << MOVE_BITS) - 1;

const PIECE_SHIFT: u32 = 0;
const FROM_SHIFT: u32 = 4;
const TO_SHIFT: u32 = 10;
const KIND_SHIFT: u32 = 16;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u8)]
pub enum MoveKind {
    Normal = 0,
    Capture = 1,
    Castle = 2,
    DoublePush = 3,
    EnPassant = 4,
    KnightPromotion = 5,
    BishopPromotion = 6,
    RookPromotion = 7,
    QueenPromotion = 8,
    KnightCapturePromotion = 9,
    BishopCapturePromotion = 10,
    RookCapturePromotion = 11,
    QueenCapturePromotion = 12,
}

impl MoveKind {
    pub const PROMOTIONS: [MoveKind; 4] = [
        MoveKind::KnightPromotion,
        MoveKind::BishopPromotion,
        MoveKind::RookPromotion,
        MoveKind::QueenPromotion,
    ];

    pub const CAPTURE_PROMOTIONS: [MoveKind; 4] = [
        MoveKind::KnightCapturePromotion,
        MoveKind::BishopCapturePromotion,
        MoveKind::RookCapturePromotion,
        MoveKind::QueenCapturePromotion,
    ];

    pub const fn from_bits(bits: u8) -> Option<MoveKind> {
        Some(match bits {
            0 => MoveKind::Normal,
            1 => MoveKind::Capture,
            2 => MoveKind::Castle,
            3 => MoveKind::DoublePush,
            4 => MoveKind::EnPassant,
            5 => MoveKind::KnightPromotion,
            6 => MoveKind::BishopPromotion,
            7 => MoveKind::RookPromotion,
            8 => MoveKind::QueenPromotion,
            9 => MoveKind::KnightCapturePromotion,
            10 => MoveKind::BishopCapturePromotion,
            11 => MoveKind::RookCapturePromotion,
            12 => MoveKind::QueenCapturePromotion,
            _ => return None,
        })
    }

    /// En passant and capture-promotions count as captures.
    #[inline(always)]
    pub const fn is_capture(self) -> bool {
        matches!(
            self,
            MoveKind::Capture
                | MoveKind::EnPassant
                | MoveKind::KnightCapturePromotion
                | MoveKind::BishopCapturePromotion
                | MoveKind::RookCapturePromotion
                | MoveKind::QueenCapturePromotion
        )
    }

    #[inline(always)]
    pub const fn is_promotion(self) -> bool {
        self as u8 >= MoveKind::KnightPromotion as u8
    }

    pub const fn promotion_piece(self) -> Option<PieceType> {
        match self {
            MoveKind::KnightPromotion | MoveKind::KnightCapturePromotion => Some(PieceType::Knight),
            MoveKind::BishopPromotion | MoveKind::BishopCapturePromotion => Some(PieceType::Bishop),
            MoveKind::RookPromotion | MoveKind::RookCapturePromotion => Some(PieceType::Rook),
            MoveKind::QueenPromotion | MoveKind::QueenCapturePromotion => Some(PieceType::Queen),
            _ => None,
        }
    }
}

/// One packed move. Only the low 20 bits are ever set.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Default)]
#[repr(transparent)]
pub struct Move(pub u32);

impl Move {
    #[inline(always)]
    pub const fn new(piece: PieceType, from: u8, to: u8, kind: MoveKind) -> Move {
        Move(
            (piece as u32) << PIECE_SHIFT
                | (from as u32) << FROM_SHIFT
                | (to as u32) << TO_SHIFT
                | (kind as u32) << KIND_SHIFT,
        )
    }

    /// Wrap a raw value, rejecting unused bits and unknown piece or kind ids.
    pub fn from_raw(raw: u32) -> Option<Move> {
        let mv = Move(raw);
        if u64::from(raw) & !MOVE_MASK != 0 {
            return None;
        }
        PieceType::from_index(mv.piece_bits())?;
        MoveKind::from_bits(mv.kind_bits())?;
        Some(mv)
    }

    #[inline(always)]
    fn piece_bits(self) -> u8 {
        ((self.0 >> PIECE_SHIFT) & 0xF) as u8
    }

    #[inline(always)]
    fn kind_bits(self) -> u8 {
        ((self.0 >> KIND_SHIFT) & 0xF) as u8
    }

    #[inline(always)]
    pub fn piece(self) -> PieceType {
        match PieceType::from_index(self.piece_bits()) {
            Some(piece) => piece,
            None => panic!("corrupt move {:#07x}: piece id {}", self.0, self.piece_bits()),
        }
    }

    #[inline(always)]
    pub const fn from(self) -> u8 {
        ((self.0 >> FROM_SHIFT) & 0x3F) as u8
    }

    #[inline(always)]
    pub const fn to(self) -> u8 {
        ((self.0 >> TO_SHIFT) & 0x3F) as u8
    }

    #[inline(always)]
    pub fn kind(self) -> MoveKind {
        match MoveKind::from_bits(self.kind_bits()) {
            Some(kind) => kind,
            None => panic!("corrupt move {:#07x}: kind {}", self.0, self.kind_bits()),
        }
    }

    #[inline(always)]
    pub fn is_capture(self) -> bool {
        self.kind().is_capture()
    }

    #[inline(always)]
    pub fn is_promotion(self) -> bool {
        self.kind().is_promotion()
    }

    /// Long algebraic notation: `e2e4`, `e7e8q`, castling as the king's move `e1g1`.
    pub fn to_uci(self) -> String {
        let mut s = square_name(self.from());
        s.push_str(&square_name(self.to()));
        if let Some(piece) = self.kind().promotion_piece() {
            s.push(piece.to_char());
        }
        s
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?} {:?})", self.to_uci(), self.piece(), self.kind())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

/// Up to three moves packed into one `u64`, ply 0 in the low 20 bits.
///
/// The pipeline carries a lineage as a chain instead of materialising the intermediate boards.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[repr(transparent)]
pub struct MoveChain(pub u64);

impl MoveChain {
    pub const MAX_PLIES: usize = 3;
    pub const EMPTY: MoveChain = MoveChain(0);

    #[inline(always)]
    pub fn with(self, ply: usize, mv: Move) -> MoveChain {
        debug_assert!(ply < Self::MAX_PLIES);
        let shift = ply as u32 * MOVE_BITS;
        MoveChain((self.0 & !(MOVE_MASK << shift)) | (u64::from(mv.0) << shift))
    }

    #[inline(always)]
    pub fn get(self, ply: usize) -> Move {
        debug_assert!(ply < Self::MAX_PLIES);
        Move(((self.0 >> (ply as u32 * MOVE_BITS)) & MOVE_MASK) as u32)
    }

    /// The first `plies` moves in order.
    pub fn moves(self, plies: usize) -> impl Iterator<Item = Move> {
        (0..plies).map(move |ply| self.get(ply))
    }
}
