//! Perft counters and leaf classification.

use std::fmt;
use std::ops::AddAssign;

use crate::bitboard::{sq_to_bb, AttackTables};
use crate::board::Board;
use crate::legality::{compute_masks, CheckMasks};
use crate::movegen::count_with_masks;
use crate::moves::{Move, MoveKind};
use crate::types::Color;

/// Number of counters in a result, in wire order.
pub const STAT_COUNT: usize = 13;

/// Aggregate perft result.
///
/// Check and mate counters are exclusive: a mating move is counted under its mate category
/// only. `checks()` and `mates()` give the totals published perft tables use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PerftStats {
    pub nodes: u64,
    pub captures: u64,
    pub en_passants: u64,
    pub castles: u64,
    pub promotions: u64,
    pub direct_checks: u64,
    pub single_discovered_checks: u64,
    pub direct_discovered_checks: u64,
    pub double_discovered_checks: u64,
    pub direct_mates: u64,
    pub single_discovered_mates: u64,
    pub direct_discovered_mates: u64,
    pub double_discovered_mates: u64,
}

impl PerftStats {
    /// The root itself: perft(0).
    pub fn single_node() -> PerftStats {
        PerftStats {
            nodes: 1,
            ..PerftStats::default()
        }
    }

    /// All checking moves, mates included.
    pub fn checks(&self) -> u64 {
        self.direct_checks
            + self.single_discovered_checks
            + self.direct_discovered_checks
            + self.double_discovered_checks
            + self.mates()
    }

    pub fn mates(&self) -> u64 {
        self.direct_mates
            + self.single_discovered_mates
            + self.direct_discovered_mates
            + self.double_discovered_mates
    }

    /// Checks (mates included) delivered only through uncovered lines, as the
    /// "Discovery Checks" column of published tables counts them. A discovery
    /// that the moved piece joins is a double check and is left out.
    pub fn discovered_checks(&self) -> u64 {
        self.single_discovered_checks
            + self.double_discovered_checks
            + self.single_discovered_mates
            + self.double_discovered_mates
    }

    /// Checks (mates included) by two pieces at once.
    pub fn double_checks(&self) -> u64 {
        self.direct_discovered_checks
            + self.double_discovered_checks
            + self.direct_discovered_mates
            + self.double_discovered_mates
    }

    /// Add `other` weighted by how many times its subtree occurs.
    pub fn accumulate(&mut self, other: &PerftStats, occurrences: u64) {
        let mut sum = self.to_array();
        for (total, value) in sum.iter_mut().zip(other.to_array()) {
            *total += value * occurrences;
        }
        *self = PerftStats::from_array(sum);
    }

    /// Counters in wire order: nodes, captures, en passants, castles, promotions, the four
    /// check categories, then the four mate categories.
    pub fn to_array(&self) -> [u64; STAT_COUNT] {
        [
            self.nodes,
            self.captures,
            self.en_passants,
            self.castles,
            self.promotions,
            self.direct_checks,
            self.single_discovered_checks,
            self.direct_discovered_checks,
            self.double_discovered_checks,
            self.direct_mates,
            self.single_discovered_mates,
            self.direct_discovered_mates,
            self.double_discovered_mates,
        ]
    }

    pub fn from_array(values: [u64; STAT_COUNT]) -> PerftStats {
        let [nodes, captures, en_passants, castles, promotions, direct_checks, single_discovered_checks, direct_discovered_checks, double_discovered_checks, direct_mates, single_discovered_mates, direct_discovered_mates, double_discovered_mates] =
            values;
        PerftStats {
            nodes,
            captures,
            en_passants,
            castles,
            promotions,
            direct_checks,
            single_discovered_checks,
            direct_discovered_checks,
            double_discovered_checks,
            direct_mates,
            single_discovered_mates,
            direct_discovered_mates,
            double_discovered_mates,
        }
    }

    pub fn add_leaf(&mut self, leaf: LeafFlags) {
        self.nodes += 1;
        self.captures += leaf.capture as u64;
        self.en_passants += leaf.en_passant as u64;
        self.castles += leaf.castle as u64;
        self.promotions += leaf.promotion as u64;
        if let Some(check) = leaf.check {
            let counter = match (check, leaf.mate) {
                (CheckKind::Direct, false) => &mut self.direct_checks,
                (CheckKind::SingleDiscovered, false) => &mut self.single_discovered_checks,
                (CheckKind::DirectDiscovered, false) => &mut self.direct_discovered_checks,
                (CheckKind::DoubleDiscovered, false) => &mut self.double_discovered_checks,
                (CheckKind::Direct, true) => &mut self.direct_mates,
                (CheckKind::SingleDiscovered, true) => &mut self.single_discovered_mates,
                (CheckKind::DirectDiscovered, true) => &mut self.direct_discovered_mates,
                (CheckKind::DoubleDiscovered, true) => &mut self.double_discovered_mates,
            };
            *counter += 1;
        }
    }
}

impl AddAssign for PerftStats {
    fn add_assign(&mut self, rhs: PerftStats) {
        self.accumulate(&rhs, 1);
    }
}

impl std::iter::Sum for PerftStats {
    fn sum<I: Iterator<Item = PerftStats>>(iter: I) -> PerftStats {
        iter.fold(PerftStats::default(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}

impl fmt::Display for PerftStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes: {}", self.nodes)?;
        writeln!(f, "captures: {}", self.captures)?;
        writeln!(f, "enpassants: {}", self.en_passants)?;
        writeln!(f, "castles: {}", self.castles)?;
        writeln!(f, "promotions: {}", self.promotions)?;
        writeln!(f, "direct_checks: {}", self.direct_checks)?;
        writeln!(f, "single_discovered_checks: {}", self.single_discovered_checks)?;
        writeln!(f, "direct_discovered_checks: {}", self.direct_discovered_checks)?;
        writeln!(f, "double_discovered_checks: {}", self.double_discovered_checks)?;
        writeln!(f, "total_checks: {}", self.checks())?;
        writeln!(f, "direct_mates: {}", self.direct_mates)?;
        writeln!(f, "single_discovered_mates: {}", self.single_discovered_mates)?;
        writeln!(f, "direct_discovered_mates: {}", self.direct_discovered_mates)?;
        writeln!(f, "double_discovered_mates: {}", self.double_discovered_mates)?;
        write!(f, "total_mates: {}", self.mates())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Only the moved piece gives check
    Direct,
    /// One checker, not the moved piece
    SingleDiscovered,
    /// The moved piece and one other
    DirectDiscovered,
    /// Two checkers, neither of them the moved piece
    DoubleDiscovered,
}

/// What one leaf move did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafFlags {
    pub capture: bool,
    pub en_passant: bool,
    pub castle: bool,
    pub promotion: bool,
    pub check: Option<CheckKind>,
    pub mate: bool,
}

impl LeafFlags {
    /// Flags known from the move alone.
    #[inline]
    pub fn from_move(mv: Move) -> LeafFlags {
        let kind = mv.kind();
        LeafFlags {
            capture: kind.is_capture(),
            en_passant: kind == MoveKind::EnPassant,
            castle: kind == MoveKind::Castle,
            promotion: kind.is_promotion(),
            check: None,
            mate: false,
        }
    }
}

impl LeafFlags {
    /// Bit `i` set when this leaf increments counter `i` of `PerftStats::to_array`.
    pub fn counter_mask(&self) -> u16 {
        let mut mask = 1u16;
        mask |= u16::from(self.capture) << 1;
        mask |= u16::from(self.en_passant) << 2;
        mask |= u16::from(self.castle) << 3;
        mask |= u16::from(self.promotion) << 4;
        if let Some(check) = self.check {
            let slot = match check {
                CheckKind::Direct => 5,
                CheckKind::SingleDiscovered => 6,
                CheckKind::DirectDiscovered => 7,
                CheckKind::DoubleDiscovered => 8,
            };
            mask |= 1 << (slot + if self.mate { 4 } else { 0 });
        }
        mask
    }
}

/// Square of the piece that "moved" for check attribution: the rook for a castle, the
/// destination otherwise.
#[inline]
fn moved_piece_square(mv: Move) -> u8 {
    if mv.kind() == MoveKind::Castle {
        if mv.to() > mv.from() {
            mv.from() + 1
        } else {
            mv.from() - 1
        }
    } else {
        mv.to()
    }
}

/// Classify `mv`, already played to reach `after`, where `defender` is now to move.
pub fn classify_leaf(tables: &AttackTables, after: &Board, mv: Move, defender: Color) -> LeafFlags {
    let mut flags = LeafFlags::from_move(mv);
    let masks = compute_masks(tables, after, defender);
    if !masks.in_check() {
        return flags;
    }

    flags.check = Some(check_kind(&masks, mv));
    flags.mate = count_with_masks(tables, after, defender, &masks) == 0;
    flags
}

#[inline]
fn check_kind(masks: &CheckMasks, mv: Move) -> CheckKind {
    let direct = masks.checkers & sq_to_bb(moved_piece_square(mv)) != 0;
    match (masks.num_checkers, direct) {
        (1, true) => CheckKind::Direct,
        (1, false) => CheckKind::SingleDiscovered,
        (_, true) => CheckKind::DirectDiscovered,
        (_, false) => CheckKind::DoubleDiscovered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::tests::tables;
    use crate::board::Position;
    use crate::types::PieceType;
    use pretty_assertions::assert_eq;

    fn classify(fen: &str, mv: Move) -> LeafFlags {
        let pos = Position::from_fen(fen, &tables().zobrist).unwrap();
        let after = pos.board.after(&tables().zobrist, mv);
        classify_leaf(tables(), &after, mv, pos.side_to_move.other())
    }

    #[test]
    fn test_quiet_move_has_no_flags() {
        let flags = classify(
            crate::types::START_FEN,
            Move::new(PieceType::Pawn, 12, 28, MoveKind::DoublePush),
        );
        assert_eq!(flags, LeafFlags::default());
    }

    #[test]
    fn test_direct_check() {
        let flags = classify("7k/8/8/8/8/8/8/R3K3 w - - 0 1", Move::new(PieceType::Rook, 0, 48, MoveKind::Normal));
        assert_eq!(flags.check, None);
        let flags = classify("7k/8/8/8/8/8/8/R3K3 w - - 0 1", Move::new(PieceType::Rook, 0, 56, MoveKind::Normal));
        assert_eq!(flags.check, Some(CheckKind::Direct));
        assert!(!flags.mate);
    }

    #[test]
    fn test_back_rank_mate() {
        let flags = classify(
            "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1",
            Move::new(PieceType::Rook, 0, 56, MoveKind::Normal),
        );
        assert_eq!(flags.check, Some(CheckKind::Direct));
        assert!(flags.mate);
    }

    #[test]
    fn test_discovered_checks() {
        // The e4 bishop screens the e1 rook from the e8 king
        let flags = classify(
            "4k3/8/8/8/4B3/8/8/K3R3 w - - 0 1",
            Move::new(PieceType::Bishop, 28, 19, MoveKind::Normal), // Bd3
        );
        assert_eq!(flags.check, Some(CheckKind::SingleDiscovered));

        let flags = classify(
            "4k3/8/8/8/4B3/8/8/K3R3 w - - 0 1",
            Move::new(PieceType::Bishop, 28, 42, MoveKind::Normal), // Bc6
        );
        assert_eq!(flags.check, Some(CheckKind::DirectDiscovered));
    }

    #[test]
    fn test_double_discovered_by_en_passant() {
        // exf6 clears e5 for the e8 rook and f5 for the h7 bishop
        let flags = classify(
            "4R3/7B/8/4Pp2/4k3/8/8/K7 w - f6 0 1",
            Move::new(PieceType::Pawn, 36, 45, MoveKind::EnPassant),
        );
        assert!(flags.en_passant && flags.capture);
        assert_eq!(flags.check, Some(CheckKind::DoubleDiscovered));
    }

    #[test]
    fn test_castle_check_is_direct() {
        // O-O-O puts the rook on d1, checking the d8 king
        let flags = classify(
            "3k4/8/8/8/8/8/8/R3K3 w Q - 0 1",
            Move::new(PieceType::King, 4, 2, MoveKind::Castle),
        );
        assert!(flags.castle);
        assert_eq!(flags.check, Some(CheckKind::Direct));
    }

    #[test]
    fn test_counter_mask_agrees_with_add_leaf() {
        let checks = [
            None,
            Some(CheckKind::Direct),
            Some(CheckKind::SingleDiscovered),
            Some(CheckKind::DirectDiscovered),
            Some(CheckKind::DoubleDiscovered),
        ];
        for check in checks {
            for mate in [false, true] {
                for bits in 0..16u8 {
                    let leaf = LeafFlags {
                        capture: bits & 1 != 0,
                        en_passant: bits & 2 != 0,
                        castle: bits & 4 != 0,
                        promotion: bits & 8 != 0,
                        check,
                        mate: mate && check.is_some(),
                    };
                    let mut stats = PerftStats::default();
                    stats.add_leaf(leaf);
                    let mask = leaf.counter_mask();
                    let expected: Vec<u64> = (0..STAT_COUNT).map(|i| u64::from((mask >> i) & 1)).collect();
                    assert_eq!(stats.to_array().to_vec(), expected);
                }
            }
        }
    }

    #[test]
    fn test_stats_accumulate_and_totals() {
        let mut stats = PerftStats::default();
        stats.add_leaf(LeafFlags {
            capture: true,
            check: Some(CheckKind::Direct),
            mate: true,
            ..LeafFlags::default()
        });
        stats.add_leaf(LeafFlags {
            check: Some(CheckKind::DoubleDiscovered),
            ..LeafFlags::default()
        });
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.checks(), 2);
        assert_eq!(stats.mates(), 1);
        assert_eq!(stats.double_checks(), 1);

        let mut total = PerftStats::single_node();
        total.accumulate(&stats, 3);
        assert_eq!(total.nodes, 7);
        assert_eq!(total.direct_mates, 3);
        assert_eq!(PerftStats::from_array(total.to_array()), total);
    }

    #[test]
    fn test_discovered_total_excludes_direct_discoveries() {
        let mut stats = PerftStats::default();
        for check in [CheckKind::SingleDiscovered, CheckKind::DirectDiscovered, CheckKind::DoubleDiscovered] {
            stats.add_leaf(LeafFlags {
                check: Some(check),
                ..LeafFlags::default()
            });
        }
        stats.add_leaf(LeafFlags {
            check: Some(CheckKind::DirectDiscovered),
            mate: true,
            ..LeafFlags::default()
        });
        assert_eq!(stats.checks(), 4);
        assert_eq!(stats.discovered_checks(), 2);
        assert_eq!(stats.double_checks(), 3);
    }
}
