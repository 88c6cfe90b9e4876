//! Scalar reference perft.
//!
//! Plain depth-first recursion over `generate_legal`. The batched pipeline is checked against
//! these functions, and the root-split variants fan the root moves out over rayon.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::debug;

use crate::bitboard::AttackTables;
use crate::board::Board;
use crate::movegen::{count_legal, generate_legal};
use crate::moves::Move;
use crate::stats::{classify_leaf, PerftStats};
use crate::tt::PerftTable;
use crate::types::{Color, NO_EN_PASSANT};

/// Full statistics for every leaf `depth` plies below `board`.
pub fn perft_stats(tables: &AttackTables, board: &Board, side: Color, depth: u8) -> PerftStats {
    if depth == 0 {
        return PerftStats::single_node();
    }

    let mut stats = PerftStats::default();
    for mv in generate_legal(tables, board, side).iter() {
        let child = board.after(&tables.zobrist, mv);
        if depth == 1 {
            stats.add_leaf(classify_leaf(tables, &child, mv, side.other()));
        } else {
            stats += perft_stats(tables, &child, side.other(), depth - 1);
        }
    }
    stats
}

/// `perft_stats` with the root moves searched in parallel.
pub fn par_perft_stats(tables: &AttackTables, board: &Board, side: Color, depth: u8) -> PerftStats {
    if depth <= 1 {
        return perft_stats(tables, board, side, depth);
    }

    let moves = generate_legal(tables, board, side);
    moves
        .as_slice()
        .par_iter()
        .map(|&mv| {
            let child = board.after(&tables.zobrist, mv);
            perft_stats(tables, &child, side.other(), depth - 1)
        })
        .sum()
}

/// Leaf count only. The last ply is counted without generating moves, and interior
/// subtrees are looked up in `cache` when one is given.
pub fn perft_nodes(
    tables: &AttackTables,
    board: &Board,
    side: Color,
    depth: u8,
    mut cache: Option<&mut PerftTable>,
) -> u64 {
    match depth {
        0 => return 1,
        1 => return count_legal(tables, board, side) as u64,
        _ => {}
    }

    let key = PerftTable::key(board.hash, board.occupied());
    if let Some(nodes) = cache.as_deref_mut().and_then(|tt| tt.probe(key, depth)) {
        return nodes;
    }

    let mut nodes = 0;
    for mv in generate_legal(tables, board, side).iter() {
        let child = board.after(&tables.zobrist, mv);
        nodes += perft_nodes(tables, &child, side.other(), depth - 1, cache.as_deref_mut());
    }

    if let Some(tt) = cache {
        tt.store(key, depth, nodes);
    }
    nodes
}

/// `perft_nodes` with the root moves searched in parallel, uncached.
pub fn par_perft_nodes(tables: &AttackTables, board: &Board, side: Color, depth: u8) -> u64 {
    if depth <= 2 {
        return perft_nodes(tables, board, side, depth, None);
    }

    generate_legal(tables, board, side)
        .as_slice()
        .par_iter()
        .map(|&mv| {
            let child = board.after(&tables.zobrist, mv);
            perft_nodes(tables, &child, side.other(), depth - 1, None)
        })
        .sum()
}

/// Node count below each root move, in generation order.
pub fn divide(tables: &AttackTables, board: &Board, side: Color, depth: u8) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }

    let moves = generate_legal(tables, board, side);
    let split: Vec<(Move, u64)> = moves
        .as_slice()
        .par_iter()
        .map(|&mv| {
            let child = board.after(&tables.zobrist, mv);
            (mv, perft_nodes(tables, &child, side.other(), depth - 1, None))
        })
        .collect();
    debug!(moves = split.len(), depth, "divide finished");
    split
}

/// Hash used to tell leaf positions apart. The en-passant file only distinguishes two
/// positions when the side to move actually has a pawn that can take on it.
pub fn unique_key(tables: &AttackTables, board: &Board, side: Color) -> u64 {
    let file = board.en_passant_file;
    if file == NO_EN_PASSANT {
        return board.hash;
    }

    let target = match side {
        Color::White => 40 + file,
        Color::Black => 16 + file,
    };
    let capturers = tables.pawn_attacks(side.other(), target) & board.pawn & board.color_bb(side);
    if capturers != 0 {
        board.hash
    } else {
        board.hash ^ tables.zobrist.en_passant_state(file)
    }
}

/// Number of distinct positions exactly `depth` plies below `board`.
pub fn unique_positions(tables: &AttackTables, board: &Board, side: Color, depth: u8) -> usize {
    let mut seen = HashSet::new();
    collect_unique(tables, board, side, depth, &mut seen);
    debug!(depth, positions = seen.len(), "unique leaf positions");
    seen.len()
}

fn collect_unique(tables: &AttackTables, board: &Board, side: Color, depth: u8, seen: &mut HashSet<u64>) {
    if depth == 0 {
        seen.insert(unique_key(tables, board, side));
        return;
    }
    for mv in generate_legal(tables, board, side).iter() {
        let child = board.after(&tables.zobrist, mv);
        collect_unique(tables, &child, side.other(), depth - 1, seen);
    }
}

/// Perft from starting position
///
/// https://www.chessprogramming.org/Perft_Results
///
/// | Depth | Nodes                         | Captures        | E.p.        | Castles       | Promotions | Checks         | Discovery Checks | Double Checks | Checkmates  |
/// | ----- | ----------------------------- | --------------- | ----------- | ------------- | ---------- | -------------- | ---------------- | ------------- | ----------- |
/// | 0     | 1                             | 0               | 0           | 0             | 0          | 0              | 0                | 0             | 0           |
/// | 1     | 20                            | 0               | 0           | 0             | 0          | 0              | 0                | 0             | 0           |
/// | 2     | 400                           | 0               | 0           | 0             | 0          | 0              | 0                | 0             | 0           |
/// | 3     | 8,902                         | 34              | 0           | 0             | 0          | 12             | 0                | 0             | 0           |
/// | 4     | 197,281                       | 1576            | 0           | 0             | 0          | 469            | 0                | 0             | 8           |
/// | 5     | 4,865,609                     | 82,719          | 258         | 0             | 0          | 27,351         | 6                | 0             | 347         |
/// | 6     | 119,060,324                   | 2,812,008       | 5248        | 0             | 0          | 809,099        | 329              | 46            | 10,828      |
/// | 7     | 3,195,901,860                 | 108,329,926     | 319,617     | 883,453       | 0          | 33,103,848     | 18,026           | 1628          | 435,767     |
/// | 8     | 84,998,978,956                | 3,523,740,106   | 7,187,977   | 23,605,205    | 0          | 968,981,593    | 847,039          | 147,215       | 9,852,036   |
/// | 9     | 2,439,530,234,167             | 125,208,536,153 | 319,496,827 | 1,784,356,000 | 17,334,376 | 36,095,901,903 | 37,101,713       | 5,547,231     | 400,191,963 |
/// | 10    | 69,352,859,712,417            |                 |             |               |            |                |                  |               |             |
/// | 11    | 2,097,651,003,696,806         |                 |             |               |            |                |                  |               |             |
/// | 12    | 62,854,969,236,701,747        |                 |             |               |            |                |                  |               |             |
/// | 13    | 1,981,066,775,000,396,239     |                 |             |               |            |                |                  |               |             |
pub fn start_position_nodes(depth: u8) -> Option<u64> {
    match depth {
        0 => Some(1),
        1 => Some(20),
        2 => Some(400),
        3 => Some(8902),
        4 => Some(197_281),
        5 => Some(4_865_609),
        6 => Some(119_060_324),
        7 => Some(3_195_901_860),
        8 => Some(84_998_978_956),
        9 => Some(2_439_530_234_167),
        10 => Some(69_352_859_712_417),
        11 => Some(2_097_651_003_696_806),
        12 => Some(62_854_969_236_701_747),
        _ => None,
    }
}

/// Published node counts used by `verify`: (named position, depth, nodes).
pub const REFERENCE_NODES: &[(&str, u8, u64)] = &[
    ("start", 5, 4_865_609),
    ("kiwipete", 4, 4_085_603),
    ("pos3", 5, 674_624),
    ("pos4", 4, 422_333),
    ("pos5", 4, 2_103_487),
    ("sje", 4, 3_894_594),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::tests::tables;
    use crate::board::Position;
    use crate::types::{resolve_fen, POSITION_5_FEN, START_FEN};

    const MAX_DEPTH: u8 = 4;

    fn position(fen: &str) -> Position {
        Position::from_fen(fen, &tables().zobrist).unwrap()
    }

    #[test]
    fn perft_start() {
        let pos = position(START_FEN);
        for depth in 0..=MAX_DEPTH {
            let expected = start_position_nodes(depth).unwrap();
            assert_eq!(perft_nodes(tables(), &pos.board, pos.side_to_move, depth, None), expected);
            assert_eq!(perft_stats(tables(), &pos.board, pos.side_to_move, depth).nodes, expected);
        }
    }

    /// Run the perft test on the "position 5" from
    /// https://www.chessprogramming.org/Perft_Results
    ///
    /// Depth | Nodes
    /// ----- | -----
    /// 1     | 44
    /// 2     | 1,486
    /// 3     | 62,379
    #[test]
    fn perft_pos_5() {
        let pos = position(POSITION_5_FEN);
        let expected = [1, 44, 1_486, 62_379];

        for (depth, &nodes) in expected.iter().enumerate() {
            assert_eq!(perft_nodes(tables(), &pos.board, pos.side_to_move, depth as u8, None), nodes);
        }
    }

    #[test]
    fn test_start_stats_depth_3() {
        let pos = position(START_FEN);
        let stats = perft_stats(tables(), &pos.board, pos.side_to_move, 3);
        assert_eq!(stats.nodes, 8902);
        assert_eq!(stats.captures, 34);
        assert_eq!(stats.checks(), 12);
        assert_eq!(stats.mates(), 0);
        assert_eq!(stats.discovered_checks(), 0);
    }

    #[test]
    fn test_cached_nodes_match_uncached() {
        let pos = position(resolve_fen("kiwipete"));
        let mut tt = PerftTable::new(4);
        let cached = perft_nodes(tables(), &pos.board, pos.side_to_move, 3, Some(&mut tt));
        assert_eq!(cached, 97_862);
        // A second run is answered from the root entry
        let again = perft_nodes(tables(), &pos.board, pos.side_to_move, 3, Some(&mut tt));
        assert_eq!(again, 97_862);
        assert!(tt.hits > 0);
    }

    #[test]
    fn test_parallel_matches_scalar() {
        let pos = position(resolve_fen("pos4"));
        let scalar = perft_stats(tables(), &pos.board, pos.side_to_move, 3);
        let parallel = par_perft_stats(tables(), &pos.board, pos.side_to_move, 3);
        assert_eq!(scalar, parallel);
        assert_eq!(par_perft_nodes(tables(), &pos.board, pos.side_to_move, 3), 9467);
    }

    #[test]
    fn test_divide_sums_to_total() {
        let pos = position(START_FEN);
        let split = divide(tables(), &pos.board, pos.side_to_move, 3);
        assert_eq!(split.len(), 20);
        assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 8902);
        let e2e4 = split.iter().find(|(mv, _)| mv.to_uci() == "e2e4").unwrap();
        assert_eq!(e2e4.1, 600);
    }

    #[test]
    fn test_unique_positions() {
        let pos = position(START_FEN);
        let expected = [1, 20, 400, 5362];
        for (depth, &count) in expected.iter().enumerate() {
            assert_eq!(unique_positions(tables(), &pos.board, pos.side_to_move, depth as u8), count);
        }
    }

    #[test]
    fn test_unique_key_ignores_dead_en_passant() {
        // After 1.e4 nothing can take on e3
        let keys = &tables().zobrist;
        let with_ep = position("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        let without = position("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1");
        assert_ne!(with_ep.board.hash, without.board.hash);
        assert_eq!(
            unique_key(tables(), &with_ep.board, Color::Black),
            unique_key(tables(), &without.board, Color::Black)
        );
        assert_eq!(without.board.hash, without.board.compute_hash(keys, Color::Black));

        // A black pawn on d4 keeps the file live
        let live = position("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert_eq!(unique_key(tables(), &live.board, Color::Black), live.board.hash);
    }
}
