//! Perft engine front end
//!
//! `PerftEngine` owns the attack tables and a worker pool, and picks how to run a request:
//! shallow searches go through a single pipeline pass, deeper ones are split at a launch
//! depth into many frontier boards that are fed to the pipeline in batches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::bitboard::AttackTables;
use crate::board::{Board, Position};
use crate::error::{EngineError, FenResult};
use crate::movegen::generate_legal;
use crate::moves::{Move, MoveChain};
use crate::perft::{divide, par_perft_nodes, perft_nodes, unique_positions};
use crate::pipeline::{expand, expand_total, BoardLayer};
use crate::stats::PerftStats;
use crate::tt::PerftTable;
use crate::types::{resolve_fen, Color};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Plies expanded per pipeline pass (1..=3)
    pub pipeline_plies: usize,
    /// Frontier boards per pipeline pass
    pub batch_size: usize,
    /// Worker threads, all cores when unset
    pub threads: Option<usize>,
    /// Fixed seed for the magic search, entropy when unset
    pub magic_seed: Option<u64>,
    /// Node-count cache size in MB for nodes-only perft; 0 disables it
    pub hash_mb: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pipeline_plies: MoveChain::MAX_PLIES,
            batch_size: 256,
            threads: None,
            magic_seed: None,
            hash_mb: 0,
        }
    }
}

impl EngineConfig {
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: Some(threads),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(1..=MoveChain::MAX_PLIES).contains(&self.pipeline_plies) {
            return Err(EngineError::BadPipelinePlies {
                found: self.pipeline_plies,
                max: MoveChain::MAX_PLIES,
            });
        }
        if self.batch_size == 0 {
            return Err(EngineError::EmptyBatch);
        }
        Ok(())
    }
}

/// A distinct launch-frontier board and how many move sequences reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierBoard {
    pub board: Board,
    pub occurrences: u64,
}

pub struct PerftEngine {
    tables: Arc<AttackTables>,
    pool: ThreadPool,
    config: EngineConfig,
}

impl PerftEngine {
    /// Build the attack tables and the worker pool.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let start = Instant::now();
        let tables = match config.magic_seed {
            Some(seed) => AttackTables::build_with_seed(seed),
            None => AttackTables::build(),
        };
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "attack tables ready");
        Self::with_tables(Arc::new(tables), config)
    }

    /// Share already built tables, e.g. between several engines.
    pub fn with_tables(tables: Arc<AttackTables>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        info!(threads = pool.current_num_threads(), "perft engine started");

        Ok(PerftEngine { tables, pool, config })
    }

    pub fn tables(&self) -> &AttackTables {
        &self.tables
    }

    pub fn shared_tables(&self) -> Arc<AttackTables> {
        Arc::clone(&self.tables)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse a FEN or a named position.
    pub fn position(&self, fen_or_name: &str) -> FenResult<Position> {
        Position::from_fen(resolve_fen(fen_or_name), &self.tables.zobrist)
    }

    /// Full statistics `depth` plies below `position`.
    pub fn stats(&self, position: &Position, depth: u8) -> PerftStats {
        let start = Instant::now();
        let plies = self.config.pipeline_plies;
        let stats = if depth == 0 {
            PerftStats::single_node()
        } else if usize::from(depth) <= plies {
            let roots = BoardLayer::from_boards(&[position.board]);
            self.pool
                .install(|| expand_total(&self.tables, &roots, position.side_to_move, usize::from(depth)))
        } else {
            self.split_search(position, depth - plies as u8, plies)
        };

        let elapsed = start.elapsed();
        info!(
            depth,
            nodes = stats.nodes,
            elapsed_ms = elapsed.as_millis() as u64,
            nps = (stats.nodes as f64 / elapsed.as_secs_f64().max(1e-9)) as u64,
            "perft finished"
        );
        stats
    }

    fn split_search(&self, position: &Position, launch_depth: u8, plies: usize) -> PerftStats {
        let frontier = launch_frontier(&self.tables, &position.board, position.side_to_move, launch_depth);
        let side = if launch_depth % 2 == 0 {
            position.side_to_move
        } else {
            position.side_to_move.other()
        };
        let sequences: u64 = frontier.iter().map(|f| f.occurrences).sum();
        info!(
            launch_depth,
            boards = frontier.len(),
            sequences,
            batches = frontier.len().div_ceil(self.config.batch_size),
            "split at launch depth"
        );

        let mut total = PerftStats::default();
        for (batch_idx, batch) in frontier.chunks(self.config.batch_size).enumerate() {
            let boards: Vec<Board> = batch.iter().map(|f| f.board).collect();
            let roots = BoardLayer::from_boards(&boards);
            let per_root = self.pool.install(|| expand(&self.tables, &roots, side, plies));
            for (stats, entry) in per_root.iter().zip(batch) {
                total.accumulate(stats, entry.occurrences);
            }
            debug!(batch = batch_idx, nodes = total.nodes, "batch done");
        }
        total
    }

    /// Leaf count only; uses the node-count cache when `hash_mb` is set.
    pub fn nodes(&self, position: &Position, depth: u8) -> u64 {
        let (board, side) = (&position.board, position.side_to_move);
        if self.config.hash_mb > 0 {
            let mut table = PerftTable::new(self.config.hash_mb);
            let nodes = perft_nodes(&self.tables, board, side, depth, Some(&mut table));
            debug!("{}", table.info());
            nodes
        } else {
            self.pool.install(|| par_perft_nodes(&self.tables, board, side, depth))
        }
    }

    pub fn divide(&self, position: &Position, depth: u8) -> Vec<(Move, u64)> {
        self.pool
            .install(|| divide(&self.tables, &position.board, position.side_to_move, depth))
    }

    pub fn unique_positions(&self, position: &Position, depth: u8) -> usize {
        unique_positions(&self.tables, &position.board, position.side_to_move, depth)
    }
}

/// Every distinct board `depth` plies below `board`, in first-seen order, with the number of
/// move sequences that reach it.
pub fn launch_frontier(tables: &AttackTables, board: &Board, side: Color, depth: u8) -> Vec<FrontierBoard> {
    let mut frontier = Vec::new();
    let mut index = HashMap::new();
    collect_frontier(tables, board, side, depth, &mut frontier, &mut index);
    frontier
}

fn collect_frontier(
    tables: &AttackTables,
    board: &Board,
    side: Color,
    depth: u8,
    frontier: &mut Vec<FrontierBoard>,
    index: &mut HashMap<Board, usize>,
) {
    if depth == 0 {
        match index.get(board) {
            Some(&slot) => frontier[slot].occurrences += 1,
            None => {
                index.insert(*board, frontier.len());
                frontier.push(FrontierBoard {
                    board: *board,
                    occurrences: 1,
                });
            }
        }
        return;
    }

    for mv in generate_legal(tables, board, side).iter() {
        let child = board.after(&tables.zobrist, mv);
        collect_frontier(tables, &child, side.other(), depth - 1, frontier, index);
    }
}
