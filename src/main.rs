//! Perft command line
//!
//! Usage: cargo run --release -- stats --position kiwipete --depth 5
//!        cargo run --release -- divide --position "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -" --depth 4

use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use perft_tree::engine::{EngineConfig, PerftEngine};
use perft_tree::perft::REFERENCE_NODES;

#[derive(Parser, Debug)]
#[command(name = "perft_tree")]
#[command(about = "Exhaustive legal move tree counts with per-category statistics")]
struct Args {
    /// Worker threads (all cores when omitted)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Node-count cache for `nodes`, in MB (0 disables it)
    #[arg(long, global = true, default_value_t = 0)]
    hash_mb: usize,

    /// Seed for the magic number search
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Plies expanded per pipeline pass (1-3)
    #[arg(long, global = true, default_value_t = 3)]
    pipeline_plies: usize,

    /// Launch-frontier boards per pipeline pass
    #[arg(long, global = true, default_value_t = 256)]
    batch_size: usize,

    /// Log filter such as `debug` or `perft_tree=trace`; overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full statistics: captures, en passant, castles, promotions, checks and mates
    Stats {
        /// FEN or one of start, kiwipete, sje, pos3, pos4, pos5
        #[arg(short, long, default_value = "start")]
        position: String,

        #[arg(short, long, default_value_t = 5)]
        depth: u8,
    },
    /// Leaf count only
    Nodes {
        #[arg(short, long, default_value = "start")]
        position: String,

        #[arg(short, long, default_value_t = 6)]
        depth: u8,
    },
    /// Leaf count below each root move
    Divide {
        #[arg(short, long, default_value = "start")]
        position: String,

        #[arg(short, long, default_value_t = 4)]
        depth: u8,
    },
    /// Number of distinct leaf positions
    Unique {
        #[arg(short, long, default_value = "start")]
        position: String,

        #[arg(short, long, default_value_t = 4)]
        depth: u8,
    },
    /// Check node counts against published results
    Verify,
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).wrap_err("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    let engine = PerftEngine::new(EngineConfig {
        pipeline_plies: args.pipeline_plies,
        batch_size: args.batch_size,
        threads: args.threads,
        magic_seed: args.seed,
        hash_mb: args.hash_mb,
    })?;

    match args.command {
        Command::Stats { position, depth } => {
            let pos = engine
                .position(&position)
                .wrap_err_with(|| format!("invalid position {position:?}"))?;
            info!(fen = %pos.to_fen(), depth, "stats");
            let stats = engine.stats(&pos, depth);
            println!("{stats}");
        }
        Command::Nodes { position, depth } => {
            let pos = engine
                .position(&position)
                .wrap_err_with(|| format!("invalid position {position:?}"))?;
            let start = Instant::now();
            let nodes = engine.nodes(&pos, depth);
            info!(depth, elapsed_ms = start.elapsed().as_millis() as u64, "nodes");
            println!("{nodes}");
        }
        Command::Divide { position, depth } => {
            let pos = engine
                .position(&position)
                .wrap_err_with(|| format!("invalid position {position:?}"))?;
            let split = engine.divide(&pos, depth);
            for (mv, nodes) in &split {
                println!("{mv}: {nodes}");
            }
            println!();
            println!("moves: {}", split.len());
            println!("nodes: {}", split.iter().map(|(_, n)| n).sum::<u64>());
        }
        Command::Unique { position, depth } => {
            let pos = engine
                .position(&position)
                .wrap_err_with(|| format!("invalid position {position:?}"))?;
            println!("{}", engine.unique_positions(&pos, depth));
        }
        Command::Verify => verify(&engine)?,
    }

    Ok(())
}

fn verify(engine: &PerftEngine) -> Result<()> {
    let mut failures = 0;
    for &(name, depth, expected) in REFERENCE_NODES {
        let pos = engine.position(name)?;
        let start = Instant::now();
        let nodes = engine.nodes(&pos, depth);
        let elapsed = start.elapsed().as_millis();
        if nodes == expected {
            println!("{name:<10} depth {depth}: {nodes} ok ({elapsed} ms)");
        } else {
            warn!(name, depth, nodes, expected, "node count mismatch");
            println!("{name:<10} depth {depth}: {nodes} FAILED, expected {expected}");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} reference positions failed", REFERENCE_NODES.len());
    }
    Ok(())
}
