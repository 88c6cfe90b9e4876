use criterion::{black_box, criterion_group, criterion_main, Criterion};
use perft_tree::bitboard::AttackTables;
use perft_tree::board::Position;
use perft_tree::movegen::{count_legal, generate_legal};
use perft_tree::perft::{perft_nodes, perft_stats};
use perft_tree::pipeline::{expand_total, BoardLayer};
use perft_tree::types::{Color, KIWIPETE_FEN, START_FEN};

const SEED: u64 = 0x5EED;

fn setup(fen: &str) -> (AttackTables, Position) {
    let tables = AttackTables::build_with_seed(SEED);
    let pos = Position::from_fen(fen, &tables.zobrist).unwrap();
    (tables, pos)
}

pub fn bench_legal_moves_from_start(c: &mut Criterion) {
    let (tables, pos) = setup(START_FEN);
    c.bench_function("generate legal moves from start", |b| {
        b.iter(|| generate_legal(&tables, black_box(&pos.board), Color::White))
    });
}

pub fn bench_legal_moves_from_kiwipete(c: &mut Criterion) {
    let (tables, pos) = setup(KIWIPETE_FEN);
    c.bench_function("generate legal moves from kiwipete", |b| {
        b.iter(|| generate_legal(&tables, black_box(&pos.board), Color::White))
    });
    c.bench_function("count legal moves from kiwipete", |b| {
        b.iter(|| count_legal(&tables, black_box(&pos.board), Color::White))
    });
}

pub fn bench_table_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat-sampling");
    group.sample_size(10);
    group.bench_function("build attack tables", |b| {
        b.iter(|| AttackTables::build_with_seed(black_box(SEED)))
    });
    group.finish();
}

pub fn bench_perft_nodes_4(c: &mut Criterion) {
    let (tables, pos) = setup(START_FEN);
    c.bench_function("perft nodes from start 4 ply", |b| {
        b.iter(|| perft_nodes(&tables, black_box(&pos.board), pos.side_to_move, 4, None))
    });
}

pub fn bench_perft_stats_3_kiwipete(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat-sampling");
    group.sample_size(10);

    let (tables, pos) = setup(KIWIPETE_FEN);
    group.bench_function("scalar stats from kiwipete 3 ply", |b| {
        b.iter(|| perft_stats(&tables, black_box(&pos.board), pos.side_to_move, 3))
    });

    let roots = BoardLayer::from_boards(&[pos.board]);
    group.bench_function("pipeline stats from kiwipete 3 ply", |b| {
        b.iter(|| expand_total(&tables, black_box(&roots), pos.side_to_move, 3))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_legal_moves_from_start,
    bench_legal_moves_from_kiwipete,
    bench_table_build,
    bench_perft_nodes_4,
    bench_perft_stats_3_kiwipete,
);
criterion_main!(benches);
