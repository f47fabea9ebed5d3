//! 指し手生成のベンチマーク

use criterion::{criterion_group, criterion_main, Criterion};

use mikazuki_core::movegen::{generate_all, perft, MoveList};
use mikazuki_core::position::Position;

fn bench_generate_all(c: &mut Criterion) {
    let startpos = Position::startpos();
    let midgame = Position::from_sfen(
        "l+R6l/5k3/4gp1p1/p1p4np/5P3/P1P3P1P/1P1P1GN2/6SK1/LN2s2+rL w BG2SN5Pbg2p 45",
    )
    .unwrap();

    c.bench_function("generate_all startpos", |b| {
        b.iter(|| {
            let mut list = MoveList::new();
            generate_all(&mut list, &startpos);
            list.len()
        })
    });

    c.bench_function("generate_all midgame", |b| {
        b.iter(|| {
            let mut list = MoveList::new();
            generate_all(&mut list, &midgame);
            list.len()
        })
    });
}

fn bench_perft(c: &mut Criterion) {
    let startpos = Position::startpos();
    c.bench_function("perft 2 startpos", |b| b.iter(|| perft(&startpos, 2)));
}

criterion_group!(benches, bench_generate_all, bench_perft);
criterion_main!(benches);
