//! ベンチマーク
//!
//! 固定のSFENスイートを単一スレッド・固定深さで探索し、
//! 局面ごとのノード数と全体のnpsを表示する。

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};

use mikazuki_core::position::Position;
use mikazuki_core::search::{CompoundLimiter, SearchInfo, SearchReporter, Searcher};
use mikazuki_core::types::Move;

/// ベンチ用の局面（平手・中盤・最多合法手）
const BENCH_SFENS: [&str; 4] = [
    "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1",
    "lnsgkgsnl/1r5b1/pppppp1pp/6p2/9/2P6/PP1PPPPPP/1B5R1/LNSGKGSNL b - 1",
    "l+R6l/5k3/4gp1p1/p1p4np/5P3/P1P3P1P/1P1P1GN2/6SK1/LN2s2+rL w BG2SN5Pbg2p 45",
    "R8/2K1S1SSk/4B4/9/9/9/9/9/1L1L1L3 b RBGSNLP3g3n17p 1",
];

/// ベンチ中の情報を拾うだけのレポーター
struct BenchReporter {
    last: Mutex<Option<SearchInfo>>,
}

impl SearchReporter for BenchReporter {
    fn on_iteration(&self, info: &SearchInfo) {
        *self.last.lock().expect("bench reporter") = Some(info.clone());
    }

    fn on_best_move(&self, _best: Move) {}
    fn on_no_legal_moves(&self) {}
    fn on_win_declared(&self) {}
    fn info_string(&self, _message: &str) {}
}

pub fn run(depth: i32) -> Result<()> {
    let reporter: Arc<BenchReporter> = Arc::new(BenchReporter {
        last: Mutex::new(None),
    });
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));

    let mut total_nodes = 0u64;
    let start = Instant::now();

    for (i, sfen) in BENCH_SFENS.iter().enumerate() {
        let pos = Position::from_sfen(sfen)
            .with_context(|| format!("bad bench sfen #{i}"))?;

        searcher.new_game();
        *reporter.last.lock().expect("bench reporter") = None;

        searcher.start_search(
            &pos,
            &[],
            Instant::now(),
            false,
            depth,
            Box::new(CompoundLimiter::new()),
        );
        while searcher.is_searching() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let nodes = reporter
            .last
            .lock()
            .expect("bench reporter")
            .as_ref()
            .map(|info| info.nodes)
            .unwrap_or(0);
        total_nodes += nodes;
        println!("position {:>2}: {nodes:>12} nodes", i + 1);
    }

    let elapsed = start.elapsed();
    let nps = if elapsed.as_millis() > 0 {
        total_nodes * 1000 / elapsed.as_millis() as u64
    } else {
        0
    };
    println!("{total_nodes} nodes {nps} nps");

    Ok(())
}
