//! 探索のエンドツーエンドテスト
//!
//! Searcherを実際に起動し、reporter経由で結果を検証する。
//! 単一スレッドでは探索は決定的であることに依存するテストを含む。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mikazuki_core::movegen::{generate_all, MoveList};
use mikazuki_core::position::{KeyRecord, Position};
use mikazuki_core::search::{
    CompoundLimiter, MoveTimeLimiter, NodeLimiter, SearchInfo, SearchLimiter, SearchReporter,
    Searcher,
};
use mikazuki_core::types::{Move, Value};

/// 結果を収集するテスト用レポーター
#[derive(Default)]
struct CollectingReporter {
    infos: Mutex<Vec<SearchInfo>>,
    best: Mutex<Option<Move>>,
    resigned: AtomicBool,
    win_declared: AtomicBool,
}

impl SearchReporter for CollectingReporter {
    fn on_iteration(&self, info: &SearchInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }

    fn on_best_move(&self, best: Move) {
        *self.best.lock().unwrap() = Some(best);
    }

    fn on_no_legal_moves(&self) {
        self.resigned.store(true, Ordering::SeqCst);
    }

    fn on_win_declared(&self) {
        self.win_declared.store(true, Ordering::SeqCst);
    }

    fn info_string(&self, _message: &str) {}
}

fn wait_for_search(searcher: &Searcher, timeout: Duration) {
    let start = Instant::now();
    while searcher.is_searching() {
        assert!(start.elapsed() < timeout, "search did not finish in {timeout:?}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn run_to_depth(
    sfen: &str,
    depth: i32,
    limiter: Box<dyn SearchLimiter>,
) -> (Arc<CollectingReporter>, Move) {
    let reporter = Arc::new(CollectingReporter::default());
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
    let pos = Position::from_sfen(sfen).expect("test sfen");

    searcher.start_search(&pos, &[], Instant::now(), false, depth, limiter);
    wait_for_search(&searcher, Duration::from_secs(60));

    let best = reporter.best.lock().unwrap().expect("bestmove expected");
    (reporter, best)
}

#[test]
fn finds_mate_in_one() {
    let (reporter, best) = run_to_depth(
        "k8/9/1G7/9/9/9/9/9/8K b G 1",
        5,
        Box::new(CompoundLimiter::new()),
    );

    // 一手詰めの金打ちは2通りあり、どちらでもよい
    assert!(
        best.to_usi() == "G*9b" || best.to_usi() == "G*8b",
        "expected a mating gold drop, got {best}"
    );
    let infos = reporter.infos.lock().unwrap();
    let last = infos.last().expect("at least one info");
    assert_eq!(last.score, Value::mate_in(1));
}

#[test]
fn repetition_scores_as_draw() {
    // 飛車の往復で同一局面を3回作ってから探索する
    let mut pos = Position::startpos();
    let mut history: Vec<KeyRecord> = Vec::new();
    let cycle = ["2h3h", "8b7b", "3h2h", "7b8b"];
    for _ in 0..3 {
        for usi in cycle {
            history.push(KeyRecord {
                key: pos.key(),
                board_key: pos.board_key(),
                hand: pos.hand(pos.side_to_move()),
            });
            pos = pos.apply_move(Move::from_usi(usi).unwrap());
        }
    }

    let reporter = Arc::new(CollectingReporter::default());
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
    searcher.start_search(
        &pos,
        &history,
        Instant::now(),
        false,
        8,
        Box::new(CompoundLimiter::new()),
    );
    wait_for_search(&searcher, Duration::from_secs(60));

    let best = reporter.best.lock().unwrap().expect("bestmove expected");
    assert!(pos.pseudo_legal(best) && pos.is_legal(best));

    // 千日手を許す側も咎める側もいないので評価は引き分け圏
    // （引き分けスコアの揺らぎと補正ヒストリのぶんだけ0から僅かにずれる）
    let infos = reporter.infos.lock().unwrap();
    let last = infos.last().unwrap();
    assert!(
        last.score.raw().abs() <= 8,
        "expected near-draw score, got {}",
        last.score.raw()
    );
}

#[test]
fn single_thread_search_is_deterministic() {
    let run = || {
        let reporter = Arc::new(CollectingReporter::default());
        let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
        let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
        let pos = Position::startpos();
        searcher.start_search(
            &pos,
            &[],
            Instant::now(),
            false,
            64,
            Box::new(NodeLimiter::new(50_000)),
        );
        wait_for_search(&searcher, Duration::from_secs(60));
        let best = reporter.best.lock().unwrap().expect("bestmove");
        let infos = reporter.infos.lock().unwrap();
        let nodes = infos.last().unwrap().nodes;
        let pv = infos.last().unwrap().pv.clone();
        (best, nodes, pv)
    };

    let (best1, nodes1, pv1) = run();
    let (best2, nodes2, pv2) = run();
    assert_eq!(best1, best2);
    assert_eq!(nodes1, nodes2);
    assert_eq!(pv1, pv2);
}

#[test]
fn stop_terminates_infinite_search_quickly() {
    let reporter = Arc::new(CollectingReporter::default());
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
    let pos = Position::startpos();

    searcher.start_search(
        &pos,
        &[],
        Instant::now(),
        true,
        64,
        Box::new(CompoundLimiter::new()),
    );
    std::thread::sleep(Duration::from_millis(200));
    assert!(searcher.is_searching());
    assert!(reporter.best.lock().unwrap().is_none(), "bestmove must wait for stop");

    let stop_start = Instant::now();
    searcher.stop();
    assert!(
        stop_start.elapsed() < Duration::from_millis(500),
        "stop took {:?}",
        stop_start.elapsed()
    );
    wait_for_search(&searcher, Duration::from_secs(5));
    assert!(reporter.best.lock().unwrap().is_some());
}

#[test]
fn multi_thread_search_returns_legal_move() {
    let reporter = Arc::new(CollectingReporter::default());
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let mut searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
    searcher.set_threads(4);

    let pos = Position::startpos();
    let start = Instant::now();
    searcher.start_search(
        &pos,
        &[],
        start,
        false,
        64,
        Box::new(MoveTimeLimiter::new(start, Duration::from_millis(500))),
    );
    wait_for_search(&searcher, Duration::from_secs(10));

    let best = reporter.best.lock().unwrap().expect("bestmove expected");
    let mut legal = MoveList::new();
    generate_all(&mut legal, &pos);
    assert!(legal.iter().any(|e| e.mv == best && pos.is_legal(e.mv)));
}

#[test]
fn no_legal_moves_reports_resignation() {
    // 金2枚で先手玉が詰んでいる局面（5hの金は6hが守っており取れない）
    let reporter = Arc::new(CollectingReporter::default());
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
    let pos = Position::from_sfen("4k4/9/9/9/9/9/9/3gg4/4K4 b - 1").unwrap();

    let mut list = MoveList::new();
    generate_all(&mut list, &pos);
    assert!(!list.iter().any(|e| pos.is_legal(e.mv)), "fixture must be mate");

    searcher.start_search(
        &pos,
        &[],
        Instant::now(),
        false,
        3,
        Box::new(CompoundLimiter::new()),
    );
    // 合法手がなければ探索は始まらず、即座にresignが報告される
    assert!(reporter.resigned.load(Ordering::SeqCst));
}

#[test]
fn entering_king_declares_win() {
    let reporter = Arc::new(CollectingReporter::default());
    let dyn_reporter: Arc<dyn SearchReporter> = reporter.clone();
    let searcher = Searcher::new(16, Arc::clone(&dyn_reporter));
    let pos =
        Position::from_sfen("RGPPPPPPP/BGPP5/GSK6/9/9/9/9/9/4k4 b 5P 1").unwrap();
    assert!(pos.is_entering_kings_win());

    searcher.start_search(
        &pos,
        &[],
        Instant::now(),
        false,
        3,
        Box::new(CompoundLimiter::new()),
    );
    assert!(reporter.win_declared.load(Ordering::SeqCst));
}
