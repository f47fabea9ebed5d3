//! 探索スレッドの管理
//!
//! ワーカーは起動時にまとめてspawnし、再利用可能なバリアの組で
//! 探索サイクルを同期する:
//!
//! 1. reset barrier: 全スレッド（+呼び出しスレッド）が集合し、
//!    呼び出し側がジョブを設定する
//! 2. idle barrier: ワーカーを探索へ解き放つ
//! 3. search-end barrier: 全ワーカーの終了を待ち合わせる
//!
//! `stop()` は停止フラグを立て、runningが0になるまでcondvarで待つ。
//! 最終結果を公表するのはメインワーカー（thread_id = 0）だけ。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::movegen::{generate_all, MoveList};
use crate::nnue;
use crate::position::{KeyRecord, Position};
use crate::tt::TranspositionTable;
use crate::types::{Depth, Move, MAX_PLY};

use super::alpha_beta::Worker;
use super::limits::SearchLimiter;
use super::SearchReporter;

/// ワーカースレッドのスタックサイズ
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// ルート合法手の生成結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootStatus {
    NoLegalMoves,
    Generated,
}

/// 探索ジョブ（バリア越しにワーカーへ渡る）
pub(super) struct SearchJob {
    pub pos: Position,
    pub key_history: Vec<KeyRecord>,
    pub root_moves: Vec<Move>,
    pub max_depth: Depth,
    pub infinite: bool,
    pub limiter: Option<Box<dyn SearchLimiter>>,
    pub start_time: Instant,
}

impl SearchJob {
    fn empty() -> SearchJob {
        SearchJob {
            pos: Position::startpos(),
            key_history: Vec::new(),
            root_moves: Vec::new(),
            max_depth: 1,
            infinite: false,
            limiter: None,
            start_time: Instant::now(),
        }
    }
}

/// ワーカー間で共有する状態
pub(super) struct SearchShared {
    pub tt: Arc<TranspositionTable>,
    pub reporter: Arc<dyn SearchReporter>,
    pub stop: AtomicBool,
    pub quit: AtomicBool,
    pub searching: AtomicBool,
    pub running: AtomicU32,
    pub clear_epoch: AtomicU64,
    pub reset_barrier: Barrier,
    pub idle_barrier: Barrier,
    pub end_barrier: Barrier,
    pub stop_mutex: Mutex<()>,
    pub stop_cv: Condvar,
    pub job: Mutex<SearchJob>,
    pub node_counters: Vec<AtomicU64>,
}

impl SearchShared {
    fn new(
        threads: usize,
        tt: Arc<TranspositionTable>,
        reporter: Arc<dyn SearchReporter>,
    ) -> SearchShared {
        SearchShared {
            tt,
            reporter,
            stop: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            searching: AtomicBool::new(false),
            running: AtomicU32::new(0),
            clear_epoch: AtomicU64::new(0),
            reset_barrier: Barrier::new(threads + 1),
            idle_barrier: Barrier::new(threads + 1),
            end_barrier: Barrier::new(threads),
            stop_mutex: Mutex::new(()),
            stop_cv: Condvar::new(),
            job: Mutex::new(SearchJob::empty()),
            node_counters: (0..threads).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

fn worker_loop(shared: Arc<SearchShared>, thread_id: usize) {
    // ネットワークは起動時に検証済み（異常ならここには来ない）
    let net = match nnue::network() {
        Ok(net) => net,
        Err(_) => return,
    };
    let mut worker = Worker::new(Arc::clone(&shared), net, thread_id);

    loop {
        shared.reset_barrier.wait();
        shared.idle_barrier.wait();
        if shared.quit.load(Ordering::Relaxed) {
            return;
        }
        worker.run_search();
    }
}

/// 探索器
///
/// プロトコル層から使う外向きの入口。スレッドプールと置換表を所有する。
pub struct Searcher {
    tt: Arc<TranspositionTable>,
    reporter: Arc<dyn SearchReporter>,
    shared: Arc<SearchShared>,
    handles: Vec<JoinHandle<()>>,
}

impl Searcher {
    pub fn new(tt_size_mib: usize, reporter: Arc<dyn SearchReporter>) -> Searcher {
        let tt = Arc::new(TranspositionTable::new(tt_size_mib));
        let shared = Arc::new(SearchShared::new(1, Arc::clone(&tt), Arc::clone(&reporter)));
        let handles = Self::spawn_workers(&shared, 1);
        Searcher {
            tt,
            reporter,
            shared,
            handles,
        }
    }

    fn spawn_workers(shared: &Arc<SearchShared>, threads: usize) -> Vec<JoinHandle<()>> {
        (0..threads)
            .map(|thread_id| {
                let shared = Arc::clone(shared);
                std::thread::Builder::new()
                    .name(format!("mikazuki-search-{thread_id}"))
                    .stack_size(WORKER_STACK_SIZE)
                    .spawn(move || worker_loop(shared, thread_id))
                    .expect("failed to spawn search thread")
            })
            .collect()
    }

    /// スレッド数を変更する（プールを作り直す）
    pub fn set_threads(&mut self, threads: usize) {
        let threads = threads.clamp(1, 256);
        self.stop();
        self.shutdown_threads();

        self.shared = Arc::new(SearchShared::new(
            threads,
            Arc::clone(&self.tt),
            Arc::clone(&self.reporter),
        ));
        self.handles = Self::spawn_workers(&self.shared, threads);
        log::info!("search threads: {threads}");
    }

    /// 置換表サイズの変更を予約する（isreadyで適用）
    pub fn set_tt_size(&self, mib: usize) {
        self.tt.resize(mib);
        log::info!("tt resize pending: {mib} MiB");
    }

    /// isready対応: 遅延された置換表の確保を済ませる
    ///
    /// 実際に確保を行った場合trueを返す。
    pub fn ensure_ready(&self) -> bool {
        self.tt.finalize()
    }

    /// usinewgame対応: 置換表と全ワーカーのヒストリをクリアする
    pub fn new_game(&self) {
        self.tt.finalize();
        self.tt.clear();
        self.shared.clear_epoch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_searching(&self) -> bool {
        self.shared.searching.load(Ordering::Acquire)
    }

    /// ルート合法手を生成する
    pub fn init_root_moves(dst: &mut MoveList, pos: &Position) -> RootStatus {
        let mut generated = MoveList::new();
        generate_all(&mut generated, pos);
        for ext in generated.iter() {
            if pos.is_legal(ext.mv) {
                dst.push(ext.mv);
            }
        }
        if dst.is_empty() {
            RootStatus::NoLegalMoves
        } else {
            RootStatus::Generated
        }
    }

    /// 探索を開始する（非同期。結果はreporter経由で届く）
    pub fn start_search(
        &self,
        pos: &Position,
        key_history: &[KeyRecord],
        start_time: Instant,
        infinite: bool,
        max_depth: Depth,
        limiter: Box<dyn SearchLimiter>,
    ) {
        if self.is_searching() {
            self.reporter.info_string("already searching");
            return;
        }

        // 宣言勝ち・合法手なしはワーカーを起こさず即座に応答する
        if pos.is_entering_kings_win() {
            self.reporter.on_win_declared();
            return;
        }
        let mut root_moves = MoveList::new();
        if Self::init_root_moves(&mut root_moves, pos) == RootStatus::NoLegalMoves {
            self.reporter.on_no_legal_moves();
            return;
        }

        self.tt.finalize();
        self.tt.new_search();

        let threads = self.handles.len();
        self.shared.searching.store(true, Ordering::Release);
        self.shared.stop.store(false, Ordering::Relaxed);
        self.shared.running.store(threads as u32, Ordering::SeqCst);

        // 全ワーカーを起こし、ジョブを設定してから解き放つ
        self.shared.reset_barrier.wait();
        {
            let mut job = self.shared.job.lock().expect("job mutex");
            job.pos = pos.clone();
            job.key_history = key_history.to_vec();
            job.root_moves = root_moves.iter().map(|e| e.mv).collect();
            job.max_depth = if max_depth <= 0 {
                MAX_PLY - 1
            } else {
                max_depth.min(MAX_PLY - 1)
            };
            job.infinite = infinite;
            job.limiter = Some(limiter);
            job.start_time = start_time;
        }
        self.shared.idle_barrier.wait();
    }

    /// 探索を停止し、全ワーカーの終了を待つ
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        let mut guard = self.shared.stop_mutex.lock().expect("stop mutex");
        while self.shared.running.load(Ordering::SeqCst) > 0 {
            guard = self.shared.stop_cv.wait(guard).expect("stop cv");
        }
    }

    fn shutdown_threads(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.shared.quit.store(true, Ordering::Relaxed);
        self.shared.reset_barrier.wait();
        self.shared.idle_barrier.wait();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Searcher {
    fn drop(&mut self) {
        self.stop();
        self.shutdown_threads();
    }
}
