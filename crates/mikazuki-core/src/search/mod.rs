//! 探索モジュール
//!
//! - `Searcher`: スレッドプールと置換表を持つ外向きの入口
//! - `SearchReporter`: プロトコル層へ結果を届けるフック
//! - `SearchLimiter`: 時間・ノード数などの停止条件

mod alpha_beta;
mod correction;
mod history;
mod limits;
mod movepicker;
mod qsearch;
mod searcher;
mod types;

pub use correction::CorrectionHistory;
pub use history::{ButterflyHistory, ContinuationHistory, Histories, MoveDescriptor};
pub use limits::{
    CompoundLimiter, MoveTimeLimiter, NodeLimiter, SearchLimiter, SoftNodeLimiter,
    TimeLimits, TimeManager,
};
pub use movepicker::{MovePicker, Stage};
pub use searcher::{RootStatus, Searcher};
pub use types::{KillerTable, PvList, RootMove};

use crate::types::{Bound, Depth, Move, Value};

/// 1イテレーションぶんの探索情報
#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub depth: Depth,
    pub seldepth: i32,
    pub time_ms: u64,
    pub nodes: u64,
    pub nps: u64,
    /// ルート基準のスコア
    pub score: Value,
    /// aspirationの途中経過では Lower/Upper になる
    pub bound: Bound,
    /// 置換表の使用率（千分率）
    pub hashfull: u32,
    pub pv: Vec<Move>,
}

/// 探索結果をプロトコル層へ届けるフック
///
/// 方言ごとの応答（resignやwinの表記など）はプロトコル側が決める。
pub trait SearchReporter: Send + Sync {
    /// イテレーション完了・aspiration再探索の途中経過
    fn on_iteration(&self, info: &SearchInfo);

    /// 最終的な最善手
    fn on_best_move(&self, best: Move);

    /// 合法手がない（USIではbestmove resign）
    fn on_no_legal_moves(&self);

    /// 入玉宣言勝ち（USIではbestmove win）
    fn on_win_declared(&self);

    /// 診断メッセージ
    fn info_string(&self, message: &str);
}
