//! Alpha-Beta探索の実装
//!
//! 反復深化 + aspiration window を外側に、PVS・LMR・null move・
//! singular extension・SEE/futility/LMPの枝刈りを備えた
//! fail-softのnegamax。ノード種別はconst genericで渡す。
//!
//! ワーカーはスレッドごとに独立した状態（ヒストリ・補正・スタック・
//! アキュムレータ）を持ち、共有するのは置換表と停止フラグだけ。

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bitboard::king_attacks;
use crate::nnue::{AccumulatorStack, Network, NnueUpdates};
use crate::position::{KeyRecord, Position, SennichiteStatus};
use crate::tt::TranspositionTable;
use crate::types::{Bound, Depth, Move, Value, MAX_PLY, STACK_SIZE};

use super::correction::CorrectionHistory;
use super::history::{stat_bonus, Histories, MoveDescriptor};
use super::limits::SearchLimiter;
use super::movepicker::{descriptor_of, MovePicker};
use super::searcher::SearchShared;
use super::types::{
    base_reduction, draw_score, lmp_threshold, NodeType, RootMove, StackEntry,
};
use super::SearchInfo;

pub(super) const NON_PV: u8 = NodeType::NonPV as u8;
pub(super) const PV: u8 = NodeType::PV as u8;
pub(super) const ROOT: u8 = NodeType::Root as u8;

/// 千日手の判定回数（同一局面がこの回数現れたら成立）
const SENNICHITE_LIMIT: u32 = 4;

/// 探索ワーカー
///
/// スレッドプールに1つずつ常駐し、探索サイクルのたびに再利用される。
/// ヒストリと補正はゲームをまたいで保持し、usinewgameでクリアする。
pub(super) struct Worker {
    pub(super) shared: Arc<SearchShared>,
    thread_id: usize,
    pub(super) net: &'static Network,

    pub(super) histories: Histories,
    pub(super) correction: CorrectionHistory,
    pub(super) stack: Vec<StackEntry>,
    pub(super) nnue: AccumulatorStack,
    clear_epoch_seen: u64,

    // 探索ごとの状態
    root_pos: Position,
    pub(super) key_history: Vec<KeyRecord>,
    pub(super) root_moves: Vec<RootMove>,
    limiter: Option<Box<dyn SearchLimiter>>,
    max_depth: Depth,
    infinite: bool,
    start_time: Instant,
    pub(super) nodes: u64,
    pub(super) sel_depth: i32,
    root_depth: Depth,
    pub(super) completed_depth: Depth,
    pub(super) last_score: Value,
    pub(super) last_pv: Vec<Move>,
    calls_cnt: i32,
    pub(super) abort: bool,
}

impl Worker {
    pub(super) fn new(
        shared: Arc<SearchShared>,
        net: &'static Network,
        thread_id: usize,
    ) -> Worker {
        Worker {
            shared,
            thread_id,
            net,
            histories: Histories::new(),
            correction: CorrectionHistory::new(),
            stack: vec![StackEntry::new(); STACK_SIZE],
            nnue: AccumulatorStack::new(),
            clear_epoch_seen: 0,
            root_pos: Position::startpos(),
            key_history: Vec::with_capacity(1024),
            root_moves: Vec::new(),
            limiter: None,
            max_depth: 1,
            infinite: false,
            start_time: Instant::now(),
            nodes: 0,
            sel_depth: 0,
            root_depth: 0,
            completed_depth: 0,
            last_score: Value::NONE,
            last_pv: Vec::new(),
            calls_cnt: 0,
            abort: false,
        }
    }

    #[inline]
    fn is_main(&self) -> bool {
        self.thread_id == 0
    }

    #[inline]
    pub(super) fn tt(&self) -> &TranspositionTable {
        &self.shared.tt
    }

    /// 自スレッドのノード数を共有カウンタへ反映する
    fn publish_nodes(&self) {
        self.shared.node_counters[self.thread_id].store(self.nodes, Ordering::Relaxed);
    }

    fn total_nodes(&self) -> u64 {
        self.shared
            .node_counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// 中断チェック（512回に1回だけ実際の判定を行う）
    pub(super) fn check_abort(&mut self) -> bool {
        if self.abort {
            return true;
        }
        self.calls_cnt -= 1;
        if self.calls_cnt > 0 {
            return false;
        }
        self.calls_cnt = 512;
        self.publish_nodes();

        if self.shared.stop.load(Ordering::Relaxed) {
            self.abort = true;
            return true;
        }
        if self.is_main() && self.root_depth > 1 {
            let total = self.total_nodes();
            if let Some(limiter) = self.limiter.as_mut() {
                if limiter.stop_hard(total) {
                    self.shared.stop.store(true, Ordering::Relaxed);
                    self.abort = true;
                    return true;
                }
            }
        }
        false
    }

    /// 探索サイクル1回ぶんの実行（idleバリア通過後に呼ばれる）
    pub(super) fn run_search(&mut self) {
        // ジョブの取り込み（barrier越しに設定済み）
        {
            let mut job = self.shared.job.lock().expect("job mutex");
            self.root_pos = job.pos.clone();
            self.key_history.clear();
            self.key_history.extend_from_slice(&job.key_history);
            self.root_moves = job.root_moves.iter().map(|&m| RootMove::new(m)).collect();
            self.max_depth = job.max_depth;
            self.infinite = job.infinite;
            self.start_time = job.start_time;
            if self.is_main() {
                self.limiter = job.limiter.take();
            }
        }

        // usinewgame後の最初の探索でヒストリをクリア
        let epoch = self.shared.clear_epoch.load(Ordering::Relaxed);
        if epoch != self.clear_epoch_seen {
            self.clear_epoch_seen = epoch;
            self.histories.clear();
            self.correction.clear();
        }

        self.nodes = 0;
        self.sel_depth = 0;
        self.completed_depth = 0;
        self.last_score = Value::NONE;
        self.last_pv.clear();
        self.calls_cnt = 0;
        self.abort = false;
        self.publish_nodes();
        for entry in self.stack.iter_mut() {
            *entry = StackEntry::new();
        }
        self.nnue.reset_root(self.net, &self.root_pos.clone());

        self.iterative_deepening();

        if self.is_main() {
            // go infinite では stop を受け取るまで bestmove を保留する
            while self.infinite && !self.shared.stop.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(1));
            }
            self.shared.stop.store(true, Ordering::Relaxed);
            self.publish_nodes();
            self.depart();
            self.shared.end_barrier.wait();

            // 全ワーカー終了後にのみ結果を公表する
            self.report(Bound::Exact);
            let best = self.root_moves.first().map(|rm| rm.mv).unwrap_or(Move::NONE);
            self.shared.reporter.on_best_move(best);
            self.limiter = None;
            self.shared.searching.store(false, Ordering::Release);
        } else {
            self.publish_nodes();
            self.depart();
            self.shared.end_barrier.wait();
        }
    }

    /// runningカウンタを減らし、stop()で待つスレッドを起こす
    fn depart(&self) {
        let _guard = self.shared.stop_mutex.lock().expect("stop mutex");
        self.shared.running.fetch_sub(1, Ordering::SeqCst);
        self.shared.stop_cv.notify_all();
    }

    /// 反復深化
    fn iterative_deepening(&mut self) {
        let max_depth = self.max_depth.clamp(1, MAX_PLY - 1);

        for depth in 1..=max_depth {
            self.root_depth = depth;
            self.sel_depth = 0;

            // Aspiration window
            let mut delta = 20i32;
            let (mut alpha, mut beta) =
                if depth >= 3 && self.last_score != Value::NONE {
                    (
                        Value::new(
                            (self.last_score.raw() - delta).max(-Value::INFINITE.raw()),
                        ),
                        Value::new(
                            (self.last_score.raw() + delta).min(Value::INFINITE.raw()),
                        ),
                    )
                } else {
                    (-Value::INFINITE, Value::INFINITE)
                };

            let mut score;
            loop {
                // 今回の探索で実際に評価された手だけが上位に来るようにする
                for rm in self.root_moves.iter_mut() {
                    rm.prev_score = rm.score;
                    rm.score = -Value::INFINITE;
                }
                let pos = self.root_pos.clone();
                score = self.search::<ROOT>(&pos, depth, 0, alpha, beta);

                if self.abort {
                    break;
                }

                if score <= alpha {
                    // fail low: 下側を倍々で広げる
                    if self.is_main() && self.start_time.elapsed() > Duration::from_secs(3) {
                        self.report_score(score, Bound::Upper);
                    }
                    alpha = Value::new(
                        score.raw().saturating_sub(delta).max(-Value::INFINITE.raw()),
                    );
                } else if score >= beta {
                    if self.is_main() && self.start_time.elapsed() > Duration::from_secs(3) {
                        self.report_score(score, Bound::Lower);
                    }
                    beta = Value::new(
                        score.raw().saturating_add(delta).min(Value::INFINITE.raw()),
                    );
                } else {
                    break;
                }
                delta = delta.saturating_mul(2).min(Value::INFINITE.raw());
            }

            // 最善手を先頭へ（スコア降順の安定ソート）
            self.root_moves.sort_by(|a, b| b.score.cmp(&a.score));

            if self.abort {
                break;
            }

            self.completed_depth = depth;
            self.last_score = score;
            self.last_pv = self.root_moves[0].pv.clone();
            self.publish_nodes();

            if self.is_main() {
                self.report(Bound::Exact);
                let best = self.root_moves[0].mv;
                let total = self.total_nodes();
                if let Some(limiter) = self.limiter.as_mut() {
                    limiter.update(depth, best);
                    if !self.infinite && limiter.stop_soft(total) {
                        break;
                    }
                }
            }
        }
    }

    // =========================================================================
    // 通常探索
    // =========================================================================

    fn search<const NT: u8>(
        &mut self,
        pos: &Position,
        depth: Depth,
        ply: i32,
        alpha: Value,
        beta: Value,
    ) -> Value {
        let pv_node = NT != NON_PV;
        let root_node = NT == ROOT;
        let mut depth = depth;
        let mut alpha = alpha;
        let mut beta = beta;

        if depth <= 0 {
            // 静止探索はPVを伸ばさないので、親が古い残骸を繋がないようにする
            if pv_node {
                self.stack[ply as usize].pv.clear();
            }
            return self.qsearch::<NT>(pos, 0, ply, alpha, beta);
        }

        self.nodes += 1;
        let in_check = pos.in_check();

        if ply >= MAX_PLY {
            return if in_check { Value::ZERO } else { self.evaluate(pos) };
        }

        if pv_node && self.sel_depth < ply + 1 {
            self.sel_depth = ply + 1;
        }

        if self.check_abort() {
            return Value::ZERO;
        }

        // 入玉宣言勝ち
        if !root_node && pos.is_entering_kings_win() {
            return Value::mate_in(ply);
        }

        // Mate distance pruning
        if !root_node {
            alpha = alpha.max(Value::mated_in(ply));
            beta = beta.min(Value::mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        let excluded = self.stack[ply as usize].excluded_move;

        // 置換表
        let tt_entry = self.tt().probe(pos.key(), ply);
        let (tt_hit, tt_data) = match tt_entry {
            Some(data) => (true, data),
            None => (false, crate::tt::TTData::EMPTY),
        };
        let tt_move = if tt_hit && tt_data.mv.is_some() && pos.pseudo_legal(tt_data.mv) {
            tt_data.mv
        } else {
            Move::NONE
        };
        let tt_value = if tt_hit { tt_data.value } else { Value::NONE };

        // 非PVノードのTTカットオフ
        if !pv_node
            && excluded.is_none()
            && tt_hit
            && tt_data.depth >= depth
            && tt_value != Value::NONE
            && match tt_data.bound {
                Bound::Exact => true,
                Bound::Lower => tt_value >= beta,
                Bound::Upper => tt_value <= alpha,
                Bound::None => false,
            }
        {
            return tt_value;
        }

        // Internal iterative reduction
        if depth >= 3 && tt_move.is_none() {
            depth -= 1;
        }

        // 静的評価と補正
        let (raw_eval, corrected_eval) = if in_check {
            (Value::NONE, Value::NONE)
        } else {
            let raw = if tt_hit && tt_data.eval != Value::NONE {
                tt_data.eval
            } else {
                self.evaluate(pos)
            };
            (raw, self.correction.correct(pos, raw))
        };
        self.stack[ply as usize].raw_eval = raw_eval;
        self.stack[ply as usize].static_eval = corrected_eval;

        // improving: 2手前（なければ4手前）の静的評価との比較
        let improving = !in_check && {
            let prev = if ply >= 2
                && self.stack[(ply - 2) as usize].static_eval != Value::NONE
            {
                self.stack[(ply - 2) as usize].static_eval
            } else if ply >= 4 {
                self.stack[(ply - 4) as usize].static_eval
            } else {
                Value::NONE
            };
            prev != Value::NONE && corrected_eval > prev
        };

        // PVのクリア
        if pv_node {
            self.stack[ply as usize].pv.clear();
            self.stack[(ply + 1) as usize].pv.clear();
        }
        // 2つ先のキラーは子の世代のためにクリア
        self.stack[(ply + 2) as usize].killers.clear();

        let prev_desc = if ply > 0 {
            self.stack[(ply - 1) as usize].current_desc
        } else {
            None
        };

        // =====================================================================
        // 非PVの枝刈り
        // =====================================================================
        if !pv_node && !in_check && excluded.is_none() {
            // Reverse futility pruning
            if depth <= 4
                && corrected_eval != Value::NONE
                && corrected_eval.raw() - 80 * (depth - improving as i32) >= beta.raw()
                && !corrected_eval.is_mate_score()
            {
                return corrected_eval;
            }

            // Razoring
            if depth <= 4
                && corrected_eval != Value::NONE
                && corrected_eval.raw() + 300 * depth <= alpha.raw()
            {
                let v = self.qsearch::<NON_PV>(
                    pos,
                    0,
                    ply,
                    Value::new(alpha.raw() - 1),
                    alpha,
                );
                if v <= alpha {
                    return v;
                }
            }

            // Null move pruning
            if depth >= 4
                && corrected_eval != Value::NONE
                && corrected_eval >= beta
                && prev_desc.is_some()
            {
                let r = 3 + depth / 5;
                let child = pos.apply_null_move();
                self.stack[ply as usize].current_desc = None;
                self.stack[ply as usize].current_is_capture = false;
                self.stack[ply as usize].current_to = None;

                let null_value = -self.search::<NON_PV>(
                    &child,
                    depth - r,
                    ply + 1,
                    -beta,
                    Value::new(-beta.raw() + 1),
                );

                if self.abort {
                    return Value::ZERO;
                }
                if null_value >= beta {
                    // 勝ちスコアはそのまま返さない
                    return null_value.min(Value::new(Value::MATE_IN_MAX_PLY.raw() - 1));
                }
            }
        }

        // =====================================================================
        // 指し手ループ
        // =====================================================================
        let us = pos.side_to_move();
        let mut best_value = -Value::INFINITE;
        let mut best_move = Move::NONE;
        let mut move_count = 0i32;
        let mut alpha_raised = false;
        // 試した静かな手（ヒストリのペナルティ用、割り当てなしの固定配列）
        let dummy_desc = MoveDescriptor {
            pt: crate::types::PieceType::Pawn,
            to: crate::types::Square::SQ_11,
        };
        let mut quiets_tried = [(false, dummy_desc); 32];
        let mut quiets_len = 0usize;

        let killers = self.stack[ply as usize].killers;
        let mut picker = MovePicker::new(pos, tt_move, killers);

        loop {
            let mv = picker.next(pos, &self.histories, prev_desc);
            if mv.is_none() {
                break;
            }
            if mv == excluded {
                continue;
            }
            if root_node && !self.root_moves.iter().any(|rm| rm.mv == mv) {
                continue;
            }
            if !pos.is_legal(mv) {
                continue;
            }

            move_count += 1;
            let is_capture = pos.is_capture(mv);
            let desc = descriptor_of(pos, mv);

            // LMR用の基本縮小量（枝刈りのlmr_depth計算と共用）
            let r_base = base_reduction(depth, move_count);
            let lmr_depth = (depth - 1 - r_base).max(0);

            // -----------------------------------------------------------------
            // 浅い枝刈り（詰みを見つけていない非ルートのみ）
            // -----------------------------------------------------------------
            if !root_node && best_value > Value::MATED_IN_MAX_PLY {
                // Late move pruning
                if move_count >= lmp_threshold(depth, improving) {
                    picker.skip_non_captures();
                    if !is_capture {
                        continue;
                    }
                }

                // SEE pruning
                let see_threshold = if is_capture {
                    -100 * depth * depth
                } else {
                    -20 * depth * depth
                };
                if pos.see(mv) < see_threshold {
                    continue;
                }

                // Futility pruning（静かな手のみ）
                if !is_capture
                    && !in_check
                    && lmr_depth <= 6
                    && corrected_eval != Value::NONE
                    && corrected_eval.raw() + 150 + 100 * lmr_depth <= alpha.raw()
                {
                    continue;
                }
            }

            // -----------------------------------------------------------------
            // Singular extension
            // -----------------------------------------------------------------
            let mut extension = 0i32;
            if !root_node
                && mv == tt_move
                && excluded.is_none()
                && depth >= 7
                && tt_value != Value::NONE
                && !tt_value.is_mate_score()
                && tt_data.bound.is_lower_or_exact()
                && tt_data.depth >= depth - 3
                && ply < 2 * self.root_depth
            {
                let s_beta = Value::new(tt_value.raw() - depth * 4 / 3);
                let s_depth = (depth - 1) / 2;

                self.stack[ply as usize].excluded_move = mv;
                let s_value = self.search::<NON_PV>(
                    pos,
                    s_depth,
                    ply,
                    Value::new(s_beta.raw() - 1),
                    s_beta,
                );
                self.stack[ply as usize].excluded_move = Move::NONE;

                if self.abort {
                    return Value::ZERO;
                }
                if s_value < s_beta {
                    extension = 1;
                }
            }

            let child = pos.apply_move(mv);
            let gives_check = child.in_check();
            if gives_check {
                extension = extension.max(1);
            }

            // 子ノードの置換表をプリフェッチ
            self.tt().prefetch(child.key());

            // 手を進める
            self.key_history.push(KeyRecord {
                key: pos.key(),
                board_key: pos.board_key(),
                hand: pos.hand(us),
            });

            let sennichite = child.test_sennichite(false, &self.key_history, SENNICHITE_LIMIT);

            let score = match sennichite {
                SennichiteStatus::Win => {
                    // 連続王手の千日手: 指した側の反則負けなのでこの手は捨てる
                    self.key_history.pop();
                    continue;
                }
                SennichiteStatus::Draw => {
                    self.key_history.pop();
                    // 再帰しないのでこの手のPVは1手で終わり
                    self.stack[(ply + 1) as usize].pv.clear();
                    draw_score(self.nodes)
                }
                SennichiteStatus::None => {
                    let updates = NnueUpdates::for_move(pos, mv, &child);
                    self.nnue.push(self.net, &child, &updates);
                    self.stack[ply as usize].current_desc = Some(desc);
                    self.stack[ply as usize].current_is_capture = is_capture;
                    self.stack[ply as usize].current_to = Some(mv.to());

                    let new_depth = depth - 1 + extension;
                    let score = self.search_child::<NT>(
                        &child, new_depth, ply, alpha, beta, move_count, is_capture,
                        in_check, improving, pv_node, mv,
                    );

                    self.nnue.pop();
                    self.key_history.pop();
                    score
                }
            };

            if self.abort {
                return Value::ZERO;
            }

            if !is_capture && quiets_len < quiets_tried.len() {
                quiets_tried[quiets_len] = (mv.is_drop(), desc);
                quiets_len += 1;
            }

            // ルートの指し手スコアを更新
            if root_node {
                let rm = self
                    .root_moves
                    .iter_mut()
                    .find(|rm| rm.mv == mv)
                    .expect("root move must exist");
                if move_count == 1 || score > alpha {
                    rm.score = score;
                    let mut pv = vec![mv];
                    pv.extend(self.stack[1].pv.as_vec());
                    rm.pv = pv;
                } else {
                    // α未更新の手は順序維持のため最低スコアへ
                    rm.score = -Value::INFINITE;
                }
            }

            if score > best_value {
                best_value = score;
                if score > alpha {
                    best_move = mv;
                    alpha_raised = true;

                    if pv_node && !root_node {
                        let (lower, upper) = self.stack.split_at_mut((ply + 1) as usize);
                        lower[ply as usize].pv.update(mv, &upper[0].pv);
                    }

                    if score >= beta {
                        break;
                    }
                    alpha = score;
                }
            }
        }

        // 合法手がなければ詰み（将棋はステイルメイトも負け）
        if move_count == 0 {
            return if excluded.is_some() {
                alpha
            } else {
                debug_assert!(!root_node);
                Value::mated_in(ply)
            };
        }

        // 全ての手が連続王手の千日手で捨てられた場合も負け扱い
        if best_value == -Value::INFINITE {
            best_value = Value::mated_in(ply);
        }

        let bound = if best_value >= beta {
            Bound::Lower
        } else if alpha_raised && pv_node {
            Bound::Exact
        } else {
            Bound::Upper
        };

        // 静かな手でのカットはキラーとヒストリを更新
        if bound == Bound::Lower && best_move.is_some() && !pos.is_capture(best_move) {
            self.stack[ply as usize].killers.push(best_move);
            let bonus = stat_bonus(depth);
            let best_desc = descriptor_of(pos, best_move);
            self.histories.butterfly.update(
                us,
                best_move.is_drop(),
                best_desc.pt,
                best_desc.to,
                bonus,
            );
            if let Some(prev) = prev_desc {
                self.histories.continuation.update(prev, best_desc, bonus);
            }
            for &(is_drop, d) in &quiets_tried[..quiets_len] {
                if d == best_desc && is_drop == best_move.is_drop() {
                    continue;
                }
                self.histories.butterfly.update(us, is_drop, d.pt, d.to, -bonus);
                if let Some(prev) = prev_desc {
                    self.histories.continuation.update(prev, d, -bonus);
                }
            }
        }

        // 補正ヒストリの更新（王手中・除外探索・詰みスコア・矛盾した境界は除く)
        if !in_check
            && excluded.is_none()
            && raw_eval != Value::NONE
            && !best_value.is_mate_score()
            && !(bound == Bound::Lower && best_value <= raw_eval)
            && !(bound == Bound::Upper && best_value >= raw_eval)
        {
            self.correction.update(pos, depth, best_value, raw_eval);
        }

        if excluded.is_none() {
            self.tt().put(
                pos.key(),
                best_value,
                raw_eval,
                best_move,
                depth,
                ply,
                bound,
            );
        }

        best_value
    }

    /// 子ノードの探索（LMR + PVS）
    #[allow(clippy::too_many_arguments)]
    fn search_child<const NT: u8>(
        &mut self,
        child: &Position,
        new_depth: Depth,
        ply: i32,
        alpha: Value,
        beta: Value,
        move_count: i32,
        is_capture: bool,
        in_check: bool,
        improving: bool,
        pv_node: bool,
        mv: Move,
    ) -> Value {
        // 1手目はそのままの窓で探索（PV/Rootの1手目はPVノードになる）
        if move_count == 1 {
            return if NT == NON_PV {
                -self.search::<NON_PV>(child, new_depth, ply + 1, -beta, -alpha)
            } else {
                -self.search::<PV>(child, new_depth, ply + 1, -beta, -alpha)
            };
        }

        let zero_alpha = Value::new(-alpha.raw() - 1);

        // Late move reductions（閾値を超えた静かな手のみ）
        let lmr_applicable =
            !is_capture && new_depth >= 2 && move_count > 1 + 2 * pv_node as i32;

        let mut score;
        if lmr_applicable {
            let mut r = base_reduction(new_depth, move_count);
            r -= pv_node as i32;
            r -= in_check as i32;
            r -= self.drop_near_king(child, mv) as i32;
            r += !improving as i32;
            let r = r.clamp(0, new_depth - 1);

            score = -self.search::<NON_PV>(
                child,
                new_depth - r,
                ply + 1,
                zero_alpha,
                -alpha,
            );

            // 縮小探索でαを超えたら縮小なしのゼロ窓で再探索
            if score > alpha && r > 0 {
                score = -self.search::<NON_PV>(
                    child,
                    new_depth,
                    ply + 1,
                    zero_alpha,
                    -alpha,
                );
            }
        } else {
            score = -self.search::<NON_PV>(
                child,
                new_depth,
                ply + 1,
                zero_alpha,
                -alpha,
            );
        }

        // PVノードではαβの全窓で再探索
        if pv_node && score > alpha && score < beta && !self.abort {
            score = -self.search::<PV>(child, new_depth, ply + 1, -beta, -alpha);
        }

        score
    }

    /// 玉の近傍への駒打ちか（LMRを緩める）
    fn drop_near_king(&self, pos: &Position, mv: Move) -> bool {
        if !mv.is_drop() {
            return false;
        }
        let to = mv.to();
        king_attacks(pos.king_square(crate::types::Color::Black)).test(to)
            || king_attacks(pos.king_square(crate::types::Color::White)).test(to)
    }

    /// NNUEによる静的評価（手番視点、詰みスコア領域にはクランプ）
    pub(super) fn evaluate(&self, pos: &Position) -> Value {
        Value::clamp_eval(self.net.forward(self.nnue.top(), pos.side_to_move()))
    }

    // =========================================================================
    // 報告
    // =========================================================================

    fn make_info(&self, score: Value, bound: Bound) -> SearchInfo {
        let time_ms = self.start_time.elapsed().as_millis() as u64;
        let nodes = self.total_nodes();
        let nps = if time_ms > 0 { nodes * 1000 / time_ms } else { 0 };
        SearchInfo {
            depth: self.root_depth,
            seldepth: self.sel_depth,
            time_ms,
            nodes,
            nps,
            score,
            bound,
            hashfull: self.tt().hashfull(),
            pv: self.last_pv.clone(),
        }
    }

    fn report(&self, bound: Bound) {
        if self.last_score == Value::NONE {
            return;
        }
        let mut info = self.make_info(self.last_score, bound);
        info.depth = self.completed_depth.max(1);
        self.shared.reporter.on_iteration(&info);
    }

    /// aspiration再探索が長引いたときの途中経過
    fn report_score(&self, score: Value, bound: Bound) {
        let mut info = self.make_info(score, bound);
        info.pv = self
            .root_moves
            .first()
            .map(|rm| rm.pv.clone())
            .unwrap_or_default();
        self.shared.reporter.on_iteration(&info);
    }
}
