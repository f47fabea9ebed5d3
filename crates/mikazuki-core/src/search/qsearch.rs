//! 静止探索 (Quiescence Search)
//!
//! 駒取り（王手中は全応手）だけを展開して局面が静まるまで読む。
//! stand patは補正済み静的評価。深く潜った後は直前の駒取り升への
//! 取り返しに限定して爆発を抑える。

use crate::nnue::NnueUpdates;
use crate::position::{KeyRecord, Position, SennichiteStatus};
use crate::types::{Bound, Depth, Move, Square, Value, MAX_PLY};

use super::alpha_beta::{Worker, NON_PV};
use super::movepicker::{descriptor_of, MovePicker};
use super::types::{draw_score, KillerTable};

/// この深さより潜ったら直前の駒取り升への取り返しのみに限定する
const RECAPTURE_DEPTH: Depth = -4;

/// 見込みの薄い駒取りを足切りするマージン
const FUTILITY_MARGIN: i32 = 200;

/// 千日手の判定回数（alpha_beta側と同じ値）
const SENNICHITE_LIMIT: u32 = 4;

impl Worker {
    /// 静止探索
    ///
    /// `depth` は0以下。王手中は全ての応手を生成する。
    pub(super) fn qsearch<const NT: u8>(
        &mut self,
        pos: &Position,
        depth: Depth,
        ply: i32,
        alpha: Value,
        beta: Value,
    ) -> Value {
        let pv_node = NT != NON_PV;
        let mut alpha = alpha;

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

        if pos.is_entering_kings_win() {
            return Value::mate_in(ply);
        }

        // 置換表（静止探索はdepth 0として読み書きする）
        let tt_entry = self.tt().probe(pos.key(), ply);
        let (tt_hit, tt_data) = match tt_entry {
            Some(data) => (true, data),
            None => (false, crate::tt::TTData::EMPTY),
        };
        let tt_value = if tt_hit { tt_data.value } else { Value::NONE };

        if !pv_node
            && tt_hit
            && tt_data.depth >= 0
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

        // stand pat
        let mut best_value = -Value::INFINITE;
        let mut raw_eval = Value::NONE;
        if !in_check {
            raw_eval = if tt_hit && tt_data.eval != Value::NONE {
                tt_data.eval
            } else {
                self.evaluate(pos)
            };
            best_value = self.correction.correct(pos, raw_eval);

            if best_value >= beta {
                if !tt_hit {
                    self.tt().put(
                        pos.key(),
                        best_value,
                        raw_eval,
                        Move::NONE,
                        0,
                        ply,
                        Bound::Lower,
                    );
                }
                return best_value;
            }
            if best_value > alpha {
                alpha = best_value;
            }
        }

        let stand_pat = best_value;

        // TT手は王手回避以外では駒取りのみ採用する
        let tt_move = if tt_hit
            && tt_data.mv.is_some()
            && pos.pseudo_legal(tt_data.mv)
            && (in_check || pos.is_capture(tt_data.mv))
        {
            tt_data.mv
        } else {
            Move::NONE
        };

        // 取り返し連鎖の先では対象升を固定する
        let recapture_sq: Option<Square> = if !in_check && depth <= RECAPTURE_DEPTH && ply > 0
        {
            let prev = &self.stack[(ply - 1) as usize];
            if prev.current_is_capture {
                prev.current_to
            } else {
                None
            }
        } else {
            None
        };

        let mut picker = if in_check {
            MovePicker::new(pos, tt_move, KillerTable::default())
        } else {
            MovePicker::new_qsearch(pos, tt_move, recapture_sq)
        };

        let us = pos.side_to_move();
        let prev_desc = if ply > 0 {
            self.stack[(ply - 1) as usize].current_desc
        } else {
            None
        };
        let mut best_move = Move::NONE;
        let mut move_count = 0;
        let mut alpha_raised = false;

        loop {
            let mv = picker.next(pos, &self.histories, prev_desc);
            if mv.is_none() {
                break;
            }
            if !pos.is_legal(mv) {
                continue;
            }
            move_count += 1;

            let is_capture = pos.is_capture(mv);

            if !in_check && is_capture && stand_pat != -Value::INFINITE {
                // 見込みの薄い駒取りの足切り
                let victim = crate::eval::piece_value(pos.piece_on(mv.to()).piece_type());
                if stand_pat.raw() + victim + FUTILITY_MARGIN <= alpha.raw() {
                    continue;
                }
                // 明らかに損な取り合いは読まない
                if pos.see(mv) < -100 {
                    continue;
                }
            }

            let child = pos.apply_move(mv);
            self.tt().prefetch(child.key());

            self.key_history.push(KeyRecord {
                key: pos.key(),
                board_key: pos.board_key(),
                hand: pos.hand(us),
            });

            let sennichite =
                child.test_sennichite(false, &self.key_history, SENNICHITE_LIMIT);
            let score = match sennichite {
                SennichiteStatus::Win => {
                    self.key_history.pop();
                    continue;
                }
                SennichiteStatus::Draw => {
                    self.key_history.pop();
                    draw_score(self.nodes)
                }
                SennichiteStatus::None => {
                    let updates = NnueUpdates::for_move(pos, mv, &child);
                    self.nnue.push(self.net, &child, &updates);
                    self.stack[ply as usize].current_desc = Some(descriptor_of(pos, mv));
                    self.stack[ply as usize].current_is_capture = is_capture;
                    self.stack[ply as usize].current_to = Some(mv.to());

                    let score =
                        -self.qsearch::<NT>(&child, depth - 1, ply + 1, -beta, -alpha);

                    self.nnue.pop();
                    self.key_history.pop();
                    score
                }
            };

            if self.abort {
                return Value::ZERO;
            }

            if score > best_value {
                best_value = score;
                if score > alpha {
                    best_move = mv;
                    alpha_raised = true;
                    if score >= beta {
                        break;
                    }
                    alpha = score;
                }
            }
        }

        // 王手されていて応手がなければ詰み
        if in_check && move_count == 0 {
            return Value::mated_in(ply);
        }

        // 応手が全て連続王手の千日手で捨てられた場合も負け扱い
        if best_value == -Value::INFINITE {
            return Value::mated_in(ply);
        }

        let bound = if best_value >= beta {
            Bound::Lower
        } else if alpha_raised && pv_node {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.tt().put(pos.key(), best_value, raw_eval, best_move, 0, ply, bound);

        best_value
    }
}
