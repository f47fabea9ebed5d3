//! USI応答の整形と出力
//!
//! 探索スレッドからも呼ばれるため、1行ずつロックして書き出しflushする。

use std::io::Write;

use mikazuki_core::search::{SearchInfo, SearchReporter};
use mikazuki_core::types::{Bound, Move, Value};

/// 1行出力してflushする
pub fn send_line(line: &str) {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let _ = writeln!(lock, "{line}");
    let _ = lock.flush();
}

/// `info string …` を出力する
pub fn send_info_string(message: &str) {
    send_line(&format!("info string {message}"));
}

/// スコアのUSI表記（cp または mate）
fn format_score(score: Value, bound: Bound) -> String {
    let mut out = String::from("score ");
    if score.is_mate_score() {
        let plies = score.mate_ply();
        if score.is_win() {
            out.push_str(&format!("mate {plies}"));
        } else {
            out.push_str(&format!("mate -{plies}"));
        }
    } else {
        // 千日手の揺らぎは0に丸めて報告する
        let cp = if score.raw().abs() <= 2 { 0 } else { score.raw() };
        out.push_str(&format!("cp {cp}"));
    }
    match bound {
        Bound::Lower => out.push_str(" lowerbound"),
        Bound::Upper => out.push_str(" upperbound"),
        _ => {}
    }
    out
}

/// `SearchReporter` のUSI実装
pub struct UsiReporter;

impl SearchReporter for UsiReporter {
    fn on_iteration(&self, info: &SearchInfo) {
        let mut line = format!(
            "info depth {} seldepth {} time {} nodes {} nps {} {} hashfull {}",
            info.depth,
            info.seldepth,
            info.time_ms,
            info.nodes,
            info.nps,
            format_score(info.score, info.bound),
            info.hashfull,
        );
        if !info.pv.is_empty() {
            line.push_str(" pv");
            for mv in &info.pv {
                line.push(' ');
                line.push_str(&mv.to_usi());
            }
        }
        send_line(&line);
    }

    fn on_best_move(&self, best: Move) {
        if best.is_none() {
            send_line("bestmove resign");
        } else {
            send_line(&format!("bestmove {}", best.to_usi()));
        }
    }

    fn on_no_legal_moves(&self) {
        send_info_string("no legal moves");
        send_line("bestmove resign");
    }

    fn on_win_declared(&self) {
        send_line("bestmove win");
    }

    fn info_string(&self, message: &str) {
        send_info_string(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score_cp() {
        assert_eq!(format_score(Value::new(123), Bound::Exact), "score cp 123");
        assert_eq!(format_score(Value::new(-80), Bound::Exact), "score cp -80");
        // 引き分けの揺らぎは0に丸める
        assert_eq!(format_score(Value::new(2), Bound::Exact), "score cp 0");
        assert_eq!(format_score(Value::new(-1), Bound::Exact), "score cp 0");
    }

    #[test]
    fn test_format_score_mate() {
        assert_eq!(format_score(Value::mate_in(3), Bound::Exact), "score mate 3");
        assert_eq!(format_score(Value::mated_in(5), Bound::Exact), "score mate -5");
    }

    #[test]
    fn test_format_score_bounds() {
        assert_eq!(
            format_score(Value::new(10), Bound::Lower),
            "score cp 10 lowerbound"
        );
        assert_eq!(
            format_score(Value::new(10), Bound::Upper),
            "score cp 10 upperbound"
        );
    }
}
