//! perftによる指し手生成の検証
//!
//! 平手初期局面の既知のperft値と照合する。深いものは時間がかかるため
//! `--ignored` 指定時のみ実行する（releaseビルド推奨）。

use mikazuki_core::movegen::{generate_all, perft, MoveList};
use mikazuki_core::position::Position;

#[test]
fn perft_startpos_depth3() {
    let pos = Position::startpos();
    assert_eq!(perft(&pos, 1), 30);
    assert_eq!(perft(&pos, 2), 900);
    assert_eq!(perft(&pos, 3), 25_470);
}

#[test]
#[ignore = "slow: run with --release -- --ignored"]
fn perft_startpos_depth4() {
    let pos = Position::startpos();
    assert_eq!(perft(&pos, 4), 719_731);
}

#[test]
#[ignore = "slow: run with --release -- --ignored"]
fn perft_startpos_depth5() {
    let pos = Position::startpos();
    assert_eq!(perft(&pos, 5), 19_861_490);
}

/// 数手進めた局面でも生成・合法判定・キー差分が整合していること
#[test]
fn perft_consistency_along_a_line() {
    let mut pos = Position::startpos();
    let line = ["7g7f", "3c3d", "8h2b+", "3a2b", "B*4e", "5a6b"];

    for usi in line {
        let mv = mikazuki_core::types::Move::from_usi(usi).unwrap();
        assert!(pos.pseudo_legal(mv) && pos.is_legal(mv), "line move {usi}");
        pos = pos.apply_move(mv);

        // キーの差分更新は全計算と一致する
        assert_eq!(pos.key(), pos.compute_keys().0);

        // 生成された手は全て擬似合法で、key_afterはapply_moveと一致する
        let mut list = MoveList::new();
        generate_all(&mut list, &pos);
        assert!(!list.is_empty());
        for ext in list.iter().take(16) {
            assert!(pos.pseudo_legal(ext.mv));
            assert_eq!(pos.key_after(ext.mv), pos.apply_move(ext.mv).key());
        }
    }
}
