//! アキュムレータと差分更新
//!
//! 視点（先手・後手）ごとにL1次元のi16ベクトルを保持し、指し手ごとに
//! 高々2つの加算・2つの減算で子局面のベクトルを得る。自玉のバケツが
//! 変わった視点だけは盤面全体から再計算する。
//! スタックは1ワーカーが専有し、pushで子を作りpopで捨てる。

use super::{
    hand_feature_index, king_bucket, psqt_feature_index, Network, L1,
};
use crate::position::Position;
use crate::types::{Color, Move, Piece, PieceType, MAX_PLY};

/// 視点ごとの特徴量ベクトル
#[derive(Clone)]
pub struct Accumulator {
    vals: [[i16; L1]; 2],
}

impl Accumulator {
    pub fn new() -> Accumulator {
        Accumulator {
            vals: [[0; L1]; 2],
        }
    }

    #[inline]
    pub fn perspective(&self, c: Color) -> &[i16; L1] {
        &self.vals[c.index()]
    }

    /// 視点`persp`のベクトルを盤面全体から再計算する
    pub fn reset(&mut self, net: &Network, pos: &Position, persp: Color) {
        let bucket = king_bucket(persp, pos.king_square(persp));
        self.vals[persp.index()] = *net.ft_biases();

        for sq in pos.occupancy() {
            let pc = pos.piece_on(sq);
            self.activate(net, persp, psqt_feature_index(persp, bucket, pc, sq));
        }

        for c in [Color::Black, Color::White] {
            let hand = pos.hand(c);
            if hand.is_empty() {
                continue;
            }
            for pt in PieceType::HAND_PIECES {
                let count = hand.count(pt);
                for n in 0..count {
                    self.activate(net, persp, hand_feature_index(persp, bucket, c, pt, n));
                }
            }
        }
    }

    #[inline]
    fn activate(&mut self, net: &Network, persp: Color, feature: usize) {
        let row = net.ft_row(feature);
        let acc = &mut self.vals[persp.index()];
        for i in 0..L1 {
            acc[i] += row[i];
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// 指し手1手ぶんの特徴量差分
///
/// 視点ごとに高々2加算・2減算。自玉のバケツが変わった視点は
/// `refresh` が立ち、差分の代わりに全再計算を要求する。
pub struct NnueUpdates {
    /// [スロット][視点] の特徴量インデックス
    adds: [[usize; 2]; 2],
    subs: [[usize; 2]; 2],
    n_adds: usize,
    n_subs: usize,
    refresh: [bool; 2],
}

impl NnueUpdates {
    /// 親局面・指し手・子局面から差分を構築する
    pub fn for_move(parent: &Position, mv: Move, child: &Position) -> NnueUpdates {
        let us = parent.side_to_move();
        let mut u = NnueUpdates {
            adds: [[0; 2]; 2],
            subs: [[0; 2]; 2],
            n_adds: 0,
            n_subs: 0,
            refresh: [false; 2],
        };

        // 自玉のバケツが変わった視点は再計算
        for persp in [Color::Black, Color::White] {
            let before = king_bucket(persp, parent.king_square(persp));
            let after = king_bucket(persp, child.king_square(persp));
            if before != after {
                u.refresh[persp.index()] = true;
            }
        }

        // 差分は子局面のバケツで表す（refreshしない視点ではバケツ不変）
        let buckets = [
            king_bucket(Color::Black, child.king_square(Color::Black)),
            king_bucket(Color::White, child.king_square(Color::White)),
        ];

        if mv.is_drop() {
            let pt = mv.drop_piece_type();
            let pc = Piece::new(us, pt);
            let new_count = child.hand(us).count(pt);
            u.push_add(buckets, |persp, bucket| {
                psqt_feature_index(persp, bucket, pc, mv.to())
            });
            // 打った駒ぶんの手駒スロットが消える
            u.push_sub(buckets, |persp, bucket| {
                hand_feature_index(persp, bucket, us, pt, new_count)
            });
        } else {
            let from = mv.from();
            let to = mv.to();
            let pc = parent.piece_on(from);
            let captured = parent.piece_on(to);
            let placed = if mv.is_promote() {
                Piece::new(us, pc.piece_type().promote().expect("promotable piece"))
            } else {
                pc
            };

            u.push_sub(buckets, |persp, bucket| psqt_feature_index(persp, bucket, pc, from));
            u.push_add(buckets, |persp, bucket| psqt_feature_index(persp, bucket, placed, to));

            if captured.is_some() {
                let upt = captured.piece_type().unpromote();
                let new_count = child.hand(us).count(upt);
                u.push_sub(buckets, |persp, bucket| {
                    psqt_feature_index(persp, bucket, captured, to)
                });
                u.push_add(buckets, |persp, bucket| {
                    hand_feature_index(persp, bucket, us, upt, new_count - 1)
                });
            }
        }

        u
    }

    fn push_add(&mut self, buckets: [usize; 2], f: impl Fn(Color, usize) -> usize) {
        self.adds[self.n_adds] = [f(Color::Black, buckets[0]), f(Color::White, buckets[1])];
        self.n_adds += 1;
    }

    fn push_sub(&mut self, buckets: [usize; 2], f: impl Fn(Color, usize) -> usize) {
        self.subs[self.n_subs] = [f(Color::Black, buckets[0]), f(Color::White, buckets[1])];
        self.n_subs += 1;
    }
}

/// ワーカーごとのアキュムレータスタック
pub struct AccumulatorStack {
    stack: Vec<Accumulator>,
    top: usize,
}

impl AccumulatorStack {
    pub fn new() -> AccumulatorStack {
        AccumulatorStack {
            stack: vec![Accumulator::new(); MAX_PLY as usize + 2],
            top: 0,
        }
    }

    /// ルート局面で初期化する
    pub fn reset_root(&mut self, net: &Network, pos: &Position) {
        self.top = 0;
        self.stack[0].reset(net, pos, Color::Black);
        self.stack[0].reset(net, pos, Color::White);
    }

    /// 子局面のアキュムレータを積む
    pub fn push(&mut self, net: &Network, child: &Position, updates: &NnueUpdates) {
        debug_assert!(self.top + 1 < self.stack.len());
        let (lower, upper) = self.stack.split_at_mut(self.top + 1);
        let parent = &lower[self.top];
        let curr = &mut upper[0];
        self.top += 1;

        for persp in [Color::Black, Color::White] {
            if updates.refresh[persp.index()] {
                curr.reset(net, child, persp);
                continue;
            }
            let src = &parent.vals[persp.index()];
            let dst = &mut curr.vals[persp.index()];
            *dst = *src;
            for a in 0..updates.n_adds {
                let row = net.ft_row(updates.adds[a][persp.index()]);
                for i in 0..L1 {
                    dst[i] += row[i];
                }
            }
            for s in 0..updates.n_subs {
                let row = net.ft_row(updates.subs[s][persp.index()]);
                for i in 0..L1 {
                    dst[i] -= row[i];
                }
            }
        }
    }

    /// 直近のpushを捨てる
    #[inline]
    pub fn pop(&mut self) {
        debug_assert!(self.top > 0);
        self.top -= 1;
    }

    #[inline]
    pub fn top(&self) -> &Accumulator {
        &self.stack[self.top]
    }
}

impl Default for AccumulatorStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::network::test_support::deterministic_network;
    use super::*;

    fn accs_equal(a: &Accumulator, b: &Accumulator) -> bool {
        a.vals == b.vals
    }

    /// 差分更新が全再計算とビット一致すること
    #[test]
    fn test_incremental_matches_fresh() {
        let net = deterministic_network(0xDEADBEEF);
        let mut pos = Position::startpos();
        let mut stack = AccumulatorStack::new();
        stack.reset_root(&net, &pos);

        // 捕獲・成り・駒打ち・玉移動（バケツ替わり）を含む手順
        let moves = ["7g7f", "3c3d", "8h2b+", "3a2b", "B*4e", "5a6b", "5i6h"];
        for usi in moves {
            let mv = Move::from_usi(usi).unwrap();
            assert!(pos.pseudo_legal(mv), "bad test move: {usi}");
            let child = pos.apply_move(mv);
            let updates = NnueUpdates::for_move(&pos, mv, &child);
            stack.push(&net, &child, &updates);

            let mut fresh = Accumulator::new();
            fresh.reset(&net, &child, Color::Black);
            fresh.reset(&net, &child, Color::White);
            assert!(
                accs_equal(stack.top(), &fresh),
                "incremental accumulator diverged after {usi}"
            );
            pos = child;
        }
    }

    /// push→popで元のアキュムレータにビット一致で戻ること
    #[test]
    fn test_push_pop_round_trip() {
        let net = deterministic_network(0x12345678);
        let pos = Position::startpos();
        let mut stack = AccumulatorStack::new();
        stack.reset_root(&net, &pos);
        let before = stack.top().clone();

        let mv = Move::from_usi("2g2f").unwrap();
        let child = pos.apply_move(mv);
        let updates = NnueUpdates::for_move(&pos, mv, &child);
        stack.push(&net, &child, &updates);
        stack.pop();

        assert!(accs_equal(stack.top(), &before));
    }

    /// 評価値は視点対称（盤面と手番を反転しても同じ値）
    #[test]
    fn test_evaluate_is_side_symmetric() {
        use crate::types::{Piece, PieceType, Square};

        let net = deterministic_network(0xABCDEF);
        let pos = Position::from_sfen(
            "l+R6l/5k3/4gp1p1/p1p4np/5P3/P1P3P1P/1P1P1GN2/6SK1/LN2s2+rL w BG2SN5Pbg2p 45",
        )
        .unwrap();

        // 180度回転 + 先後反転した局面を作る
        let mut flipped = Position::empty();
        for sq in Square::all() {
            let pc = pos.piece_on(sq);
            if pc.is_some() {
                flipped.set_board_piece(
                    Piece::new(!pc.color(), pc.piece_type()),
                    sq.inverse(),
                );
            }
        }
        for pt in PieceType::HAND_PIECES {
            flipped.set_hand_count(Color::Black, pt, pos.hand(Color::White).count(pt));
            flipped.set_hand_count(Color::White, pt, pos.hand(Color::Black).count(pt));
        }
        flipped.set_side_to_move(!pos.side_to_move());
        flipped.refresh_derived_state();

        let a = crate::nnue::evaluate_once(&net, &pos);
        let b = crate::nnue::evaluate_once(&net, &flipped);
        assert_eq!(a, b);
    }
}
