//! 静的交換評価（SEE）
//!
//! 対象升での取り合いを価値の低い駒から順にシミュレートする。
//! 占有ビットボードだけを更新し、遠方駒の素抜き（x-ray）は
//! 利きの再計算で自然に現れる。ピンは考慮しない。

use crate::bitboard::Bitboard;
use crate::eval::piece_value;
use crate::types::{Color, Move, PieceType, Square};

use super::Position;

impl Position {
    /// 指し手の静的交換評価
    ///
    /// 駒打ちは獲得0から始まり、打った駒が取られる可能性だけを織り込む。
    pub fn see(&self, mv: Move) -> i32 {
        let to = mv.to();
        let us = self.side_to_move();
        let mut occ = self.occupancy();
        let mut gain = [0i32; 40];

        // いまtoにいる（これから取られ得る）駒の価値
        let mut occupant_val;

        if mv.is_drop() {
            gain[0] = 0;
            occupant_val = piece_value(mv.drop_piece_type());
            occ |= Bitboard::from_square(to);
        } else {
            let from = mv.from();
            let pc = self.piece_on(from);
            let captured = self.piece_on(to);
            gain[0] = if captured.is_some() {
                piece_value(captured.piece_type())
            } else {
                0
            };
            let pt_after = if mv.is_promote() {
                pc.piece_type().promote().expect("promotable piece")
            } else {
                pc.piece_type()
            };
            occupant_val = piece_value(pt_after);
            occ ^= Bitboard::from_square(from);
            occ |= Bitboard::from_square(to);
        }

        let mut stm = !us;
        let mut d = 0usize;

        loop {
            let Some((sq, pt)) = self.least_valuable_attacker(to, occ, stm) else {
                break;
            };
            d += 1;
            gain[d] = occupant_val - gain[d - 1];
            // どちらに転んでも損が確定したら打ち切り
            if (-gain[d - 1]).max(gain[d]) < 0 {
                break;
            }
            occupant_val = piece_value(pt);
            occ ^= Bitboard::from_square(sq);
            stm = !stm;
            if d + 1 >= gain.len() {
                break;
            }
        }

        while d > 0 {
            gain[d - 1] = -(-gain[d - 1]).max(gain[d]);
            d -= 1;
        }
        gain[0]
    }

    /// `c`側の最も価値の低い攻撃駒（玉は除く）
    fn least_valuable_attacker(
        &self,
        to: Square,
        occ: Bitboard,
        c: Color,
    ) -> Option<(Square, PieceType)> {
        let attackers = self.attackers_to(to, occ, c) & occ;
        let mut best: Option<(Square, PieceType)> = None;
        for sq in attackers {
            let pt = self.piece_on(sq).piece_type();
            if pt == PieceType::King {
                continue;
            }
            if best.map_or(true, |(_, b)| piece_value(pt) < piece_value(b)) {
                best = Some((sq, pt));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use crate::position::Position;
    use crate::types::Move;

    #[test]
    fn test_see_free_capture() {
        // 先手の飛が無防備の歩を取る
        let pos = Position::from_sfen("4k4/9/9/9/4p4/9/9/4R4/4K4 b - 1").unwrap();
        let mv = Move::from_usi("5h5e").unwrap();
        assert_eq!(pos.see(mv), 100);
    }

    #[test]
    fn test_see_defended_pawn() {
        // 歩は金に守られている: 飛で取ると歩(+100)と飛(-1300)の交換で大損
        let pos = Position::from_sfen("4k4/9/9/4g4/4p4/9/9/4R4/4K4 b - 1").unwrap();
        let mv = Move::from_usi("5h5e").unwrap();
        assert_eq!(pos.see(mv), 100 - 1300);
    }

    #[test]
    fn test_see_exchange_sequence() {
        // 銀で守られた歩を銀で取り、金で取り返す: +100 -600 +600 = 100
        let pos = Position::from_sfen("4k4/9/9/3s5/4p4/3SG4/9/9/4K4 b - 1").unwrap();
        let mv = Move::from_usi("6f5e").unwrap();
        assert_eq!(pos.see(mv), 100);
    }

    #[test]
    fn test_see_losing_capture_without_backup() {
        // 取り返しの駒がなければ銀は取られ損: +100 -600 = -500
        let pos = Position::from_sfen("4k4/9/9/3s5/4p4/3S5/9/9/4K4 b - 1").unwrap();
        let mv = Move::from_usi("6f5e").unwrap();
        assert_eq!(pos.see(mv), -500);
    }

    #[test]
    fn test_see_drop_is_non_negative_when_safe() {
        let pos = Position::from_sfen("4k4/9/9/9/9/9/9/9/4K4 b G 1").unwrap();
        let mv = Move::from_usi("G*5e").unwrap();
        assert_eq!(pos.see(mv), 0);
    }

    #[test]
    fn test_see_drop_into_attack() {
        // 5eは後手の歩(5d)の利きにあり、金打ちはただ取りされ得る
        let pos = Position::from_sfen("4k4/9/9/4p4/9/9/9/9/4K4 b G 1").unwrap();
        let mv = Move::from_usi("G*5e").unwrap();
        assert_eq!(pos.see(mv), -800);
    }
}
