//! ビットボードモジュール
//!
//! 81マスの盤面をu128の下位81bitで表現する。
//! `sq = file * 9 + rank` の縦型レイアウト。
//!
//! - `Bitboard`: 盤面集合とビット演算
//! - `tables`: 近接駒の利きテーブルと筋・段・ゾーンのマスク
//! - `sliders`: 遠方駒（香・角・飛）の利き計算

mod core;
mod sliders;
mod tables;

pub use core::{Bitboard, BitboardIter};
pub use sliders::{bishop_attacks, lance_attacks, rook_attacks};
pub use tables::{
    attacks_from, gold_attacks, king_attacks, knight_attacks, pawn_attacks, silver_attacks,
    FILE_BB, PROMO_ZONE, RANK_BB,
};
