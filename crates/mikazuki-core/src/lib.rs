//! Mikazuki将棋エンジンのコア
//!
//! 局面表現・指し手生成・NNUE評価・並列Alpha-Beta探索を提供する。
//! プロトコル入出力は `mikazuki-cli` 側にあり、このクレートは
//! `search::Searcher` と `search::SearchReporter` を境界として使う。

pub mod bitboard;
pub mod eval;
pub mod movegen;
pub mod nnue;
pub mod position;
pub mod search;
pub mod tt;
pub mod types;
