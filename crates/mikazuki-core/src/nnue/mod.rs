//! NNUE評価関数
//!
//! HalfKA風の特徴量（自玉バケツ × 盤上駒 + 手駒）を差分更新し、
//! 量子化済みの小さなMLPで評価値を出す。
//!
//! ネットワーク構成:
//! - 特徴量変換: 疎な二値入力 → 視点ごとの `L1` 次元 i16 アキュムレータ
//! - L1: i8重み + i32バイアス → `L2` 出力、CReLUとSCReLUの活性を連結
//! - L2: i32行列積 → `L3` 隠れ層
//! - L3: 内積 → スカラー
//!
//! 重みはビルド時に `OUT_DIR/mikazuki.nnue` として埋め込まれる
//! （`MIKAZUKI_EVAL_FILE` 指定時はそのファイル、なければゼロ初期化）。

mod accumulator;
mod network;

pub use accumulator::{Accumulator, AccumulatorStack, NnueUpdates};
pub use network::{Network, NnueError};

use std::sync::LazyLock;

use crate::position::Position;
use crate::types::{Color, Piece, PieceType, Square, Value};

// =============================================================================
// アーキテクチャ定数
// =============================================================================

/// 自玉位置のバケツ数（盤面の4象限）
pub const KING_BUCKETS: usize = 4;

/// 盤上駒の特徴量数（駒種14 × 81升）
pub const PIECE_FEATURES: usize = PieceType::NUM * Square::NUM;

/// 手駒の特徴量数（歩18 + 香桂銀金 各4 + 角飛 各2）
pub const HAND_FEATURES: usize = 38;

/// 視点内の片側色ぶんのストライド
pub const COLOR_STRIDE: usize = PIECE_FEATURES + HAND_FEATURES;

/// 1バケツあたりの特徴量数
pub const FT_SIZE: usize = 2 * COLOR_STRIDE;

/// アキュムレータの次元
pub const L1: usize = 256;
/// L1出力の次元
pub const L2: usize = 16;
/// L2出力の次元
pub const L3: usize = 32;

/// 特徴量変換の量子化スケール
pub const FT_Q: i32 = 255;
/// 重みの量子化スケール
pub const L1_Q: i32 = 64;
/// 出力のスケール係数
pub const SCALE: i32 = 400;

/// 手駒特徴量の駒種オフセット
const HAND_PIECE_OFFSET: [usize; 8] = [
    0, // (未使用)
    0,  // 歩
    18, // 香
    22, // 桂
    26, // 銀
    34, // 角
    36, // 飛
    30, // 金
];

// =============================================================================
// 特徴量インデックス
// =============================================================================

/// 視点に合わせた升の向き（後手視点は180度回転）
#[inline]
pub fn orient(persp: Color, sq: Square) -> Square {
    match persp {
        Color::Black => sq,
        Color::White => sq.inverse(),
    }
}

/// 自玉のバケツ（視点に正規化した玉位置の象限）
#[inline]
pub fn king_bucket(persp: Color, king_sq: Square) -> usize {
    let s = orient(persp, king_sq);
    ((s.file().index() >= 5) as usize) * 2 + (s.rank().index() >= 5) as usize
}

/// 盤上駒の特徴量インデックス
#[inline]
pub fn psqt_feature_index(persp: Color, bucket: usize, piece: Piece, sq: Square) -> usize {
    debug_assert!(bucket < KING_BUCKETS);
    bucket * FT_SIZE
        + COLOR_STRIDE * (piece.color() != persp) as usize
        + (piece.piece_type() as usize - 1) * Square::NUM
        + orient(persp, sq).index()
}

/// 手駒の特徴量インデックス（`count_minus_one` 枚目のスロット）
#[inline]
pub fn hand_feature_index(
    persp: Color,
    bucket: usize,
    hand_color: Color,
    pt: PieceType,
    count_minus_one: u32,
) -> usize {
    debug_assert!((pt as u8) <= 7);
    bucket * FT_SIZE
        + COLOR_STRIDE * (hand_color != persp) as usize
        + PIECE_FEATURES
        + HAND_PIECE_OFFSET[pt as usize]
        + count_minus_one as usize
}

// =============================================================================
// 埋め込みネットワーク
// =============================================================================

static EMBEDDED_NETWORK: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mikazuki.nnue"));

static NETWORK: LazyLock<Result<Network, NnueError>> =
    LazyLock::new(|| Network::from_bytes(EMBEDDED_NETWORK));

/// 埋め込みネットワークを取得する
///
/// 埋め込みデータの形状が宣言と一致しない場合はエラー
/// （起動時に検証し、異常終了させるのは呼び出し側の責務）。
pub fn network() -> Result<&'static Network, NnueError> {
    NETWORK.as_ref().map_err(|e| e.clone())
}

/// アキュムレータを使わずに1回だけ評価する（検証・デバッグ用）
pub fn evaluate_once(net: &Network, pos: &Position) -> Value {
    let mut acc = Accumulator::new();
    acc.reset(net, pos, Color::Black);
    acc.reset(net, pos, Color::White);
    Value::clamp_eval(net.forward(&acc, pos.side_to_move()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_index_bounds() {
        for persp in [Color::Black, Color::White] {
            for bucket in 0..KING_BUCKETS {
                for sq in Square::all() {
                    for pt in 1..=14u8 {
                        let pc = Piece::new(Color::Black, PieceType::from_u8(pt).unwrap());
                        let idx = psqt_feature_index(persp, bucket, pc, sq);
                        assert!(idx < KING_BUCKETS * FT_SIZE);
                    }
                }
                for pt in PieceType::HAND_PIECES {
                    for n in 0..crate::types::Hand::max_count(pt) {
                        let idx = hand_feature_index(persp, bucket, Color::White, pt, n);
                        assert!(idx < KING_BUCKETS * FT_SIZE);
                    }
                }
            }
        }
    }

    #[test]
    fn test_hand_offsets_are_disjoint() {
        // 手駒スロットが互いに重ならないこと
        let mut seen = std::collections::HashSet::new();
        for pt in PieceType::HAND_PIECES {
            for n in 0..crate::types::Hand::max_count(pt) {
                let idx = hand_feature_index(Color::Black, 0, Color::Black, pt, n);
                assert!(seen.insert(idx), "overlapping hand feature: {pt:?} {n}");
            }
        }
        assert_eq!(seen.len(), HAND_FEATURES);
    }

    #[test]
    fn test_embedded_network_parses() {
        assert!(network().is_ok());
    }
}
