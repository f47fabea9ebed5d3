//! ネットワーク本体と順伝播
//!
//! 量子化の取り決め:
//! - アキュムレータはFT_Qスケールのi16。活性化は `clamp(v, 0, FT_Q)`。
//! - L1重みはi8（L1_Qスケール）。出力を `/ L1_Q` でFT_Qスケールに戻し、
//!   CReLU値と `c*c / FT_Q`（SCReLU）を連結してL2へ渡す。
//! - L2重みはi32（L1_Qスケール）。同様に `/ L1_Q` してクランプ。
//! - 最終出力は `out * SCALE / (FT_Q * L1_Q)`。

use super::{Accumulator, FT_Q, FT_SIZE, KING_BUCKETS, L1, L1_Q, L2, L3, SCALE};
use crate::types::Color;

/// ネットワークの読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NnueError {
    /// 埋め込みデータの長さが宣言形状と一致しない
    SizeMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for NnueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NnueError::SizeMismatch { expected, actual } => {
                write!(f, "network size mismatch: expected {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for NnueError {}

/// 量子化済みネットワーク
#[derive(Debug)]
pub struct Network {
    /// 特徴量変換の重み [KING_BUCKETS * FT_SIZE][L1]
    ft_weights: Vec<i16>,
    /// 特徴量変換のバイアス
    ft_biases: [i16; L1],
    /// L1重み [2 * L1][L2]（手番側・非手番側の順）
    l1_weights: Vec<i8>,
    /// L1バイアス
    l1_biases: [i32; L2],
    /// L2重み [2 * L2][L3]
    l2_weights: Vec<i32>,
    /// L2バイアス
    l2_biases: [i32; L3],
    /// L3重み
    l3_weights: [i32; L3],
    /// L3バイアス
    l3_bias: i32,
}

impl Network {
    /// 埋め込みブロブの想定バイト数
    pub const fn expected_bytes() -> usize {
        KING_BUCKETS * FT_SIZE * L1 * 2
            + L1 * 2
            + (2 * L1) * L2
            + L2 * 4
            + (2 * L2) * L3 * 4
            + L3 * 4
            + L3 * 4
            + 4
    }

    /// リトルエンディアンのバイト列からネットワークを構築する
    pub fn from_bytes(data: &[u8]) -> Result<Network, NnueError> {
        if data.len() != Self::expected_bytes() {
            return Err(NnueError::SizeMismatch {
                expected: Self::expected_bytes(),
                actual: data.len(),
            });
        }

        let mut cursor = 0usize;

        let read_i16 = |data: &[u8], cursor: &mut usize| -> i16 {
            let v = i16::from_le_bytes([data[*cursor], data[*cursor + 1]]);
            *cursor += 2;
            v
        };
        let read_i32 = |data: &[u8], cursor: &mut usize| -> i32 {
            let v = i32::from_le_bytes([
                data[*cursor],
                data[*cursor + 1],
                data[*cursor + 2],
                data[*cursor + 3],
            ]);
            *cursor += 4;
            v
        };

        let mut ft_weights = vec![0i16; KING_BUCKETS * FT_SIZE * L1];
        for w in ft_weights.iter_mut() {
            *w = read_i16(data, &mut cursor);
        }

        let mut ft_biases = [0i16; L1];
        for b in ft_biases.iter_mut() {
            *b = read_i16(data, &mut cursor);
        }

        let mut l1_weights = vec![0i8; 2 * L1 * L2];
        for w in l1_weights.iter_mut() {
            *w = data[cursor] as i8;
            cursor += 1;
        }

        let mut l1_biases = [0i32; L2];
        for b in l1_biases.iter_mut() {
            *b = read_i32(data, &mut cursor);
        }

        let mut l2_weights = vec![0i32; 2 * L2 * L3];
        for w in l2_weights.iter_mut() {
            *w = read_i32(data, &mut cursor);
        }

        let mut l2_biases = [0i32; L3];
        for b in l2_biases.iter_mut() {
            *b = read_i32(data, &mut cursor);
        }

        let mut l3_weights = [0i32; L3];
        for w in l3_weights.iter_mut() {
            *w = read_i32(data, &mut cursor);
        }

        let l3_bias = read_i32(data, &mut cursor);
        debug_assert_eq!(cursor, data.len());

        Ok(Network {
            ft_weights,
            ft_biases,
            l1_weights,
            l1_biases,
            l2_weights,
            l2_biases,
            l3_weights,
            l3_bias,
        })
    }

    /// 特徴量1行ぶんの重み
    #[inline]
    pub(super) fn ft_row(&self, feature: usize) -> &[i16] {
        &self.ft_weights[feature * L1..(feature + 1) * L1]
    }

    #[inline]
    pub(super) fn ft_biases(&self) -> &[i16; L1] {
        &self.ft_biases
    }

    /// 順伝播。戻り値は手番側から見た内部スケールの評価値。
    pub fn forward(&self, acc: &Accumulator, stm: Color) -> i32 {
        // L1: 手番側・非手番側のアキュムレータをCReLUして行列積
        let mut l1_out = self.l1_biases;
        for (half, persp) in [stm, !stm].into_iter().enumerate() {
            let a = acc.perspective(persp);
            for (i, &raw) in a.iter().enumerate() {
                let v = (raw as i32).clamp(0, FT_Q);
                if v == 0 {
                    continue;
                }
                let row = &self.l1_weights[(half * L1 + i) * L2..(half * L1 + i + 1) * L2];
                for (j, &w) in row.iter().enumerate() {
                    l1_out[j] += v * w as i32;
                }
            }
        }

        // 活性化: CReLUとSCReLUを連結
        let mut l2_in = [0i32; 2 * L2];
        for j in 0..L2 {
            let c = (l1_out[j] / L1_Q).clamp(0, FT_Q);
            l2_in[j] = c;
            l2_in[L2 + j] = c * c / FT_Q;
        }

        // L2
        let mut l2_out = self.l2_biases;
        for (j, &v) in l2_in.iter().enumerate() {
            if v == 0 {
                continue;
            }
            let row = &self.l2_weights[j * L3..(j + 1) * L3];
            for (k, &w) in row.iter().enumerate() {
                l2_out[k] += v * w;
            }
        }

        // L3: 内積
        let mut out = self.l3_bias;
        for k in 0..L3 {
            let v = (l2_out[k] / L1_Q).clamp(0, FT_Q);
            out += v * self.l3_weights[k];
        }

        out * SCALE / (FT_Q * L1_Q)
    }
}

#[cfg(test)]
pub(super) mod test_support {
    use super::*;

    /// テスト用: 決定的な疑似乱数バイト列からネットワークを作る
    ///
    /// i16/i32の上位バイトを0に保ち、重みを小さな非負値に抑えることで
    /// アキュムレータのオーバーフローを避ける。
    pub fn deterministic_network(seed: u64) -> Network {
        let mut state = seed | 1;
        let mut bytes = Vec::with_capacity(Network::expected_bytes());
        while bytes.len() < Network::expected_bytes() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let b = if bytes.len() % 4 == 0 {
                (state % 7) as u8
            } else {
                0
            };
            bytes.push(b);
        }
        Network::from_bytes(&bytes).expect("deterministic network must parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_rejects_wrong_size() {
        let err = Network::from_bytes(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, NnueError::SizeMismatch { actual: 16, .. }));
    }

    #[test]
    fn test_zero_network_evaluates_to_zero() {
        let net = Network::from_bytes(&vec![0u8; Network::expected_bytes()]).unwrap();
        let pos = crate::position::Position::startpos();
        let v = crate::nnue::evaluate_once(&net, &pos);
        assert_eq!(v.raw(), 0);
    }
}
