//! SFENの読み書き
//!
//! 盤面は九筋→一筋の順で段ごとに記述し、先手の駒を大文字、成駒を'+'前置で表す。
//! 手駒は枚数前置の駒文字（先手→後手の順）、なければ'-'。

use std::fmt;

use crate::types::{Color, File, Hand, Piece, PieceType, Rank, Square};

use super::Position;

/// SFENの解析エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SfenError {
    /// フィールドが足りない
    MissingField(&'static str),
    /// 盤面の記述が不正
    InvalidBoard(String),
    /// 手番の記述が不正
    InvalidSideToMove(String),
    /// 手駒の記述が不正
    InvalidHand(String),
    /// 手数の記述が不正
    InvalidPly(String),
    /// 玉がいない・2枚以上いる
    InvalidKings,
}

impl fmt::Display for SfenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SfenError::MissingField(name) => write!(f, "missing sfen field: {name}"),
            SfenError::InvalidBoard(s) => write!(f, "invalid board field: {s}"),
            SfenError::InvalidSideToMove(s) => write!(f, "invalid side to move: {s}"),
            SfenError::InvalidHand(s) => write!(f, "invalid hand field: {s}"),
            SfenError::InvalidPly(s) => write!(f, "invalid move counter: {s}"),
            SfenError::InvalidKings => write!(f, "each side must have exactly one king"),
        }
    }
}

impl std::error::Error for SfenError {}

impl Position {
    /// SFEN文字列から局面を構築する
    pub fn from_sfen(sfen: &str) -> Result<Position, SfenError> {
        let mut fields = sfen.split_whitespace();

        let board = fields.next().ok_or(SfenError::MissingField("board"))?;
        let stm = fields.next().ok_or(SfenError::MissingField("side to move"))?;
        let hands = fields.next().ok_or(SfenError::MissingField("hands"))?;
        let ply = fields.next().unwrap_or("1");

        let mut pos = Position::empty();

        // 盤面
        let ranks: Vec<&str> = board.split('/').collect();
        if ranks.len() != 9 {
            return Err(SfenError::InvalidBoard(board.to_string()));
        }
        for (rank_idx, row) in ranks.iter().enumerate() {
            let rank = Rank::from_index(rank_idx).unwrap();
            let mut file_idx = 8i32; // 九筋から
            let mut promoted = false;
            for c in row.chars() {
                match c {
                    '1'..='9' => {
                        if promoted {
                            return Err(SfenError::InvalidBoard(board.to_string()));
                        }
                        file_idx -= c as i32 - '0' as i32;
                    }
                    '+' => {
                        if promoted {
                            return Err(SfenError::InvalidBoard(board.to_string()));
                        }
                        promoted = true;
                    }
                    _ => {
                        if file_idx < 0 {
                            return Err(SfenError::InvalidBoard(board.to_string()));
                        }
                        let color = if c.is_ascii_uppercase() {
                            Color::Black
                        } else {
                            Color::White
                        };
                        let base = PieceType::from_sfen_char(c.to_ascii_uppercase())
                            .ok_or_else(|| SfenError::InvalidBoard(board.to_string()))?;
                        let pt = if promoted {
                            base.promote()
                                .ok_or_else(|| SfenError::InvalidBoard(board.to_string()))?
                        } else {
                            base
                        };
                        promoted = false;
                        let sq = Square::new(File::from_index(file_idx as usize).unwrap(), rank);
                        pos.set_board_piece(Piece::new(color, pt), sq);
                        file_idx -= 1;
                    }
                }
            }
            if file_idx != -1 || promoted {
                return Err(SfenError::InvalidBoard(board.to_string()));
            }
        }

        // 手番
        match stm {
            "b" => pos.set_side_to_move(Color::Black),
            "w" => pos.set_side_to_move(Color::White),
            _ => return Err(SfenError::InvalidSideToMove(stm.to_string())),
        }

        // 手駒
        if hands != "-" {
            let mut count = 0u32;
            for c in hands.chars() {
                match c {
                    '0'..='9' => {
                        count = count * 10 + (c as u32 - '0' as u32);
                        if count > 18 {
                            return Err(SfenError::InvalidHand(hands.to_string()));
                        }
                    }
                    _ => {
                        let color = if c.is_ascii_uppercase() {
                            Color::Black
                        } else {
                            Color::White
                        };
                        let pt = PieceType::from_sfen_char(c.to_ascii_uppercase())
                            .ok_or_else(|| SfenError::InvalidHand(hands.to_string()))?;
                        if pt == PieceType::King {
                            return Err(SfenError::InvalidHand(hands.to_string()));
                        }
                        let n = if count == 0 { 1 } else { count };
                        if n > Hand::max_count(pt) {
                            return Err(SfenError::InvalidHand(hands.to_string()));
                        }
                        pos.set_hand_count(color, pt, n);
                        count = 0;
                    }
                }
            }
            if count != 0 {
                return Err(SfenError::InvalidHand(hands.to_string()));
            }
        }

        // 手数
        let game_ply: u32 =
            ply.parse().map_err(|_| SfenError::InvalidPly(ply.to_string()))?;
        pos.set_game_ply(game_ply.max(1));

        // 玉は双方ちょうど1枚
        if pos.pieces(Color::Black, PieceType::King).popcount() != 1
            || pos.pieces(Color::White, PieceType::King).popcount() != 1
        {
            return Err(SfenError::InvalidKings);
        }

        pos.refresh_derived_state();
        Ok(pos)
    }

    /// SFEN文字列に変換する
    pub fn sfen(&self) -> String {
        let mut out = String::with_capacity(80);

        // 盤面
        for rank_idx in 0..9 {
            if rank_idx > 0 {
                out.push('/');
            }
            let rank = Rank::from_index(rank_idx).unwrap();
            let mut empty = 0;
            for file_idx in (0..9).rev() {
                let sq = Square::new(File::from_index(file_idx).unwrap(), rank);
                let pc = self.piece_on(sq);
                if pc.is_none() {
                    empty += 1;
                } else {
                    if empty > 0 {
                        out.push((b'0' + empty) as char);
                        empty = 0;
                    }
                    out.push_str(&pc.to_sfen());
                }
            }
            if empty > 0 {
                out.push((b'0' + empty) as char);
            }
        }

        out.push(' ');
        out.push(self.side_to_move().to_sfen_char());
        out.push(' ');

        // 手駒（飛角金銀桂香歩の順、先手→後手）
        const HAND_ORDER: [PieceType; 7] = [
            PieceType::Rook,
            PieceType::Bishop,
            PieceType::Gold,
            PieceType::Silver,
            PieceType::Knight,
            PieceType::Lance,
            PieceType::Pawn,
        ];
        let mut any = false;
        for c in [Color::Black, Color::White] {
            for pt in HAND_ORDER {
                let count = self.hand(c).count(pt);
                if count == 0 {
                    continue;
                }
                any = true;
                if count > 1 {
                    out.push_str(&count.to_string());
                }
                let ch = pt.to_sfen_char().unwrap();
                out.push(if c == Color::Black {
                    ch
                } else {
                    ch.to_ascii_lowercase()
                });
            }
        }
        if !any {
            out.push('-');
        }

        out.push(' ');
        out.push_str(&self.game_ply().to_string());
        out
    }
}

impl fmt::Display for Position {
    /// デバッグ用の盤面表示
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " 9  8  7  6  5  4  3  2  1")?;
        writeln!(f, "+---------------------------+")?;
        for rank_idx in 0..9 {
            let rank = Rank::from_index(rank_idx).unwrap();
            write!(f, "|")?;
            for file_idx in (0..9).rev() {
                let sq = Square::new(File::from_index(file_idx).unwrap(), rank);
                let pc = self.piece_on(sq);
                if pc.is_none() {
                    write!(f, " . ")?;
                } else {
                    let s = pc.to_sfen();
                    write!(f, "{s:>2} ")?;
                }
            }
            writeln!(f, "| {}", rank.to_usi_char())?;
        }
        writeln!(f, "+---------------------------+")?;
        write!(
            f,
            "hand(B): {:?}  hand(W): {:?}  {} to move",
            self.hand(Color::Black),
            self.hand(Color::White),
            self.side_to_move().to_sfen_char()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::SFEN_HIRATE;
    use super::*;

    #[test]
    fn test_sfen_round_trip_startpos() {
        let pos = Position::from_sfen(SFEN_HIRATE).unwrap();
        assert_eq!(pos.sfen(), SFEN_HIRATE);
    }

    #[test]
    fn test_sfen_round_trip_with_hands_and_promoted() {
        let sfen = "l+R6l/5k3/4gp1p1/p1p4np/5P3/P1P3P1P/1P1P1GN2/6SK1/LN2s2+rL w BG2SN5Pbg2p 45";
        let pos = Position::from_sfen(sfen).unwrap();
        assert_eq!(pos.sfen(), sfen);
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.game_ply(), 45);
        assert_eq!(pos.hand(Color::Black).count(PieceType::Pawn), 5);
        assert_eq!(pos.hand(Color::White).count(PieceType::Pawn), 2);
    }

    #[test]
    fn test_sfen_parse_errors() {
        assert!(Position::from_sfen("").is_err());
        // 段が8つしかない
        assert!(Position::from_sfen("9/9/9/9/9/9/9/9 b - 1").is_err());
        // 筋が余る
        assert!(Position::from_sfen("lnsgkgsnl9/9/9/9/9/9/9/9/9 b - 1").is_err());
        // 玉がいない
        assert!(Position::from_sfen("9/9/9/9/9/9/9/9/9 b - 1").is_err());
        // 不正な手番
        assert!(Position::from_sfen(
            "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL x - 1"
        )
        .is_err());
        // 成れない駒の成り
        assert!(Position::from_sfen("4k4/9/9/9/9/9/9/+G8/4K4 b - 1").is_err());
    }

    #[test]
    fn test_sfen_key_is_reproducible() {
        let a = Position::from_sfen(SFEN_HIRATE).unwrap();
        let b = Position::startpos();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.board_key(), b.board_key());
        assert_eq!(a.pawn_key(), b.pawn_key());
    }
}
