//! 探索の補助型
//!
//! ノード種別・探索スタック・PV・ルート手・縮小量テーブルなど。

use std::sync::LazyLock;

use crate::search::history::MoveDescriptor;
use crate::types::{Depth, Move, Value, MAX_PLY};

/// ノード種別（const genericで渡す）
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    NonPV = 0,
    PV = 1,
    Root = 2,
}

/// 読み筋
#[derive(Clone)]
pub struct PvList {
    pub moves: [Move; MAX_PLY as usize],
    pub len: usize,
}

impl PvList {
    pub fn new() -> PvList {
        PvList {
            moves: [Move::NONE; MAX_PLY as usize],
            len: 0,
        }
    }

    /// 先頭手+子のPVで上書きする
    pub fn update(&mut self, mv: Move, child: &PvList) {
        self.moves[0] = mv;
        let n = child.len.min(MAX_PLY as usize - 1);
        self.moves[1..1 + n].copy_from_slice(&child.moves[..n]);
        self.len = n + 1;
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_vec(&self) -> Vec<Move> {
        self.moves[..self.len].to_vec()
    }
}

impl Default for PvList {
    fn default() -> Self {
        Self::new()
    }
}

/// キラー手（plyごとに2つ）
#[derive(Clone, Copy, Default)]
pub struct KillerTable {
    pub killer1: Move,
    pub killer2: Move,
}

impl KillerTable {
    #[inline]
    pub fn push(&mut self, mv: Move) {
        if self.killer1 != mv {
            self.killer2 = self.killer1;
            self.killer1 = mv;
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.killer1 = Move::NONE;
        self.killer2 = Move::NONE;
    }
}

/// plyごとの探索スタックエントリ
#[derive(Clone)]
pub struct StackEntry {
    /// 補正後の静的評価（王手中はNONE）
    pub static_eval: Value,
    /// 補正前の生の静的評価
    pub raw_eval: Value,
    /// singular extension用の除外手
    pub excluded_move: Move,
    /// このノードで指した手の記述子（null moveはNone）
    pub current_desc: Option<MoveDescriptor>,
    /// 直前の手が駒取りだったか
    pub current_is_capture: bool,
    /// 直前の手の移動先（静止探索の取り返し制限用）
    pub current_to: Option<crate::types::Square>,
    pub killers: KillerTable,
    pub pv: PvList,
}

impl StackEntry {
    pub fn new() -> StackEntry {
        StackEntry {
            static_eval: Value::NONE,
            raw_eval: Value::NONE,
            excluded_move: Move::NONE,
            current_desc: None,
            current_is_capture: false,
            current_to: None,
            killers: KillerTable::default(),
            pv: PvList::new(),
        }
    }
}

impl Default for StackEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// ルートの1手
#[derive(Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: Value,
    pub prev_score: Value,
    pub pv: Vec<Move>,
}

impl RootMove {
    pub fn new(mv: Move) -> RootMove {
        RootMove {
            mv,
            score: Value::new(-Value::INFINITE.raw()),
            prev_score: Value::new(-Value::INFINITE.raw()),
            pv: vec![mv],
        }
    }
}

/// 引き分けスコア（千日手の盲点を避ける±の揺らぎ付き）
#[inline]
pub fn draw_score(nodes: u64) -> Value {
    Value::new(2 - (nodes % 4) as i32)
}

/// LMPの足切り手数
#[inline]
pub fn lmp_threshold(depth: Depth, improving: bool) -> i32 {
    (3 + depth * depth) / (2 - improving as i32)
}

/// LMRの基本縮小量テーブル [depth][move_count]
static REDUCTIONS: LazyLock<[[i8; 64]; 64]> = LazyLock::new(|| {
    let mut table = [[0i8; 64]; 64];
    for (d, row) in table.iter_mut().enumerate().skip(1) {
        for (m, r) in row.iter_mut().enumerate().skip(1) {
            *r = (0.77 + (d as f64).ln() * (m as f64).ln() / 2.36) as i8;
        }
    }
    table
});

/// LMRの基本縮小量
#[inline]
pub fn base_reduction(depth: Depth, move_count: i32) -> i32 {
    let d = depth.clamp(1, 63) as usize;
    let m = move_count.clamp(1, 63) as usize;
    REDUCTIONS[d][m] as i32
}
