//! 置換表エントリの境界種別（Bound）

/// 探索値の境界種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Bound {
    /// 無効
    #[default]
    None = 0,
    /// 上界（fail low）
    Upper = 1,
    /// 下界（fail high）
    Lower = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    #[inline]
    pub const fn from_u8(v: u8) -> Bound {
        match v & 0x3 {
            1 => Bound::Upper,
            2 => Bound::Lower,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }

    /// 下界または正確な値か
    #[inline]
    pub const fn is_lower_or_exact(self) -> bool {
        matches!(self, Bound::Lower | Bound::Exact)
    }

    /// 上界または正確な値か
    #[inline]
    pub const fn is_upper_or_exact(self) -> bool {
        matches!(self, Bound::Upper | Bound::Exact)
    }
}
