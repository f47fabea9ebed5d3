//! 遠方駒（香・角・飛）の利き計算
//!
//! 方向ごとのレイを事前計算し、占有ビットボードとの交差から
//! 最初のブロッカーまでを切り出す。indexの増減方向によって
//! 最近接ブロッカーがlsb/msbのどちらになるかが決まる。

use std::sync::OnceLock;

use crate::types::{Color, Square};

use super::Bitboard;

/// 8方向。Increasing系はsqインデックスが増える方向。
#[derive(Clone, Copy, PartialEq, Eq)]
enum Dir {
    N = 0,  // rank-1（先手の前方）
    S = 1,  // rank+1
    E = 2,  // file-1
    W = 3,  // file+1
    Ne = 4, // file-1, rank-1
    Se = 5, // file-1, rank+1
    Nw = 6, // file+1, rank-1
    Sw = 7, // file+1, rank+1
}

const DIRS: [Dir; 8] = [Dir::N, Dir::S, Dir::E, Dir::W, Dir::Ne, Dir::Se, Dir::Nw, Dir::Sw];

impl Dir {
    const fn delta(self) -> (i32, i32) {
        match self {
            Dir::N => (0, -1),
            Dir::S => (0, 1),
            Dir::E => (-1, 0),
            Dir::W => (1, 0),
            Dir::Ne => (-1, -1),
            Dir::Se => (-1, 1),
            Dir::Nw => (1, -1),
            Dir::Sw => (1, 1),
        }
    }

    /// sqインデックスが増える方向か（ブロッカー選択がlsbになる）
    const fn increasing(self) -> bool {
        let (df, dr) = self.delta();
        df * 9 + dr > 0
    }
}

struct RayTable {
    rays: [[Bitboard; Square::NUM]; 8],
}

static RAYS: OnceLock<RayTable> = OnceLock::new();

fn rays() -> &'static RayTable {
    RAYS.get_or_init(RayTable::new)
}

impl RayTable {
    fn new() -> Self {
        let mut rays = [[Bitboard::EMPTY; Square::NUM]; 8];
        for (d, dir) in DIRS.iter().enumerate() {
            let (df, dr) = dir.delta();
            for sq in Square::all() {
                let mut bb = Bitboard::EMPTY;
                let mut f = sq.file().index() as i32 + df;
                let mut r = sq.rank().index() as i32 + dr;
                while (0..=8).contains(&f) && (0..=8).contains(&r) {
                    // SAFETY: ループ条件で盤内を保証
                    bb.set(unsafe { Square::from_u8_unchecked((f * 9 + r) as u8) });
                    f += df;
                    r += dr;
                }
                rays[d][sq.index()] = bb;
            }
        }
        RayTable { rays }
    }
}

/// 1方向の利き（最初のブロッカーを含む）
#[inline]
fn ray_attacks(dir: Dir, sq: Square, occ: Bitboard) -> Bitboard {
    let table = rays();
    let ray = table.rays[dir as usize][sq.index()];
    let blockers = ray & occ;
    if blockers.is_empty() {
        return ray;
    }
    let first = if dir.increasing() {
        blockers.lsb()
    } else {
        blockers.msb()
    };
    ray ^ table.rays[dir as usize][first.index()]
}

/// 香の利き
#[inline]
pub fn lance_attacks(c: Color, sq: Square, occ: Bitboard) -> Bitboard {
    match c {
        Color::Black => ray_attacks(Dir::N, sq, occ),
        Color::White => ray_attacks(Dir::S, sq, occ),
    }
}

/// 角の利き
#[inline]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    ray_attacks(Dir::Ne, sq, occ)
        | ray_attacks(Dir::Se, sq, occ)
        | ray_attacks(Dir::Nw, sq, occ)
        | ray_attacks(Dir::Sw, sq, occ)
}

/// 飛の利き
#[inline]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    ray_attacks(Dir::N, sq, occ)
        | ray_attacks(Dir::S, sq, occ)
        | ray_attacks(Dir::E, sq, occ)
        | ray_attacks(Dir::W, sq, occ)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{File, Rank};

    fn sq(file: usize, rank: usize) -> Square {
        Square::new(File::from_index(file).unwrap(), Rank::from_index(rank).unwrap())
    }

    #[test]
    fn test_rook_attacks_empty_board() {
        let bb = rook_attacks(Square::SQ_55, Bitboard::EMPTY);
        assert_eq!(bb.popcount(), 16);
    }

    #[test]
    fn test_bishop_attacks_empty_board() {
        let bb = bishop_attacks(Square::SQ_55, Bitboard::EMPTY);
        assert_eq!(bb.popcount(), 16);
        assert!(bb.test(Square::SQ_11));
        assert!(bb.test(Square::SQ_99));
    }

    #[test]
    fn test_rook_attacks_blocked() {
        // 5三に駒を置くと5五の飛は上方向には5三までしか利かない
        let occ = Bitboard::from_square(sq(4, 2));
        let bb = rook_attacks(Square::SQ_55, occ);
        assert!(bb.test(sq(4, 3)));
        assert!(bb.test(sq(4, 2))); // ブロッカー自身は含む
        assert!(!bb.test(sq(4, 1)));
        assert!(!bb.test(sq(4, 0)));
    }

    #[test]
    fn test_lance_attacks() {
        // 先手の香は前方（rank減少方向）
        let bb = lance_attacks(Color::Black, sq(0, 8), Bitboard::EMPTY);
        assert_eq!(bb.popcount(), 8);
        let occ = Bitboard::from_square(sq(0, 4));
        let bb = lance_attacks(Color::Black, sq(0, 8), occ);
        assert_eq!(bb.popcount(), 4);
        assert!(bb.test(sq(0, 4)));

        // 後手の香は逆方向
        let bb = lance_attacks(Color::White, sq(0, 0), Bitboard::EMPTY);
        assert_eq!(bb.popcount(), 8);
    }
}
