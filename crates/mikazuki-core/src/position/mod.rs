//! 局面（Position）
//!
//! 盤面・手駒・手番と各種Zobristキーを保持する。値型として安価にコピーでき、
//! `apply_move` は新しい局面を返す（探索はplyごとに子局面を作る）。
//!
//! キーは常に差分更新され、全計算 (`compute_keys`) と一致することが不変条件。

mod see;
mod sfen;
mod zobrist;

pub use sfen::SfenError;

use crate::bitboard::{
    attacks_from, bishop_attacks, gold_attacks, king_attacks, knight_attacks, lance_attacks,
    pawn_attacks, rook_attacks, silver_attacks, Bitboard, FILE_BB, PROMO_ZONE,
};
use crate::types::{Color, Hand, Move, Piece, PieceType, Square};

use zobrist::{zobrist_hand, zobrist_psq, ZOBRIST};

/// 平手初期局面のSFEN
pub const SFEN_HIRATE: &str =
    "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1";

/// 千日手判定の履歴レコード
///
/// 優等局面（盤面が同一で手駒が上位集合）の検出のため、
/// フルキーに加えて盤面キーと手番側の手駒を記録する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: u64,
    pub board_key: u64,
    /// その局面での手番側の手駒
    pub hand: Hand,
}

/// 千日手判定の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SennichiteStatus {
    /// 千日手ではない
    None,
    /// 引き分け
    Draw,
    /// 連続王手の千日手（直前に指した側の反則負け = 手番側の勝ち）
    Win,
}

/// 局面
#[derive(Debug, Clone)]
pub struct Position {
    /// 駒種ごとのビットボード（インデックスはPieceType、[0]は未使用）
    piece_bb: [Bitboard; PieceType::NUM + 1],
    /// 手番ごとの占有
    color_bb: [Bitboard; Color::NUM],
    /// 升ごとの駒
    board: [Piece; Square::NUM],
    /// 手駒
    hands: [Hand; Color::NUM],
    /// 手番
    side_to_move: Color,
    /// 手数（初期局面が1）
    game_ply: u32,

    /// フルキー（盤面 + 手駒 + 手番）
    key: u64,
    /// 盤面キー（盤面 + 手番）
    board_key: u64,
    /// 歩だけの部分キー
    pawn_key: u64,
    /// 香・桂の部分キー
    cavalry_key: u64,
    /// 金・銀・玉の部分キー
    castle_key: u64,
    /// 手駒 + 玉の部分キー
    hand_key: u64,

    /// 手番側の玉に王手をかけている駒
    checkers: Bitboard,
    /// 各手番の連続王手カウント（その側が王手をかけ続けている手数）
    check_streak: [u16; Color::NUM],
}

impl Position {
    /// 空の局面（SFEN読み込み前の状態）
    pub fn empty() -> Position {
        Position {
            piece_bb: [Bitboard::EMPTY; PieceType::NUM + 1],
            color_bb: [Bitboard::EMPTY; Color::NUM],
            board: [Piece::NONE; Square::NUM],
            hands: [Hand::EMPTY; Color::NUM],
            side_to_move: Color::Black,
            game_ply: 1,
            key: 0,
            board_key: 0,
            pawn_key: 0,
            cavalry_key: 0,
            castle_key: 0,
            hand_key: 0,
            checkers: Bitboard::EMPTY,
            check_streak: [0; Color::NUM],
        }
    }

    /// 平手初期局面
    pub fn startpos() -> Position {
        Position::from_sfen(SFEN_HIRATE).expect("SFEN_HIRATE must parse")
    }

    // =========================================================================
    // アクセサ
    // =========================================================================

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn game_ply(&self) -> u32 {
        self.game_ply
    }

    #[inline]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.board[sq.index()]
    }

    /// 指定駒種・手番のビットボード
    #[inline]
    pub fn pieces(&self, c: Color, pt: PieceType) -> Bitboard {
        self.piece_bb[pt.index()] & self.color_bb[c.index()]
    }

    /// 指定手番の占有
    #[inline]
    pub fn pieces_of(&self, c: Color) -> Bitboard {
        self.color_bb[c.index()]
    }

    /// 全体の占有
    #[inline]
    pub fn occupancy(&self) -> Bitboard {
        self.color_bb[0] | self.color_bb[1]
    }

    /// 金と同じ動きの駒の集合
    #[inline]
    pub fn golds(&self, c: Color) -> Bitboard {
        (self.piece_bb[PieceType::Gold.index()]
            | self.piece_bb[PieceType::ProPawn.index()]
            | self.piece_bb[PieceType::ProLance.index()]
            | self.piece_bb[PieceType::ProKnight.index()]
            | self.piece_bb[PieceType::ProSilver.index()])
            & self.color_bb[c.index()]
    }

    #[inline]
    pub fn hand(&self, c: Color) -> Hand {
        self.hands[c.index()]
    }

    /// 玉の位置
    #[inline]
    pub fn king_square(&self, c: Color) -> Square {
        self.pieces(c, PieceType::King).lsb()
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn board_key(&self) -> u64 {
        self.board_key
    }

    #[inline]
    pub fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    #[inline]
    pub fn cavalry_key(&self) -> u64 {
        self.cavalry_key
    }

    #[inline]
    pub fn castle_key(&self) -> u64 {
        self.castle_key
    }

    #[inline]
    pub fn hand_key(&self) -> u64 {
        self.hand_key
    }

    /// 手番側の玉に王手がかかっているか
    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers.is_any()
    }

    /// 王手している駒
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.checkers
    }

    /// 駒取りの手かどうか（擬似合法を仮定）
    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        !mv.is_drop() && self.piece_on(mv.to()).is_some()
    }

    // =========================================================================
    // 利き
    // =========================================================================

    /// `c` 側の駒で `sq` に利いているものの集合
    pub fn attackers_to(&self, sq: Square, occ: Bitboard, c: Color) -> Bitboard {
        let them = !c;
        let horse = self.piece_bb[PieceType::Horse.index()];
        let dragon = self.piece_bb[PieceType::Dragon.index()];

        let mut attackers = pawn_attacks(them, sq) & self.pieces(c, PieceType::Pawn);
        attackers |= knight_attacks(them, sq) & self.pieces(c, PieceType::Knight);
        attackers |= silver_attacks(them, sq) & self.pieces(c, PieceType::Silver);
        attackers |= gold_attacks(them, sq) & self.golds(c);
        attackers |= king_attacks(sq)
            & ((self.piece_bb[PieceType::King.index()] | horse | dragon) & self.color_bb[c.index()]);
        attackers |= lance_attacks(them, sq, occ) & self.pieces(c, PieceType::Lance);
        attackers |= bishop_attacks(sq, occ)
            & ((self.piece_bb[PieceType::Bishop.index()] | horse) & self.color_bb[c.index()]);
        attackers |= rook_attacks(sq, occ)
            & ((self.piece_bb[PieceType::Rook.index()] | dragon) & self.color_bb[c.index()]);
        attackers
    }

    /// `sq` が `c` 側の駒に攻撃されているか
    #[inline]
    pub fn is_attacked_by(&self, sq: Square, occ: Bitboard, c: Color) -> bool {
        self.attackers_to(sq, occ, c).is_any()
    }

    // =========================================================================
    // 指し手の適用
    // =========================================================================

    /// 指し手を適用した新しい局面を返す
    ///
    /// 成りフラグが立っていればそのまま成る（選択の妥当性は生成側が保証する）。
    pub fn apply_move(&self, mv: Move) -> Position {
        debug_assert!(mv.is_some());

        let mut pos = self.clone();
        let us = pos.side_to_move;

        if mv.is_drop() {
            let pt = mv.drop_piece_type();
            pos.sub_hand(us, pt);
            pos.put_piece(Piece::new(us, pt), mv.to());
        } else {
            let from = mv.from();
            let to = mv.to();
            let pc = pos.board[from.index()];
            debug_assert!(pc.is_some() && pc.color() == us);

            let captured = pos.board[to.index()];
            pos.remove_piece(pc, from);
            if captured.is_some() {
                pos.remove_piece(captured, to);
                pos.add_hand(us, captured.piece_type().unpromote());
            }

            let placed = if mv.is_promote() {
                Piece::new(us, pc.piece_type().promote().expect("promotable piece"))
            } else {
                pc
            };
            pos.put_piece(placed, to);
        }

        pos.side_to_move = !us;
        pos.key ^= ZOBRIST.side;
        pos.board_key ^= ZOBRIST.side;
        pos.game_ply += 1;

        pos.checkers = pos.attackers_to(
            pos.king_square(pos.side_to_move),
            pos.occupancy(),
            us,
        );
        // 連続王手カウント: 指した側が王手をかけたら加算、さもなくばリセット
        if pos.checkers.is_any() {
            pos.check_streak[us.index()] = pos.check_streak[us.index()].saturating_add(1);
        } else {
            pos.check_streak[us.index()] = 0;
        }

        debug_assert_eq!(pos.key, pos.compute_keys().0);
        pos
    }

    /// 手番だけを渡した局面を返す（null move pruning用）
    ///
    /// 王手がかかっていない局面でのみ呼ぶこと。
    pub fn apply_null_move(&self) -> Position {
        debug_assert!(!self.in_check());
        let mut pos = self.clone();
        let us = pos.side_to_move;
        pos.side_to_move = !us;
        pos.key ^= ZOBRIST.side;
        pos.board_key ^= ZOBRIST.side;
        pos.game_ply += 1;
        pos.checkers = Bitboard::EMPTY;
        pos.check_streak[us.index()] = 0;
        pos
    }

    /// 指し手適用後のフルキー（置換表のプリフェッチ用）
    pub fn key_after(&self, mv: Move) -> u64 {
        let us = self.side_to_move;
        let mut key = self.key ^ ZOBRIST.side;

        if mv.is_drop() {
            let pt = mv.drop_piece_type();
            let count = self.hands[us.index()].count(pt);
            key ^= zobrist_hand(us, pt, count);
            key ^= zobrist_hand(us, pt, count - 1);
            key ^= zobrist_psq(Piece::new(us, pt), mv.to());
        } else {
            let from = mv.from();
            let to = mv.to();
            let pc = self.board[from.index()];
            let captured = self.board[to.index()];

            key ^= zobrist_psq(pc, from);
            if captured.is_some() {
                let upt = captured.piece_type().unpromote();
                let count = self.hands[us.index()].count(upt);
                key ^= zobrist_psq(captured, to);
                key ^= zobrist_hand(us, upt, count);
                key ^= zobrist_hand(us, upt, count + 1);
            }
            let placed = if mv.is_promote() {
                Piece::new(us, pc.piece_type().promote().expect("promotable piece"))
            } else {
                pc
            };
            key ^= zobrist_psq(placed, to);
        }

        key
    }

    // =========================================================================
    // 合法性
    // =========================================================================

    /// 擬似合法性の検査
    ///
    /// 駒の存在・利きの到達性・成りの選択・駒打ちの制約（二歩・行き所のない駒・
    /// 打ち歩詰め）を確認する。自玉の安全性は `is_legal` が担う。
    pub fn pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_none() {
            return false;
        }
        let us = self.side_to_move;
        let to = mv.to();

        if mv.is_drop() {
            let pt = mv.drop_piece_type();
            if !self.hands[us.index()].has(pt) {
                return false;
            }
            if self.board[to.index()].is_some() {
                return false;
            }
            let rel = to.relative_rank(us).index();
            match pt {
                PieceType::Pawn => {
                    if rel == 0 {
                        return false;
                    }
                    // 二歩
                    if (self.pieces(us, PieceType::Pawn) & FILE_BB[to.file().index()]).is_any() {
                        return false;
                    }
                    // 打ち歩詰め
                    if self.is_pawn_drop_mate(us, to) {
                        return false;
                    }
                }
                PieceType::Lance => {
                    if rel == 0 {
                        return false;
                    }
                }
                PieceType::Knight => {
                    if rel <= 1 {
                        return false;
                    }
                }
                _ => {}
            }
            return true;
        }

        let from = mv.from();
        let pc = self.board[from.index()];
        if pc.is_none() || pc.color() != us {
            return false;
        }
        let captured = self.board[to.index()];
        if captured.is_some() && captured.color() == us {
            return false;
        }
        if !attacks_from(pc.piece_type(), us, from, self.occupancy()).test(to) {
            return false;
        }

        let pt = pc.piece_type();
        if mv.is_promote() {
            if !pt.can_promote() {
                return false;
            }
            let zone = PROMO_ZONE[us.index()];
            if !zone.test(from) && !zone.test(to) {
                return false;
            }
        } else if Self::must_promote(pt, to, us) {
            return false;
        }

        true
    }

    /// 合法性の検査（擬似合法を仮定し、自玉の安全のみ確認する）
    pub fn is_legal(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let next = self.apply_move(mv);
        !next.is_attacked_by(next.king_square(us), next.occupancy(), !us)
    }

    /// 行き所のない駒になるか（成らずが許されない移動か）
    #[inline]
    pub(crate) fn must_promote(pt: PieceType, to: Square, us: Color) -> bool {
        let rel = to.relative_rank(us).index();
        match pt {
            PieceType::Pawn | PieceType::Lance => rel == 0,
            PieceType::Knight => rel <= 1,
            _ => false,
        }
    }

    /// 打ち歩詰めの判定
    ///
    /// `to` への歩打ちが相手玉への王手になり、かつ相手に応手がない場合にtrue。
    /// 歩はまだ盤上に置かれていないため、占有ビットだけを合成して判定する。
    pub(crate) fn is_pawn_drop_mate(&self, us: Color, to: Square) -> bool {
        let them = !us;
        let ksq = self.king_square(them);

        // 王手にならなければ無関係
        if !pawn_attacks(us, to).test(ksq) {
            return false;
        }

        let to_bb = Bitboard::from_square(to);
        let occ_after = self.occupancy() | to_bb;

        // 1) 玉以外の駒で歩を取れるか（取った後に自玉が素抜かれないこと）
        let defenders =
            self.attackers_to(to, occ_after, them) & !self.pieces(them, PieceType::King);
        for def_sq in defenders {
            // 取った駒はtoに移る。占有は def_sq が空き、to は埋まったまま。
            let occ2 = (occ_after ^ Bitboard::from_square(def_sq)) | to_bb;
            if !self.is_attacked_by(ksq, occ2, us) {
                return false;
            }
        }

        // 2) 玉自身が歩を取れるか（toが守られていなければ取れる）
        let occ_no_king = occ_after ^ Bitboard::from_square(ksq);
        if !self.is_attacked_by(to, occ_no_king | to_bb, us) {
            return false;
        }

        // 3) 玉の逃げ場所があるか
        let escapes = king_attacks(ksq) & !self.pieces_of(them) & !to_bb;
        for esc in escapes {
            let occ3 = (occ_no_king | Bitboard::from_square(esc)) & !Bitboard::from_square(ksq);
            if !self.is_attacked_by(esc, occ3, us) {
                return false;
            }
        }

        true
    }

    // =========================================================================
    // 千日手・入玉宣言
    // =========================================================================

    /// 千日手の判定
    ///
    /// 履歴中の同一キー出現数を数え、`limit` 回目（自身を含む）に達したら
    /// 判定を返す。直前に指した側（手番の相手）が反復の全区間で王手を
    /// かけ続けていた場合は連続王手の千日手でその側の反則負け（= `Win`）。
    ///
    /// `allow_hand_superset` が真のときは、盤面キーが一致し手番側の手駒が
    /// 上位集合である局面（優等局面）も出現として数える。
    pub fn test_sennichite(
        &self,
        allow_hand_superset: bool,
        history: &[KeyRecord],
        limit: u32,
    ) -> SennichiteStatus {
        debug_assert!(limit >= 2);

        let stm_hand = self.hands[self.side_to_move.index()];
        let mut count = 1u32; // 現局面を含む
        let mut span = 0usize;

        for (i, rec) in history.iter().enumerate().rev() {
            let exact = rec.key == self.key;
            let superset = allow_hand_superset
                && !exact
                && rec.board_key == self.board_key
                && stm_hand.is_superior_or_equal(rec.hand);
            if exact || superset {
                count += 1;
                span = history.len() - i;
                if count >= limit {
                    // 直前に指した側の連続王手が反復区間を覆っていれば反則
                    let mover = !self.side_to_move;
                    let streak = self.check_streak[mover.index()] as usize;
                    return if streak * 2 >= span {
                        SennichiteStatus::Win
                    } else {
                        SennichiteStatus::Draw
                    };
                }
            }
        }

        SennichiteStatus::None
    }

    /// 入玉宣言勝ち（27点法）の判定
    ///
    /// - 手番側の玉が敵陣にいる
    /// - 王手がかかっていない
    /// - 玉を除き敵陣に10枚以上の駒がある
    /// - 点数（飛角馬龍とその持駒は5点、他は1点、玉は0点）が
    ///   先手28点・後手27点以上
    pub fn is_entering_kings_win(&self) -> bool {
        let us = self.side_to_move;
        let zone = PROMO_ZONE[us.index()];

        if !zone.test(self.king_square(us)) {
            return false;
        }
        if self.in_check() {
            return false;
        }

        let in_zone = (self.pieces_of(us) & zone) & !self.pieces(us, PieceType::King);
        if in_zone.popcount() < 10 {
            return false;
        }

        let bigs = self.piece_bb[PieceType::Bishop.index()]
            | self.piece_bb[PieceType::Rook.index()]
            | self.piece_bb[PieceType::Horse.index()]
            | self.piece_bb[PieceType::Dragon.index()];

        let big_count = (in_zone & bigs).popcount();
        let small_count = in_zone.popcount() - big_count;

        let hand = self.hands[us.index()];
        let hand_big = hand.count(PieceType::Bishop) + hand.count(PieceType::Rook);
        let hand_small = hand.count(PieceType::Pawn)
            + hand.count(PieceType::Lance)
            + hand.count(PieceType::Knight)
            + hand.count(PieceType::Silver)
            + hand.count(PieceType::Gold);

        let points = 5 * (big_count + hand_big) + small_count + hand_small;
        let threshold = match us {
            Color::Black => 28,
            Color::White => 27,
        };

        points >= threshold
    }

    // =========================================================================
    // 内部更新
    // =========================================================================

    fn put_piece(&mut self, pc: Piece, sq: Square) {
        debug_assert!(self.board[sq.index()].is_none());
        self.board[sq.index()] = pc;
        self.piece_bb[pc.piece_type().index()].set(sq);
        self.color_bb[pc.color().index()].set(sq);
        self.xor_piece_keys(pc, sq);
    }

    fn remove_piece(&mut self, pc: Piece, sq: Square) {
        debug_assert_eq!(self.board[sq.index()], pc);
        self.board[sq.index()] = Piece::NONE;
        self.piece_bb[pc.piece_type().index()].clear(sq);
        self.color_bb[pc.color().index()].clear(sq);
        self.xor_piece_keys(pc, sq);
    }

    /// (駒, 升) のハッシュを全キーに反映する
    fn xor_piece_keys(&mut self, pc: Piece, sq: Square) {
        let h = zobrist_psq(pc, sq);
        self.key ^= h;
        self.board_key ^= h;
        match pc.piece_type() {
            PieceType::Pawn => self.pawn_key ^= h,
            PieceType::Lance | PieceType::Knight => self.cavalry_key ^= h,
            PieceType::Gold | PieceType::Silver => self.castle_key ^= h,
            PieceType::King => {
                self.castle_key ^= h;
                self.hand_key ^= h;
            }
            _ => {}
        }
    }

    fn add_hand(&mut self, c: Color, pt: PieceType) {
        let count = self.hands[c.index()].count(pt);
        let h = zobrist_hand(c, pt, count) ^ zobrist_hand(c, pt, count + 1);
        self.key ^= h;
        self.hand_key ^= h;
        self.hands[c.index()] = self.hands[c.index()].add(pt);
    }

    fn sub_hand(&mut self, c: Color, pt: PieceType) {
        let count = self.hands[c.index()].count(pt);
        debug_assert!(count > 0);
        let h = zobrist_hand(c, pt, count) ^ zobrist_hand(c, pt, count - 1);
        self.key ^= h;
        self.hand_key ^= h;
        self.hands[c.index()] = self.hands[c.index()].sub(pt);
    }

    /// キーを全計算する（検証・初期化用）
    ///
    /// 戻り値は (key, board_key, pawn, cavalry, castle, hand)。
    pub fn compute_keys(&self) -> (u64, u64, u64, u64, u64, u64) {
        let mut key = 0u64;
        let mut board_key = 0u64;
        let mut pawn = 0u64;
        let mut cavalry = 0u64;
        let mut castle = 0u64;
        let mut hand_k = 0u64;

        for sq in Square::all() {
            let pc = self.board[sq.index()];
            if pc.is_none() {
                continue;
            }
            let h = zobrist_psq(pc, sq);
            key ^= h;
            board_key ^= h;
            match pc.piece_type() {
                PieceType::Pawn => pawn ^= h,
                PieceType::Lance | PieceType::Knight => cavalry ^= h,
                PieceType::Gold | PieceType::Silver => castle ^= h,
                PieceType::King => {
                    castle ^= h;
                    hand_k ^= h;
                }
                _ => {}
            }
        }

        for c in [Color::Black, Color::White] {
            for pt in PieceType::HAND_PIECES {
                let count = self.hands[c.index()].count(pt);
                let h = zobrist_hand(c, pt, count);
                key ^= h;
                hand_k ^= h;
            }
        }

        if self.side_to_move == Color::White {
            key ^= ZOBRIST.side;
            board_key ^= ZOBRIST.side;
        }

        (key, board_key, pawn, cavalry, castle, hand_k)
    }

    /// SFEN読み込み後などに全キーと王手情報を初期化する
    pub(crate) fn refresh_derived_state(&mut self) {
        let (key, board_key, pawn, cavalry, castle, hand_k) = self.compute_keys();
        self.key = key;
        self.board_key = board_key;
        self.pawn_key = pawn;
        self.cavalry_key = cavalry;
        self.castle_key = castle;
        self.hand_key = hand_k;
        self.checkers = self.attackers_to(
            self.king_square(self.side_to_move),
            self.occupancy(),
            !self.side_to_move,
        );
        self.check_streak = [0; Color::NUM];
    }

    pub(crate) fn set_board_piece(&mut self, pc: Piece, sq: Square) {
        self.board[sq.index()] = pc;
        self.piece_bb[pc.piece_type().index()].set(sq);
        self.color_bb[pc.color().index()].set(sq);
    }

    pub(crate) fn set_hand_count(&mut self, c: Color, pt: PieceType, count: u32) {
        self.hands[c.index()] = self.hands[c.index()].set(pt, count);
    }

    pub(crate) fn set_side_to_move(&mut self, c: Color) {
        self.side_to_move = c;
    }

    pub(crate) fn set_game_ply(&mut self, ply: u32) {
        self.game_ply = ply;
    }
}
