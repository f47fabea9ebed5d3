//! 置換表本体
//!
//! バケツ（64バイト = 4エントリ）のオープンアドレステーブル。
//! インデックスは乗算シフト法 `(key * buckets) >> 64`。
//!
//! # 並行性
//! probe/putはrelaxedアトミックのみで動作し、ロックを取らない。
//! `resize` / `finalize` / `clear` は探索が走っていない間にのみ
//! 呼び出すこと（プロトコル層がこの規律を守る）。

use std::cell::{Cell, UnsafeCell};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::{Bound, Move, Value};

use super::entry::{TTData, TTEntry};
use super::{value_from_tt, value_to_tt, BUCKET_SIZE, GENERATION_DELTA};

/// 1キャッシュラインぶんのバケツ
#[repr(C, align(64))]
struct Bucket {
    entries: [TTEntry; BUCKET_SIZE],
}

const _: () = assert!(std::mem::size_of::<Bucket>() == 64);

impl Bucket {
    fn new() -> Bucket {
        Bucket {
            entries: [TTEntry::new(), TTEntry::new(), TTEntry::new(), TTEntry::new()],
        }
    }
}

/// 置換表
pub struct TranspositionTable {
    table: UnsafeCell<Box<[Bucket]>>,
    /// サイズ変更の遅延適用（MiB）。`finalize`が消費する。
    pending_mib: Cell<Option<usize>>,
    generation8: AtomicU8,
}

// SAFETY: probe/putはアトミック操作のみ。テーブルの差し替え（resize/finalize/
// clear）は探索停止中にのみ行うという規律を上位層が守る。
unsafe impl Sync for TranspositionTable {}
unsafe impl Send for TranspositionTable {}

impl TranspositionTable {
    /// 新しい置換表（確保は`finalize`まで遅延する）
    pub fn new(mib: usize) -> TranspositionTable {
        TranspositionTable {
            table: UnsafeCell::new(Vec::new().into_boxed_slice()),
            pending_mib: Cell::new(Some(mib)),
            generation8: AtomicU8::new(0),
        }
    }

    /// サイズ変更を予約する（次の`finalize`で適用）
    pub fn resize(&self, mib: usize) {
        self.pending_mib.set(Some(mib));
    }

    /// 遅延されたサイズ変更を適用する
    ///
    /// 実際に確保・ゼロ化を行った場合にtrueを返す（呼び出し側が
    /// 遅延を報告できるように）。
    pub fn finalize(&self) -> bool {
        let Some(mib) = self.pending_mib.take() else {
            return false;
        };
        let bucket_count = (mib * 1024 * 1024 / std::mem::size_of::<Bucket>()).max(1);

        let buckets: Vec<Bucket> = (0..bucket_count).map(|_| Bucket::new()).collect();
        // SAFETY: finalizeは探索停止中にのみ呼ばれる
        unsafe {
            *self.table.get() = buckets.into_boxed_slice();
        }
        self.generation8.store(0, Ordering::Relaxed);
        true
    }

    fn buckets(&self) -> &[Bucket] {
        // SAFETY: 差し替えは探索停止中のみ。探索中は不変の参照として扱える。
        unsafe { &*self.table.get() }
    }

    /// クリア（並列ゼロ化）
    pub fn clear(&self) {
        self.generation8.store(0, Ordering::Relaxed);
        let buckets = self.buckets();
        let len = buckets.len();
        if len == 0 {
            return;
        }

        let threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        if threads <= 1 || len < threads * 1024 {
            for bucket in buckets {
                for entry in &bucket.entries {
                    entry.clear();
                }
            }
            return;
        }

        let chunk = len.div_ceil(threads);
        std::thread::scope(|scope| {
            for part in buckets.chunks(chunk) {
                scope.spawn(move || {
                    for bucket in part {
                        for entry in &bucket.entries {
                            entry.clear();
                        }
                    }
                });
            }
        });
    }

    /// 新しい探索の開始（世代を進める）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    #[inline]
    fn bucket_index(&self, key: u64) -> usize {
        let count = self.buckets().len();
        ((key as u128 * count as u128) >> 64) as usize
    }

    /// 置換表を検索する
    ///
    /// ヒットした場合、詰みスコアはply補正済みで返る。
    pub fn probe(&self, key: u64, ply: i32) -> Option<TTData> {
        let buckets = self.buckets();
        if buckets.is_empty() {
            return None;
        }
        let bucket = &buckets[self.bucket_index(key)];

        for entry in &bucket.entries {
            if let Some(mut data) = entry.read(key) {
                data.value = value_from_tt(data.value, ply);
                return Some(data);
            }
        }
        None
    }

    /// エントリを書き込む
    ///
    /// 同一局面のエントリがあればそれを使う。ただし既存の方が深く、
    /// かつ今の世代のものは、統計（世代）だけ更新して本体を残す。
    /// 空きがなければ最も古い世代（同率なら最浅）のエントリを置き換える。
    #[allow(clippy::too_many_arguments)]
    pub fn put(
        &self,
        key: u64,
        value: Value,
        eval: Value,
        mv: Move,
        depth: i32,
        ply: i32,
        bound: Bound,
    ) {
        let buckets = self.buckets();
        if buckets.is_empty() {
            return;
        }
        let bucket = &buckets[self.bucket_index(key)];
        let gen8 = self.generation();

        // exact値は少し深めに記録して残りやすくする
        let store_depth =
            (depth + if bound == Bound::Exact { 2 } else { 0 }).clamp(0, 255) as u8;
        let store_value = value_to_tt(value, ply);

        // 同一局面のエントリを探す
        for entry in &bucket.entries {
            if entry.matches(key) {
                if entry.depth8() > store_depth && entry.relative_age(gen8) == 0 {
                    entry.refresh_generation(gen8);
                } else {
                    entry.save(key, store_value, eval, mv, store_depth, bound, gen8);
                }
                return;
            }
        }

        // 置き換え候補: 世代が最も古く、同率なら最も浅いもの
        let mut victim = &bucket.entries[0];
        let mut victim_rank = (victim.relative_age(gen8) as i32, -(victim.depth8() as i32));
        for entry in &bucket.entries[1..] {
            if !entry.is_occupied() {
                victim = entry;
                break;
            }
            let rank = (entry.relative_age(gen8) as i32, -(entry.depth8() as i32));
            if rank > victim_rank {
                victim = entry;
                victim_rank = rank;
            }
        }

        victim.save(key, store_value, eval, mv, store_depth, bound, gen8);
    }

    /// 使用率（千分率）。先頭1000バケツのサンプリング。
    pub fn hashfull(&self) -> u32 {
        let buckets = self.buckets();
        let sample = buckets.len().min(1000);
        if sample == 0 {
            return 0;
        }
        let gen8 = self.generation();
        let mut count = 0u32;
        for bucket in &buckets[..sample] {
            for entry in &bucket.entries {
                if entry.is_occupied() && entry.relative_age(gen8) == 0 {
                    count += 1;
                }
            }
        }
        count * 1000 / (sample as u32 * BUCKET_SIZE as u32)
    }

    /// バケツのプリフェッチ
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let buckets = self.buckets();
        if buckets.is_empty() {
            return;
        }
        let bucket = &buckets[self.bucket_index(key)];

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::_mm_prefetch;
            _mm_prefetch(bucket as *const _ as *const i8, 3); // _MM_HINT_T0
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = bucket;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalized_tt(mib: usize) -> TranspositionTable {
        let tt = TranspositionTable::new(mib);
        assert!(tt.finalize());
        tt
    }

    #[test]
    fn test_tt_put_probe_round_trip() {
        let tt = finalized_tt(1);
        let key = 0xFEED_FACE_CAFE_BEEFu64;
        let mv = Move::from_usi("7g7f").unwrap();

        assert!(tt.probe(key, 0).is_none());
        tt.put(key, Value::new(77), Value::new(33), mv, 9, 0, Bound::Exact);

        let data = tt.probe(key, 0).expect("must hit");
        assert_eq!(data.value, Value::new(77));
        assert_eq!(data.eval, Value::new(33));
        assert_eq!(data.mv, mv);
        // exactボーナスで+2深く記録される
        assert_eq!(data.depth, 11);
        assert_eq!(data.bound, Bound::Exact);
    }

    #[test]
    fn test_tt_mate_score_ply_adjustment() {
        let tt = finalized_tt(1);
        let key = 0x1111_2222_3333_4444u64;
        // ply=4で「7手詰め」を保存 → ply=2で読むと5手詰め相当に見える
        tt.put(key, Value::mate_in(7), Value::NONE, Move::NONE, 5, 4, Bound::Exact);
        let data = tt.probe(key, 4).unwrap();
        assert_eq!(data.value, Value::mate_in(7));
        let data = tt.probe(key, 2).unwrap();
        assert_eq!(data.value.raw(), Value::mate_in(7).raw() + 2);
    }

    #[test]
    fn test_tt_finalize_is_idempotent() {
        let tt = TranspositionTable::new(1);
        assert!(tt.finalize());
        assert!(!tt.finalize());
        tt.resize(2);
        assert!(tt.finalize());
    }

    #[test]
    fn test_tt_clear() {
        let tt = finalized_tt(1);
        let key = 99u64;
        tt.put(key, Value::new(1), Value::ZERO, Move::NONE, 3, 0, Bound::Lower);
        assert!(tt.probe(key, 0).is_some());
        tt.clear();
        assert!(tt.probe(key, 0).is_none());
    }

    #[test]
    fn test_tt_probe_before_finalize_is_miss() {
        let tt = TranspositionTable::new(1);
        tt.put(1, Value::new(1), Value::ZERO, Move::NONE, 3, 0, Bound::Lower);
        assert!(tt.probe(1, 0).is_none());
    }

    #[test]
    fn test_tt_generation_cycles() {
        let tt = finalized_tt(1);
        for _ in 0..300 {
            tt.new_search();
        }
        // u8でラップしても世代は常に4の倍数
        assert_eq!(tt.generation() % GENERATION_DELTA, 0);
    }
}
