//! 探索制限（リミッタ）
//!
//! - `stop_soft`: 反復深化のイテレーション間で問い合わせる。
//!   最善手が安定していれば早めに切り上げてよい。
//! - `stop_hard`: 探索木の内部で問い合わせる。絶対の締め切り。
//!
//! 時間・ノード数・固定思考時間の各リミッタと、それらを束ねる
//! `CompoundLimiter` を提供する。深さ制限は反復深化の上限として
//! 別途渡す。

use std::time::{Duration, Instant};

use crate::types::{Depth, Move};

/// 探索リミッタ
pub trait SearchLimiter: Send {
    /// 反復深化の各イテレーション完了時に呼ばれる
    fn update(&mut self, _depth: Depth, _best_move: Move) {}

    /// イテレーション間の停止判定
    fn stop_soft(&mut self, nodes: u64) -> bool;

    /// 探索中の停止判定（ハードリミット）
    fn stop_hard(&mut self, nodes: u64) -> bool;
}

/// 複数のリミッタの合成（いずれかが停止を求めたら停止）
#[derive(Default)]
pub struct CompoundLimiter {
    limiters: Vec<Box<dyn SearchLimiter>>,
}

impl CompoundLimiter {
    pub fn new() -> CompoundLimiter {
        CompoundLimiter { limiters: Vec::new() }
    }

    pub fn add(&mut self, limiter: Box<dyn SearchLimiter>) {
        self.limiters.push(limiter);
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl SearchLimiter for CompoundLimiter {
    fn update(&mut self, depth: Depth, best_move: Move) {
        for limiter in &mut self.limiters {
            limiter.update(depth, best_move);
        }
    }

    fn stop_soft(&mut self, nodes: u64) -> bool {
        self.limiters.iter_mut().any(|l| l.stop_soft(nodes))
    }

    fn stop_hard(&mut self, nodes: u64) -> bool {
        self.limiters.iter_mut().any(|l| l.stop_hard(nodes))
    }
}

/// ノード数の上限
pub struct NodeLimiter {
    max_nodes: u64,
}

impl NodeLimiter {
    pub fn new(max_nodes: u64) -> NodeLimiter {
        NodeLimiter { max_nodes }
    }
}

impl SearchLimiter for NodeLimiter {
    fn stop_soft(&mut self, nodes: u64) -> bool {
        self.stop_hard(nodes)
    }

    fn stop_hard(&mut self, nodes: u64) -> bool {
        nodes >= self.max_nodes
    }
}

/// ソフト/ハードのノード数ペア
///
/// ソフト側に達したらイテレーション間で停止し、ハード側は木の中でも守る。
pub struct SoftNodeLimiter {
    opt_nodes: u64,
    max_nodes: u64,
}

impl SoftNodeLimiter {
    pub fn new(opt_nodes: u64, max_nodes: u64) -> SoftNodeLimiter {
        SoftNodeLimiter {
            opt_nodes: opt_nodes.min(max_nodes),
            max_nodes,
        }
    }
}

impl SearchLimiter for SoftNodeLimiter {
    fn stop_soft(&mut self, nodes: u64) -> bool {
        nodes >= self.opt_nodes
    }

    fn stop_hard(&mut self, nodes: u64) -> bool {
        nodes >= self.max_nodes
    }
}

/// 固定思考時間（movetime）
pub struct MoveTimeLimiter {
    start: Instant,
    max_time: Duration,
}

impl MoveTimeLimiter {
    pub fn new(start: Instant, max_time: Duration) -> MoveTimeLimiter {
        MoveTimeLimiter { start, max_time }
    }
}

impl SearchLimiter for MoveTimeLimiter {
    fn stop_soft(&mut self, _nodes: u64) -> bool {
        self.start.elapsed() >= self.max_time
    }

    fn stop_hard(&mut self, _nodes: u64) -> bool {
        self.start.elapsed() >= self.max_time
    }
}

/// 持ち時間の内訳
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeLimits {
    pub remaining_ms: u64,
    pub increment_ms: u64,
    pub byoyomi_ms: u64,
}

/// 持ち時間からソフト/ハードの配分を決めるリミッタ
///
/// 秒読みは毎手保証されるものとして配分に加える。最善手が安定して
/// いればソフト側を縮め、直近で入れ替わっていれば延ばす。
pub struct TimeManager {
    start: Instant,
    opt_time: Duration,
    max_time: Duration,
    scale: f64,
    last_best: Move,
    stable_iterations: u32,
}

const MOVE_OVERHEAD_MS: u64 = 10;

impl TimeManager {
    pub fn new(start: Instant, limits: TimeLimits) -> TimeManager {
        let remaining = limits.remaining_ms.saturating_sub(MOVE_OVERHEAD_MS);
        let usable_max = remaining + limits.byoyomi_ms.saturating_sub(MOVE_OVERHEAD_MS);

        let alloc = remaining / 20 + limits.increment_ms / 2
            + limits.byoyomi_ms.saturating_sub(MOVE_OVERHEAD_MS);
        let max_time = alloc.min(usable_max).max(1);
        let opt_time = (max_time * 6 / 10).max(1);

        TimeManager {
            start,
            opt_time: Duration::from_millis(opt_time),
            max_time: Duration::from_millis(max_time),
            scale: 1.0,
            last_best: Move::NONE,
            stable_iterations: 0,
        }
    }
}

impl SearchLimiter for TimeManager {
    fn update(&mut self, _depth: Depth, best_move: Move) {
        if best_move == self.last_best {
            self.stable_iterations += 1;
        } else {
            self.stable_iterations = 0;
            self.last_best = best_move;
        }
        // 安定していれば切り上げを早め、直近で入れ替わったら少し粘る
        self.scale = match self.stable_iterations {
            0 => 1.3,
            1 => 1.0,
            2 => 0.9,
            _ => 0.8,
        };
    }

    fn stop_soft(&mut self, _nodes: u64) -> bool {
        let budget = self.opt_time.mul_f64(self.scale).min(self.max_time);
        self.start.elapsed() >= budget
    }

    fn stop_hard(&mut self, _nodes: u64) -> bool {
        self.start.elapsed() >= self.max_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_limiter() {
        let mut limiter = NodeLimiter::new(1000);
        assert!(!limiter.stop_hard(999));
        assert!(limiter.stop_hard(1000));
        assert!(limiter.stop_soft(1000));
    }

    #[test]
    fn test_soft_node_limiter() {
        let mut limiter = SoftNodeLimiter::new(100, 1000);
        assert!(limiter.stop_soft(100));
        assert!(!limiter.stop_hard(100));
        assert!(limiter.stop_hard(1000));
    }

    #[test]
    fn test_move_time_limiter() {
        let mut limiter =
            MoveTimeLimiter::new(Instant::now(), Duration::from_millis(0));
        assert!(limiter.stop_hard(0));

        let mut limiter =
            MoveTimeLimiter::new(Instant::now(), Duration::from_secs(3600));
        assert!(!limiter.stop_hard(0));
    }

    #[test]
    fn test_compound_limiter_any_stops() {
        let mut limiter = CompoundLimiter::new();
        limiter.add(Box::new(NodeLimiter::new(u64::MAX)));
        limiter.add(Box::new(NodeLimiter::new(10)));
        assert!(limiter.stop_hard(10));
        assert!(!limiter.stop_hard(9));
    }

    #[test]
    fn test_time_manager_allocation_bounds() {
        // 残り10秒+加算1秒: maxは残り時間以内
        let tm = TimeManager::new(
            Instant::now(),
            TimeLimits { remaining_ms: 10_000, increment_ms: 1_000, byoyomi_ms: 0 },
        );
        assert!(tm.max_time <= Duration::from_millis(10_000));
        assert!(tm.opt_time <= tm.max_time);

        // 秒読みのみ: 秒読み時間の範囲で使う
        let tm = TimeManager::new(
            Instant::now(),
            TimeLimits { remaining_ms: 0, increment_ms: 0, byoyomi_ms: 3_000 },
        );
        assert!(tm.max_time <= Duration::from_millis(3_000));
        assert!(tm.max_time >= Duration::from_millis(1_000));
    }
}
