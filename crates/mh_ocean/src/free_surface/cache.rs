// crates/mh_ocean/src/free_surface/cache.rs

//! 算子缓存状态机
//!
//! 两个状态：
//!
//! - `Uninitialized`: 尚未构建算子
//! - `Built { dt, g }`: 当前算子对应的时间步长与重力
//!
//! 唯一的转移规则：请求的 (Δt, g) 与缓存不完全相等时算子过期，
//! 重建后无条件记录新值。比较为精确比较，NaN 永远过期。

use mh_runtime::RuntimeScalar;

/// 缓存的时间步长
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CachedTimeStep<S: RuntimeScalar> {
    /// 尚未构建
    #[default]
    Uninitialized,
    /// 已为 (dt, g) 构建
    Built {
        /// 时间步长
        dt: S,
        /// 重力加速度
        g: S,
    },
}

impl<S: RuntimeScalar> CachedTimeStep<S> {
    /// 缓存的时间步长
    pub fn dt(&self) -> Option<S> {
        match *self {
            Self::Uninitialized => None,
            Self::Built { dt, .. } => Some(dt),
        }
    }
}

/// 算子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStatus {
    /// 算子可直接复用
    Current,
    /// 需要重建
    Stale,
}

/// 算子缓存
#[derive(Debug, Clone, Default)]
pub struct OperatorCache<S: RuntimeScalar> {
    state: CachedTimeStep<S>,
    rebuilds: usize,
}

impl<S: RuntimeScalar> OperatorCache<S> {
    /// 创建未初始化缓存
    pub fn new() -> Self {
        Self {
            state: CachedTimeStep::Uninitialized,
            rebuilds: 0,
        }
    }

    /// 查询 (dt, g) 下的算子状态
    pub fn status(&self, dt: S, g: S) -> OperatorStatus {
        match self.state {
            CachedTimeStep::Built {
                dt: cached_dt,
                g: cached_g,
            } if cached_dt == dt && cached_g == g => OperatorStatus::Current,
            _ => OperatorStatus::Stale,
        }
    }

    /// 记录一次重建
    pub fn record_rebuild(&mut self, dt: S, g: S) {
        self.state = CachedTimeStep::Built { dt, g };
        self.rebuilds += 1;
    }

    /// 当前状态
    pub fn state(&self) -> CachedTimeStep<S> {
        self.state
    }

    /// 重建次数
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }
}
