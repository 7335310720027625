// crates/mh_ocean/src/engine/parallel.rs

//! 逐单元核函数并行执行
//!
//! 核函数 `Fn(i, j) -> S` 只读外部数据，结果写入目标场的 (i, j)，
//! 不同点之间互不写入，因此按存储行切分后可直接交给 rayon。
//! `launch` 返回时所有工作线程已完成，之后的 halo 填充能看到全部结果。
//!
//! 未启用 `parallel` 特性时所有策略退化为串行。

use std::sync::atomic::{AtomicU64, Ordering};

use mh_config::ParallelSettings;
use mh_runtime::RuntimeScalar;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::field::Field2D;

// ============================================================
// 配置
// ============================================================

/// 并行策略
///
/// - `Sequential`: 完全串行
/// - `Parallel`: 始终按行并行
/// - `Auto`: 内部点数达到 `min_parallel_size` 时并行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParallelStrategy {
    /// 串行执行
    Sequential,
    /// 按存储行并行
    Parallel,
    /// 自动选择（根据问题规模）
    #[default]
    Auto,
}

/// 执行统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchMetrics {
    /// 总启动次数
    pub launches: u64,
    /// 并行启动次数
    pub parallel_launches: u64,
    /// 处理的内部点总数
    pub points: u64,
}

// ============================================================
// 核函数启动器
// ============================================================

/// 核函数启动器
#[derive(Debug)]
pub struct KernelLauncher {
    strategy: ParallelStrategy,
    min_parallel_size: usize,
    launches: AtomicU64,
    parallel_launches: AtomicU64,
    points: AtomicU64,
}

impl Default for KernelLauncher {
    fn default() -> Self {
        Self::new(ParallelStrategy::Auto, ParallelSettings::default().min_parallel_size)
    }
}

impl Clone for KernelLauncher {
    /// 复制配置，统计清零
    fn clone(&self) -> Self {
        Self::new(self.strategy, self.min_parallel_size)
    }
}

impl KernelLauncher {
    /// 创建启动器
    pub fn new(strategy: ParallelStrategy, min_parallel_size: usize) -> Self {
        Self {
            strategy,
            min_parallel_size,
            launches: AtomicU64::new(0),
            parallel_launches: AtomicU64::new(0),
            points: AtomicU64::new(0),
        }
    }

    /// 串行启动器
    pub fn sequential() -> Self {
        Self::new(ParallelStrategy::Sequential, usize::MAX)
    }

    /// 从配置创建
    pub fn from_settings(settings: &ParallelSettings) -> Self {
        let strategy = if settings.enabled {
            ParallelStrategy::Auto
        } else {
            ParallelStrategy::Sequential
        };
        Self::new(strategy, settings.min_parallel_size)
    }

    /// 创建构建器
    pub fn builder() -> KernelLauncherBuilder {
        KernelLauncherBuilder::default()
    }

    /// 并行策略
    pub fn strategy(&self) -> ParallelStrategy {
        self.strategy
    }

    /// 最小并行点数
    pub fn min_parallel_size(&self) -> usize {
        self.min_parallel_size
    }

    /// 给定点数是否走并行路径
    pub fn is_parallel_for(&self, n_points: usize) -> bool {
        if !cfg!(feature = "parallel") {
            return false;
        }
        match self.strategy {
            ParallelStrategy::Sequential => false,
            ParallelStrategy::Parallel => true,
            ParallelStrategy::Auto => n_points >= self.min_parallel_size,
        }
    }

    /// 对场的每个内部点求值 `field(i, j) = kernel(i, j)`
    ///
    /// halo 不变，调用方随后负责填充。
    pub fn launch<S, F>(&self, field: &mut Field2D<S>, kernel: F)
    where
        S: RuntimeScalar,
        F: Fn(isize, isize) -> S + Sync,
    {
        let (ex, ey) = field.interior_extent();
        let n_points = ex * ey;
        let parallel = self.is_parallel_for(n_points);

        if parallel {
            self.launch_parallel(field, &kernel);
        } else {
            Self::launch_serial(field, &kernel);
        }

        self.launches.fetch_add(1, Ordering::Relaxed);
        self.points.fetch_add(n_points as u64, Ordering::Relaxed);
        if parallel {
            self.parallel_launches.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn launch_serial<S, F>(field: &mut Field2D<S>, kernel: &F)
    where
        S: RuntimeScalar,
        F: Fn(isize, isize) -> S,
    {
        let (ex, ey) = field.interior_extent();
        for j in 0..ey as isize {
            for i in 0..ex as isize {
                field.set(i, j, kernel(i, j));
            }
        }
    }

    #[cfg(feature = "parallel")]
    fn launch_parallel<S, F>(&self, field: &mut Field2D<S>, kernel: &F)
    where
        S: RuntimeScalar,
        F: Fn(isize, isize) -> S + Sync,
    {
        let (ex, ey) = field.interior_extent();
        let (hx, hy) = field.halo();
        let row_len = field.row_len();

        field
            .data_mut()
            .par_chunks_mut(row_len)
            .enumerate()
            .skip(hy)
            .take(ey)
            .for_each(|(row, cells)| {
                let j = (row - hy) as isize;
                for (i, cell) in cells[hx..hx + ex].iter_mut().enumerate() {
                    *cell = kernel(i as isize, j);
                }
            });
    }

    #[cfg(not(feature = "parallel"))]
    fn launch_parallel<S, F>(&self, field: &mut Field2D<S>, kernel: &F)
    where
        S: RuntimeScalar,
        F: Fn(isize, isize) -> S + Sync,
    {
        Self::launch_serial(field, kernel);
    }

    /// 当前统计
    pub fn metrics(&self) -> LaunchMetrics {
        LaunchMetrics {
            launches: self.launches.load(Ordering::Relaxed),
            parallel_launches: self.parallel_launches.load(Ordering::Relaxed),
            points: self.points.load(Ordering::Relaxed),
        }
    }

    /// 重置统计
    pub fn reset_metrics(&self) {
        self.launches.store(0, Ordering::Relaxed);
        self.parallel_launches.store(0, Ordering::Relaxed);
        self.points.store(0, Ordering::Relaxed);
    }
}

/// 启动器构建器
#[derive(Debug, Clone)]
pub struct KernelLauncherBuilder {
    strategy: ParallelStrategy,
    min_parallel_size: usize,
}

impl Default for KernelLauncherBuilder {
    fn default() -> Self {
        Self {
            strategy: ParallelStrategy::Auto,
            min_parallel_size: ParallelSettings::default().min_parallel_size,
        }
    }
}

impl KernelLauncherBuilder {
    /// 设置策略
    pub fn strategy(mut self, strategy: ParallelStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// 设置最小并行点数
    pub fn min_parallel_size(mut self, size: usize) -> Self {
        self.min_parallel_size = size;
        self
    }

    /// 构建
    pub fn build(self) -> KernelLauncher {
        KernelLauncher::new(self.strategy, self.min_parallel_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Location, Topology};

    fn field(nx: usize, ny: usize, loc: (Location, Location)) -> Field2D<f64> {
        Field2D::with_layout(nx, ny, (2, 1), (Topology::Bounded, Topology::Periodic), loc)
    }

    #[test]
    fn test_builder() {
        let launcher = KernelLauncher::builder()
            .strategy(ParallelStrategy::Sequential)
            .min_parallel_size(10)
            .build();
        assert_eq!(launcher.strategy(), ParallelStrategy::Sequential);
        assert!(!launcher.is_parallel_for(1_000_000));
    }

    #[test]
    fn test_from_settings() {
        let settings = ParallelSettings {
            enabled: false,
            min_parallel_size: 1,
        };
        assert_eq!(
            KernelLauncher::from_settings(&settings).strategy(),
            ParallelStrategy::Sequential
        );
    }

    #[test]
    fn test_parallel_matches_serial() {
        let loc = (Location::Face, Location::Center);
        let kernel = |i: isize, j: isize| (i * 31 + j * 7) as f64 * 0.5;

        let mut a = field(13, 9, loc);
        let mut b = field(13, 9, loc);
        a.fill(-1.0);
        b.fill(-1.0);
        KernelLauncher::sequential().launch(&mut a, kernel);
        KernelLauncher::new(ParallelStrategy::Parallel, 0).launch(&mut b, kernel);

        assert_eq!(a, b);
        // 有界 Face 方向第 N 个点也被写入
        assert_eq!(a.get(13, 8), (13 * 31 + 8 * 7) as f64 * 0.5);
        // halo 不被写入
        assert_eq!(a.get(-1, 0), -1.0);
        assert_eq!(a.get(0, -1), -1.0);
    }

    #[test]
    fn test_metrics() {
        let launcher = KernelLauncher::new(ParallelStrategy::Auto, 50);
        let mut small = field(4, 4, (Location::Center, Location::Center));
        let mut large = field(10, 10, (Location::Center, Location::Center));
        launcher.launch(&mut small, |_, _| 1.0);
        launcher.launch(&mut large, |_, _| 1.0);

        let m = launcher.metrics();
        assert_eq!(m.launches, 2);
        assert_eq!(m.points, 116);
        if cfg!(feature = "parallel") {
            assert_eq!(m.parallel_launches, 1);
        }
        launcher.reset_metrics();
        assert_eq!(launcher.metrics(), LaunchMetrics::default());
    }
}
