// crates/mh_ocean/src/engine/mod.rs

//! 计算引擎模块
//!
//! # 模块结构
//!
//! - `parallel` - 逐单元核函数的串行/并行执行

pub mod parallel;

pub use parallel::{KernelLauncher, KernelLauncherBuilder, LaunchMetrics, ParallelStrategy};
