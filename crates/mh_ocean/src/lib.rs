// crates/mh_ocean/src/lib.rs

//! MariHydro 海洋核心层 (Layer 3)
//!
//! 有限体积海洋环流模式的隐式自由面椭圆求解：在可拉伸直线网格上
//! 组装随时间步长变化的 Helmholtz 型稀疏算子，并在时间推进循环中
//! 只在 Δt 变化时重建。
//!
//! - 网格与 halo 交换 (grid)
//! - 带 halo 的水平场 (field)
//! - 逐单元核函数执行 (engine)
//! - 稀疏线性代数与代数多重网格 (numerics)
//! - 侧面积、算子、右端项、缓存与求解编排 (free_surface)
//!
//! 全部计算类型以 `S: RuntimeScalar` 为泛型参数，配置保持 f64。
//!
//! # 示例
//!
//! ```
//! use mh_config::FreeSurfaceConfig;
//! use mh_ocean::prelude::*;
//!
//! let grid = RectilinearGrid::<f64>::builder()
//!     .size(16, 8)
//!     .topology(Topology::Periodic, Topology::Bounded)
//!     .uniform_spacing(1.0e4, 1.0e4)
//!     .uniform_depth(1000.0, 10)
//!     .build()
//!     .unwrap();
//!
//! let mut fs = ImplicitFreeSurface::new(&grid, &FreeSurfaceConfig::default()).unwrap();
//! let mut eta = grid.center_field();
//! let mut u = LayeredField::new(&grid, X_FACE);
//! let mut v = LayeredField::new(&grid, Y_FACE);
//! u.level_mut(9).fill(0.1);
//!
//! let result = fs.step(&mut eta, &mut u, &mut v, 600.0).unwrap();
//! assert!(result.is_converged());
//! assert!(fs.total_volume(&eta).abs() < 1e-3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod field;
pub mod free_surface;
pub mod grid;
pub mod numerics;

/// 层级标识
pub const LAYER: u8 = 3;

pub use engine::{KernelLauncher, ParallelStrategy};
pub use error::{OceanError, OceanResult};
pub use field::{Field2D, LayeredField};
pub use free_surface::{
    CachedTimeStep, ImplicitFreeSurface, ImplicitFreeSurfaceSolver, LateralAreaIntegrator,
    OperatorBuilder, OperatorCache, OperatorStatus, VerticallyIntegratedLateralAreas,
};
pub use grid::{Location, RectilinearGrid, RectilinearGridBuilder, Topology};

/// 常用类型
pub mod prelude {
    pub use crate::engine::{KernelLauncher, ParallelStrategy};
    pub use crate::error::{OceanError, OceanResult};
    pub use crate::field::{Field2D, LayeredField};
    pub use crate::free_surface::{
        ImplicitFreeSurface, ImplicitFreeSurfaceSolver, LateralAreaIntegrator, OperatorBuilder,
        X_FACE, Y_FACE,
    };
    pub use crate::grid::{Location, RectilinearGrid, Topology};
    pub use crate::numerics::linear_algebra::{LinearSolver, SolverResult, SolverStatus};
    pub use mh_runtime::RuntimeScalar;
}
