// crates/mh_ocean/src/free_surface/solver.rs

//! 隐式自由面求解器
//!
//! [`ImplicitFreeSurfaceSolver`] 持有侧面积、算子缓存与线性求解器，
//! 每次求解先查询缓存，时间步长变化时才重建算子。
//!
//! [`ImplicitFreeSurface`] 在其上组织一个完整的自由面时间步：
//!
//! 1. 各层速度积分为正压体积通量 Q★
//! 2. 计算右端项
//! 3. 以当前 η 为初值求解
//! 4. 用新的 η 修正各层速度
//!
//! ```
//! use mh_config::FreeSurfaceConfig;
//! use mh_ocean::free_surface::ImplicitFreeSurfaceSolver;
//! use mh_ocean::grid::RectilinearGrid;
//!
//! let grid = RectilinearGrid::<f64>::builder()
//!     .size(8, 8)
//!     .uniform_spacing(1.0e4, 1.0e4)
//!     .uniform_depth(1000.0, 4)
//!     .build()
//!     .unwrap();
//! let mut solver = ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
//!
//! let mut eta = grid.center_field();
//! let rhs = grid.center_field();
//! let result = solver.solve(&mut eta, &rhs, 9.80665, 600.0);
//! assert!(result.is_converged());
//! assert_eq!(solver.rebuild_count(), 1);
//! ```

use mh_config::{ConfigError, FreeSurfaceConfig};
use mh_runtime::{KahanSum, RuntimeScalar};

use super::cache::{CachedTimeStep, OperatorCache, OperatorStatus};
use super::lateral_areas::{LateralAreaIntegrator, VerticallyIntegratedLateralAreas, X_FACE, Y_FACE};
use super::operator::OperatorBuilder;
use super::rhs::{
    apply_barotropic_correction, check_field, check_layered_field, compute_rhs,
    compute_vertically_integrated_volume_flux, CENTER,
};
use crate::engine::KernelLauncher;
use crate::error::OceanResult;
use crate::field::{Field2D, LayeredField};
use crate::grid::RectilinearGrid;
use crate::numerics::linear_algebra::{create_linear_solver, LinearSolver, SolverResult};

// ============================================================
// 椭圆求解
// ============================================================

/// 隐式自由面求解器
pub struct ImplicitFreeSurfaceSolver<'g, S: RuntimeScalar> {
    grid: &'g RectilinearGrid<S>,
    integrator: LateralAreaIntegrator<'g, S>,
    areas: VerticallyIntegratedLateralAreas<S>,
    launcher: KernelLauncher,
    linear_solver: Box<dyn LinearSolver<S>>,
    cache: OperatorCache<S>,
    rhs: Field2D<S>,
    /// 打包的解向量
    x: Vec<S>,
    /// 打包的右端项
    b: Vec<S>,
    last_result: Option<SolverResult<S>>,
}

impl<'g, S: RuntimeScalar> ImplicitFreeSurfaceSolver<'g, S> {
    /// 以给定线性求解器创建
    ///
    /// 构建时计算一次侧面积。
    ///
    /// # Errors
    /// 网格深度度量无效时返回 [`OceanError::MalformedGrid`](crate::OceanError::MalformedGrid)。
    pub fn new(
        grid: &'g RectilinearGrid<S>,
        linear_solver: Box<dyn LinearSolver<S>>,
        launcher: KernelLauncher,
    ) -> OceanResult<Self> {
        let integrator = LateralAreaIntegrator::new(grid)?;
        let areas = integrator.compute(&launcher);
        let n = grid.n_cells();

        log::debug!(
            "隐式自由面求解器: {}x{} 单元, 线性求解器 {}",
            grid.nx(),
            grid.ny(),
            linear_solver.name()
        );

        Ok(Self {
            grid,
            integrator,
            areas,
            launcher,
            linear_solver,
            cache: OperatorCache::new(),
            rhs: grid.center_field(),
            x: vec![S::ZERO; n],
            b: vec![S::ZERO; n],
            last_result: None,
        })
    }

    /// 按运行配置创建
    pub fn from_config(grid: &'g RectilinearGrid<S>, config: &FreeSurfaceConfig) -> OceanResult<Self> {
        config.validate()?;
        let linear_solver = create_linear_solver(&config.solver);
        let launcher = KernelLauncher::from_settings(&config.parallel);
        Self::new(grid, linear_solver, launcher)
    }

    /// 求解 η
    ///
    /// `eta` 输入为初始猜测，输出为解，halo 已填充。
    /// 不收敛时记录警告并返回结果，不视为错误。
    /// 算子按 (Δt, g) 缓存：两者任一与上次不同都会触发重建。
    ///
    /// # Panics
    /// `eta` 或 `rhs` 不是网格上的单元中心场时 panic。
    pub fn solve(&mut self, eta: &mut Field2D<S>, rhs: &Field2D<S>, g: S, dt: S) -> SolverResult<S> {
        rhs.pack_interior(&mut self.b);
        self.solve_packed(eta, g, dt)
    }

    /// 以内部右端项场求解，配合 [`Self::compute_right_hand_side`]
    pub fn solve_with_owned_rhs(&mut self, eta: &mut Field2D<S>, g: S, dt: S) -> SolverResult<S> {
        self.rhs.pack_interior(&mut self.b);
        self.solve_packed(eta, g, dt)
    }

    fn solve_packed(&mut self, eta: &mut Field2D<S>, g: S, dt: S) -> SolverResult<S> {
        if self.cache.status(dt, g) == OperatorStatus::Stale {
            let operator = OperatorBuilder::build(self.grid, &self.areas, g, dt);
            log::debug!(
                "重建自由面算子: dt = {}, g = {}, nnz = {}",
                dt,
                g,
                operator.nnz()
            );
            self.linear_solver.set_operator(operator);
            self.cache.record_rebuild(dt, g);
        }

        eta.pack_interior(&mut self.x);
        let result = self.linear_solver.solve(&mut self.x, &self.b);
        eta.unpack_interior(&self.x);
        self.grid.fill_halo_regions(eta);

        if !result.is_converged() {
            log::warn!(
                "自由面求解未收敛 ({}): {:?}, 迭代 {}, 残差 {:.3e}",
                self.linear_solver.name(),
                result.status,
                result.iterations,
                result.residual_norm.to_config()
            );
        }

        self.last_result = Some(result);
        result
    }

    /// 计算右端项到内部场
    pub fn compute_right_hand_side(
        &mut self,
        g: S,
        dt: S,
        qx: &Field2D<S>,
        qy: &Field2D<S>,
        eta: &Field2D<S>,
    ) {
        compute_rhs(&mut self.rhs, self.grid, g, dt, qx, qy, eta, &self.launcher);
    }

    /// 内部右端项场
    pub fn rhs(&self) -> &Field2D<S> {
        &self.rhs
    }

    /// 算子重建次数
    pub fn rebuild_count(&self) -> usize {
        self.cache.rebuild_count()
    }

    /// 缓存状态
    pub fn cached_time_step(&self) -> CachedTimeStep<S> {
        self.cache.state()
    }

    /// 最近一次求解结果
    pub fn last_result(&self) -> Option<SolverResult<S>> {
        self.last_result
    }

    /// 垂向积分侧面积
    pub fn lateral_areas(&self) -> &VerticallyIntegratedLateralAreas<S> {
        &self.areas
    }

    /// 侧面积积分器
    pub fn integrator(&self) -> &LateralAreaIntegrator<'g, S> {
        &self.integrator
    }

    /// 网格
    pub fn grid(&self) -> &'g RectilinearGrid<S> {
        self.grid
    }

    /// 核函数启动器
    pub fn launcher(&self) -> &KernelLauncher {
        &self.launcher
    }

    /// 线性求解器
    pub fn linear_solver(&self) -> &dyn LinearSolver<S> {
        self.linear_solver.as_ref()
    }
}

// ============================================================
// 时间步驱动
// ============================================================

/// 隐式自由面时间步
pub struct ImplicitFreeSurface<'g, S: RuntimeScalar> {
    solver: ImplicitFreeSurfaceSolver<'g, S>,
    g: S,
    qx: Field2D<S>,
    qy: Field2D<S>,
}

impl<'g, S: RuntimeScalar> ImplicitFreeSurface<'g, S> {
    /// 按运行配置创建
    ///
    /// # Errors
    /// 配置无效、重力无法转换到计算精度或网格深度度量无效时返回错误。
    pub fn new(grid: &'g RectilinearGrid<S>, config: &FreeSurfaceConfig) -> OceanResult<Self> {
        let g = S::from_config(config.gravitational_acceleration).ok_or_else(|| {
            ConfigError::invalid(
                "gravitational_acceleration",
                config.gravitational_acceleration,
                "超出计算精度范围",
            )
        })?;
        let solver = ImplicitFreeSurfaceSolver::from_config(grid, config)?;
        Ok(Self::with_solver(solver, g))
    }

    /// 以现成求解器创建
    pub fn with_solver(solver: ImplicitFreeSurfaceSolver<'g, S>, g: S) -> Self {
        let grid = solver.grid();
        Self {
            qx: grid.field(X_FACE),
            qy: grid.field(Y_FACE),
            solver,
            g,
        }
    }

    /// 推进一个自由面时间步
    ///
    /// `eta` 为单元中心场，`u`、`v` 为各层 x/y 界面速度；
    /// 返回后 `eta` 与速度均已更新并填充 halo。
    ///
    /// # Errors
    /// 场布局与网格不一致时返回 `SizeMismatch` 或 `LocationMismatch`，
    /// 此时不修改任何输入。
    pub fn step(
        &mut self,
        eta: &mut Field2D<S>,
        u: &mut LayeredField<S>,
        v: &mut LayeredField<S>,
        dt: S,
    ) -> OceanResult<SolverResult<S>> {
        let grid = self.solver.grid();
        check_field("eta", eta, grid, CENTER)?;
        check_layered_field("u", u, grid, X_FACE)?;
        check_layered_field("v", v, grid, Y_FACE)?;

        grid.fill_halo_regions(eta);
        compute_vertically_integrated_volume_flux(
            grid,
            self.solver.integrator(),
            u,
            v,
            &mut self.qx,
            &mut self.qy,
            self.solver.launcher(),
        );

        self.solver
            .compute_right_hand_side(self.g, dt, &self.qx, &self.qy, eta);
        let result = self.solver.solve_with_owned_rhs(eta, self.g, dt);

        apply_barotropic_correction(grid, self.solver.lateral_areas(), self.g, dt, eta, u, v);

        Ok(result)
    }

    /// 总体积扰动 Σ Az·η
    pub fn total_volume(&self, eta: &Field2D<S>) -> S {
        let grid = self.solver.grid();
        let mut sum = KahanSum::new();
        for (i, j, value) in eta.interior() {
            sum.add_product(grid.az(i, j), value);
        }
        sum.value()
    }

    /// 最近一次计算的 x 方向正压体积通量
    pub fn volume_flux_x(&self) -> &Field2D<S> {
        &self.qx
    }

    /// 最近一次计算的 y 方向正压体积通量
    pub fn volume_flux_y(&self) -> &Field2D<S> {
        &self.qy
    }

    /// 重力加速度
    pub fn gravity(&self) -> S {
        self.g
    }

    /// 内部椭圆求解器
    pub fn solver(&self) -> &ImplicitFreeSurfaceSolver<'g, S> {
        &self.solver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OceanError;
    use crate::grid::Topology;
    use crate::numerics::linear_algebra::{MultigridParameters, MultigridSolver, SolverConfig};

    fn grid(topology: (Topology, Topology)) -> RectilinearGrid<f64> {
        RectilinearGrid::builder()
            .size(12, 10)
            .topology(topology.0, topology.1)
            .uniform_spacing(2.0e4, 2.0e4)
            .uniform_depth(1000.0, 4)
            .bottom_height_fn(|x: f64, y: f64| -1000.0 + 300.0 * ((x + y) / 1.0e5).sin().powi(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_rebuild_only_when_dt_changes() {
        let grid = grid((Topology::Bounded, Topology::Bounded));
        let mut solver =
            ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
        let mut eta = grid.center_field();
        let rhs = grid.center_field();

        assert_eq!(solver.cached_time_step(), CachedTimeStep::Uninitialized);
        solver.solve(&mut eta, &rhs, 9.8, 600.0);
        solver.solve(&mut eta, &rhs, 9.8, 600.0);
        assert_eq!(solver.rebuild_count(), 1);
        solver.solve(&mut eta, &rhs, 9.8, 300.0);
        assert_eq!(solver.rebuild_count(), 2);
        assert_eq!(solver.cached_time_step().dt(), Some(300.0));
    }

    #[test]
    fn test_gravity_change_rebuilds() {
        let grid = grid((Topology::Periodic, Topology::Bounded));
        let mut solver =
            ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
        let mut eta = grid.center_field();
        let rhs = grid.center_field();

        solver.solve(&mut eta, &rhs, 9.8, 600.0);
        solver.solve(&mut eta, &rhs, 9.81, 600.0);
        assert_eq!(solver.rebuild_count(), 2);
        assert_eq!(
            solver.cached_time_step(),
            CachedTimeStep::Built { dt: 600.0, g: 9.81 }
        );
        solver.solve(&mut eta, &rhs, 9.81, 600.0);
        assert_eq!(solver.rebuild_count(), 2);
    }

    #[test]
    fn test_non_convergence_is_not_an_error() {
        let grid = grid((Topology::Periodic, Topology::Bounded));
        let config = SolverConfig::new(1e-30, 1).with_atol(0.0);
        let linear = Box::new(MultigridSolver::new(config, MultigridParameters::default()));
        let mut solver =
            ImplicitFreeSurfaceSolver::new(&grid, linear, KernelLauncher::sequential()).unwrap();
        let mut eta = grid.center_field();
        let mut rhs = grid.center_field();
        rhs.set(3, 3, 1.0);
        let result = solver.solve(&mut eta, &rhs, 9.8, 600.0);
        assert!(!result.is_converged());
        assert_eq!(solver.last_result(), Some(result));
    }

    #[test]
    fn test_solution_halo_is_filled() {
        let grid = grid((Topology::Periodic, Topology::Periodic));
        let mut solver =
            ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
        let mut eta = grid.center_field();
        let mut rhs = grid.center_field();
        rhs.set(0, 0, -1.0);
        solver.solve(&mut eta, &rhs, 9.8, 600.0);
        assert_eq!(eta.get(-1, 0), eta.get(11, 0));
        assert_eq!(eta.get(0, 10), eta.get(0, 0));
    }

    #[test]
    fn test_step_rejects_wrong_layout() {
        let grid = grid((Topology::Bounded, Topology::Bounded));
        let mut fs = ImplicitFreeSurface::new(&grid, &FreeSurfaceConfig::default()).unwrap();
        let mut eta = grid.field(X_FACE);
        let mut u = LayeredField::new(&grid, X_FACE);
        let mut v = LayeredField::new(&grid, Y_FACE);
        let err = fs.step(&mut eta, &mut u, &mut v, 600.0).unwrap_err();
        assert!(matches!(err, OceanError::LocationMismatch { what: "eta", .. }));
        assert_eq!(fs.solver().rebuild_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let grid = grid((Topology::Bounded, Topology::Bounded));
        let mut config = FreeSurfaceConfig::default();
        config.solver.rtol = -1.0;
        assert!(matches!(
            ImplicitFreeSurfaceSolver::from_config(&grid, &config),
            Err(OceanError::Config(_))
        ));
    }
}
