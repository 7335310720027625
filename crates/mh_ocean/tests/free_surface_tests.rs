// crates/mh_ocean/tests/free_surface_tests.rs

//! 隐式自由面求解集成测试
//!
//! # 测试覆盖
//!
//! - 算子缓存：只在 Δt 变化时重建
//! - 算子组装的确定性
//! - 初值无关与线性
//! - 侧面积 halo
//! - 平底零强迫场景
//! - 自由面时间步的体积守恒与离散连续性
//! - PCG 与多重网格一致

use mh_config::{FreeSurfaceConfig, PreconditionerKind, SolverMethod};
use mh_ocean::engine::{KernelLauncher, ParallelStrategy};
use mh_ocean::free_surface::{
    compute_vertically_integrated_volume_flux, flux_fields, ImplicitFreeSurface,
    ImplicitFreeSurfaceSolver, LateralAreaIntegrator, OperatorBuilder, X_FACE, Y_FACE,
};
use mh_ocean::grid::{RectilinearGrid, Topology};
use mh_ocean::{Field2D, LayeredField, OceanError};
use rand::prelude::*;

const G: f64 = 9.80665;

// ============================================================================
// 测试辅助函数
// ============================================================================

/// 带海山与一个岛屿的拉伸网格
fn seamount_grid(nx: usize, ny: usize, topology: (Topology, Topology)) -> RectilinearGrid<f64> {
    let dx: Vec<f64> = (0..nx).map(|i| 1.0e4 * (1.0 + 0.3 * (i as f64 / nx as f64))).collect();
    let lx: f64 = dx.iter().sum();
    let ly = 1.0e4 * ny as f64;
    RectilinearGrid::builder()
        .size(nx, ny)
        .halo(2, 2)
        .topology(topology.0, topology.1)
        .x_spacing(dx)
        .y_spacing(vec![1.0e4; ny])
        .uniform_depth(1000.0, 8)
        .bottom_height_fn(move |x: f64, y: f64| {
            let rx = (x - 0.3 * lx) / (0.15 * lx);
            let ry = (y - 0.5 * ly) / (0.2 * ly);
            let seamount = -1000.0 + 700.0 * (-(rx * rx + ry * ry)).exp();
            let island = (x - 0.75 * lx).abs() < 0.06 * lx && (y - 0.5 * ly).abs() < 0.1 * ly;
            if island {
                20.0
            } else {
                seamount
            }
        })
        .build()
        .unwrap()
}

/// 平底矩形网格
fn flat_grid(depth: f64) -> RectilinearGrid<f64> {
    RectilinearGrid::builder()
        .size(20, 16)
        .uniform_spacing(5.0e3, 5.0e3)
        .uniform_depth(depth, 10)
        .build()
        .unwrap()
}

fn random_field(grid: &RectilinearGrid<f64>, rng: &mut StdRng, amplitude: f64) -> Field2D<f64> {
    let mut f = grid.center_field();
    for j in 0..grid.ny() as isize {
        for i in 0..grid.nx() as isize {
            f.set(i, j, rng.gen_range(-amplitude..amplitude));
        }
    }
    grid.fill_halo_regions(&mut f);
    f
}

fn random_velocity(
    grid: &RectilinearGrid<f64>,
    location: (mh_ocean::Location, mh_ocean::Location),
    rng: &mut StdRng,
) -> LayeredField<f64> {
    let mut u = LayeredField::new(grid, location);
    for level in u.levels_mut() {
        let (ex, ey) = level.interior_extent();
        for j in 0..ey as isize {
            for i in 0..ex as isize {
                level.set(i, j, rng.gen_range(-0.5..0.5));
            }
        }
        grid.fill_halo_regions(level);
    }
    u
}

fn max_abs_diff(a: &Field2D<f64>, b: &Field2D<f64>) -> f64 {
    a.interior()
        .zip(b.interior())
        .map(|((_, _, x), (_, _, y))| (x - y).abs())
        .fold(0.0, f64::max)
}

fn max_abs(a: &Field2D<f64>) -> f64 {
    a.interior().map(|(_, _, x)| x.abs()).fold(0.0, f64::max)
}

fn config(method: SolverMethod, preconditioner: PreconditionerKind) -> FreeSurfaceConfig {
    let mut config = FreeSurfaceConfig::default();
    config.solver.method = method;
    config.solver.preconditioner = preconditioner;
    config.solver.rtol = 1e-11;
    config.solver.max_iterations = 1000;
    config
}

// ============================================================================
// 算子缓存
// ============================================================================

#[test]
fn test_rebuild_on_change_scenario() {
    let grid = flat_grid(1000.0);
    let mut solver =
        ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
    let mut eta = grid.center_field();
    let rhs = grid.center_field();

    solver.solve(&mut eta, &rhs, G, 600.0);
    assert_eq!(solver.rebuild_count(), 1);
    solver.solve(&mut eta, &rhs, G, 600.0);
    assert_eq!(solver.rebuild_count(), 1);
    solver.solve(&mut eta, &rhs, G, 300.0);
    assert_eq!(solver.rebuild_count(), 2);
}

#[test]
fn test_rebuild_count_equals_value_changes() {
    let grid = seamount_grid(12, 10, (Topology::Periodic, Topology::Bounded));
    let mut solver =
        ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(20240611);
    let candidates = [300.0, 450.0, 600.0, 600.0 + 1e-9];

    let mut eta = grid.center_field();
    let rhs = random_field(&grid, &mut rng, 1.0);
    let mut previous: Option<f64> = None;
    let mut changes = 0;

    for _ in 0..40 {
        let dt = if rng.gen_bool(0.6) {
            previous.unwrap_or(600.0)
        } else {
            candidates[rng.gen_range(0..candidates.len())]
        };
        if previous != Some(dt) {
            changes += 1;
        }
        previous = Some(dt);
        solver.solve(&mut eta, &rhs, G, dt);
        assert_eq!(solver.rebuild_count(), changes);
        assert_eq!(solver.cached_time_step().dt(), Some(dt));
    }
}

// ============================================================================
// 算子与面积
// ============================================================================

#[test]
fn test_operator_is_deterministic() {
    let grid = seamount_grid(17, 11, (Topology::Periodic, Topology::Periodic));
    let launcher = KernelLauncher::new(ParallelStrategy::Parallel, 0);
    let areas_a = LateralAreaIntegrator::new(&grid).unwrap().compute(&launcher);
    let areas_b = LateralAreaIntegrator::new(&grid).unwrap().compute(&launcher);
    let a = OperatorBuilder::build(&grid, &areas_a, G, 600.0);
    let b = OperatorBuilder::build(&grid, &areas_b, G, 600.0);
    assert_eq!(a, b);
    assert!(a.values().iter().zip(b.values()).all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn test_parallel_and_serial_areas_agree() {
    let grid = seamount_grid(30, 20, (Topology::Bounded, Topology::Periodic));
    let integrator = LateralAreaIntegrator::new(&grid).unwrap();
    let serial = integrator.compute(&KernelLauncher::sequential());
    let parallel = integrator.compute(&KernelLauncher::new(ParallelStrategy::Parallel, 0));
    assert_eq!(serial, parallel);
}

#[test]
fn test_lateral_area_halo_matches_exchange() {
    for topology in [
        (Topology::Periodic, Topology::Periodic),
        (Topology::Bounded, Topology::Periodic),
        (Topology::Periodic, Topology::Bounded),
    ] {
        let grid = seamount_grid(9, 7, topology);
        let areas = LateralAreaIntegrator::new(&grid)
            .unwrap()
            .compute(&KernelLauncher::sequential());

        let mut x = areas.x.clone();
        let mut y = areas.y.clone();
        grid.fill_halo_regions(&mut x);
        grid.fill_halo_regions(&mut y);
        assert_eq!(x, areas.x);
        assert_eq!(y, areas.y);

        // 周期方向的 halo 不是零
        if topology.0 == Topology::Periodic {
            assert_eq!(areas.x.get(-2, 3), areas.x.get(7, 3));
            assert!(areas.x.get(-1, 0) > 0.0);
        }
        if topology.1 == Topology::Periodic {
            assert_eq!(areas.y.get(2, 8), areas.y.get(2, 1));
            assert!(areas.y.get(0, -1) > 0.0);
        }
    }
}

#[test]
fn test_malformed_grid_is_rejected() {
    let grid = RectilinearGrid::<f64>::builder()
        .size(4, 4)
        .uniform_spacing(1.0, 1.0)
        .build()
        .unwrap();
    let result = ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default());
    assert!(matches!(result, Err(OceanError::MalformedGrid(_))));
}

// ============================================================================
// 求解
// ============================================================================

#[test]
fn test_flat_bottom_zero_forcing() {
    let grid = flat_grid(1000.0);
    let mut solver =
        ImplicitFreeSurfaceSolver::from_config(&grid, &FreeSurfaceConfig::default()).unwrap();
    let mut eta = grid.center_field();
    let rhs = grid.center_field();

    let result = solver.solve(&mut eta, &rhs, G, 600.0);
    assert!(result.is_converged());
    assert!(max_abs(&eta) < 1e-12);
}

#[test]
fn test_initial_guess_does_not_change_fixed_point() {
    let grid = seamount_grid(16, 12, (Topology::Periodic, Topology::Bounded));
    let mut solver =
        ImplicitFreeSurfaceSolver::from_config(&grid, &config(SolverMethod::Multigrid, PreconditionerKind::Multigrid))
            .unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let rhs = random_field(&grid, &mut rng, 10.0);

    let mut eta_a = grid.center_field();
    let mut eta_b = random_field(&grid, &mut rng, 3.0);
    assert!(solver.solve(&mut eta_a, &rhs, G, 600.0).is_converged());
    assert!(solver.solve(&mut eta_b, &rhs, G, 600.0).is_converged());
    assert_eq!(solver.rebuild_count(), 1);

    assert!(max_abs_diff(&eta_a, &eta_b) <= 1e-6 * max_abs(&eta_a));
}

#[test]
fn test_solution_is_linear_in_rhs() {
    let grid = seamount_grid(14, 14, (Topology::Bounded, Topology::Bounded));
    let mut solver =
        ImplicitFreeSurfaceSolver::from_config(&grid, &config(SolverMethod::Multigrid, PreconditionerKind::Multigrid))
            .unwrap();
    let mut rng = StdRng::seed_from_u64(99);
    let rhs = random_field(&grid, &mut rng, 5.0);
    let c = -3.5;
    let mut scaled = grid.center_field();
    for (i, j, value) in rhs.interior() {
        scaled.set(i, j, c * value);
    }

    let mut eta = grid.center_field();
    let mut eta_scaled = grid.center_field();
    solver.solve(&mut eta, &rhs, G, 450.0);
    solver.solve(&mut eta_scaled, &scaled, G, 450.0);

    let worst = eta
        .interior()
        .zip(eta_scaled.interior())
        .map(|((_, _, x), (_, _, y))| (c * x - y).abs())
        .fold(0.0, f64::max);
    assert!(worst <= 1e-6 * max_abs(&eta_scaled));
}

#[test]
fn test_pcg_and_multigrid_agree() {
    let grid = seamount_grid(20, 15, (Topology::Periodic, Topology::Periodic));
    let mut rng = StdRng::seed_from_u64(1234);
    let rhs = random_field(&grid, &mut rng, 2.0);

    let mut reference = grid.center_field();
    let mut mg = ImplicitFreeSurfaceSolver::from_config(
        &grid,
        &config(SolverMethod::Multigrid, PreconditionerKind::Multigrid),
    )
    .unwrap();
    assert!(mg.solve(&mut reference, &rhs, G, 900.0).is_converged());

    for preconditioner in [
        PreconditionerKind::Identity,
        PreconditionerKind::Jacobi,
        PreconditionerKind::Multigrid,
    ] {
        let mut solver = ImplicitFreeSurfaceSolver::from_config(
            &grid,
            &config(SolverMethod::PreconditionedConjugateGradient, preconditioner),
        )
        .unwrap();
        let mut eta = grid.center_field();
        let result = solver.solve(&mut eta, &rhs, G, 900.0);
        assert!(result.is_converged(), "{:?}: {:?}", preconditioner, result);
        assert!(max_abs_diff(&eta, &reference) <= 1e-6 * max_abs(&reference));
    }
}

#[test]
fn test_single_precision_solve() {
    let grid = RectilinearGrid::<f32>::builder()
        .size(16, 16)
        .uniform_spacing(1.0e4, 1.0e4)
        .uniform_depth(500.0, 5)
        .build()
        .unwrap();
    let mut config = FreeSurfaceConfig::default();
    config.solver.rtol = 1e-4;
    config.solver.atol = 1e-6;
    let mut solver = ImplicitFreeSurfaceSolver::from_config(&grid, &config).unwrap();
    let mut eta = grid.center_field();
    let mut rhs = grid.center_field();
    rhs.set(8, 8, -1.0);
    let result = solver.solve(&mut eta, &rhs, 9.81, 600.0);
    assert!(result.is_converged());
    assert!(eta.get(8, 8) > 0.0);
}

#[test]
fn test_single_precision_default_config_converges() {
    let grid = RectilinearGrid::<f32>::builder()
        .size(64, 64)
        .uniform_spacing(1.0e4, 1.0e4)
        .uniform_depth(500.0, 5)
        .build()
        .unwrap();
    let config = FreeSurfaceConfig::default();
    assert!(config.solver.rtol < f32::EPSILON as f64);
    let mut solver = ImplicitFreeSurfaceSolver::from_config(&grid, &config).unwrap();
    let mut eta = grid.center_field();
    let mut rhs = grid.center_field();
    rhs.set(32, 32, -1.0);
    for _ in 0..3 {
        let result = solver.solve(&mut eta, &rhs, 9.81, 600.0);
        assert!(result.is_converged(), "{:?}", result);
    }
    assert!(eta.get(32, 32) > 0.0);
}

// ============================================================================
// 时间步
// ============================================================================

#[test]
fn test_step_conserves_volume() {
    for topology in [
        (Topology::Bounded, Topology::Bounded),
        (Topology::Periodic, Topology::Bounded),
        (Topology::Periodic, Topology::Periodic),
    ] {
        let grid = seamount_grid(16, 12, topology);
        let mut fs =
            ImplicitFreeSurface::new(&grid, &config(SolverMethod::Multigrid, PreconditionerKind::Multigrid))
                .unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut eta = random_field(&grid, &mut rng, 0.5);
        let mut u = random_velocity(&grid, X_FACE, &mut rng);
        let mut v = random_velocity(&grid, Y_FACE, &mut rng);

        let v0 = fs.total_volume(&eta);
        let scale: f64 = eta.interior().map(|(i, j, x)| grid.az(i, j) * x.abs()).sum();
        for dt in [600.0, 600.0, 300.0, 900.0] {
            let result = fs.step(&mut eta, &mut u, &mut v, dt).unwrap();
            assert!(result.is_converged(), "{:?}", result);
        }
        let v1 = fs.total_volume(&eta);
        assert!((v1 - v0).abs() <= 1e-8 * scale, "{:?}: {} -> {}", topology, v0, v1);
        assert_eq!(fs.solver().rebuild_count(), 3);
    }
}

#[test]
fn test_step_satisfies_discrete_continuity() {
    let grid = seamount_grid(18, 14, (Topology::Periodic, Topology::Bounded));
    let mut fs =
        ImplicitFreeSurface::new(&grid, &config(SolverMethod::Multigrid, PreconditionerKind::Multigrid))
            .unwrap();
    let mut rng = StdRng::seed_from_u64(2718);
    let mut eta = random_field(&grid, &mut rng, 0.2);
    let mut u = random_velocity(&grid, X_FACE, &mut rng);
    let mut v = random_velocity(&grid, Y_FACE, &mut rng);
    let eta_old = eta.clone();
    let dt = 600.0;

    fs.step(&mut eta, &mut u, &mut v, dt).unwrap();

    // 用修正后的速度重新积分通量：η 的变化等于 −Δt·δQ/Az
    let integrator = LateralAreaIntegrator::new(&grid).unwrap();
    let (mut qx, mut qy) = flux_fields(&grid);
    compute_vertically_integrated_volume_flux(
        &grid,
        &integrator,
        &u,
        &v,
        &mut qx,
        &mut qy,
        &KernelLauncher::sequential(),
    );

    let mut worst: f64 = 0.0;
    let mut change: f64 = 0.0;
    for (i, j, new) in eta.interior() {
        let div = qx.get(i + 1, j) - qx.get(i, j) + qy.get(i, j + 1) - qy.get(i, j);
        let tendency = new - eta_old.get(i, j);
        worst = worst.max((tendency + dt * div / grid.az(i, j)).abs());
        change = change.max(tendency.abs());
    }
    assert!(change > 0.0);
    assert!(worst <= 1e-6 * change, "连续性误差 {} (变化 {})", worst, change);
}

#[test]
fn test_step_with_rest_state_stays_at_rest() {
    let grid = seamount_grid(10, 8, (Topology::Bounded, Topology::Bounded));
    let mut fs = ImplicitFreeSurface::new(&grid, &FreeSurfaceConfig::default()).unwrap();
    let mut eta = grid.center_field();
    let mut u = LayeredField::new(&grid, X_FACE);
    let mut v = LayeredField::new(&grid, Y_FACE);
    let result = fs.step(&mut eta, &mut u, &mut v, 600.0).unwrap();
    assert!(result.is_converged());
    assert_eq!(max_abs(&eta), 0.0);
    assert!(u.levels().iter().all(|l| l.data().iter().all(|&x| x == 0.0)));
}
