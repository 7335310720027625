// crates/mh_ocean/src/free_surface/operator.rs

//! 自由面椭圆算子组装
//!
//! 面积积分形式的 `∇·(H∇η) − η/(gΔt²)`，每个内部单元一行（行号 `i + nx·j`）：
//!
//! ```text
//! 对四个界面:  C = A_face / Δ_face
//!              A[row, nbr]  += C
//!              A[row, row]  -= C
//! 对角:        A[row, row]  -= Az / (g·Δt²)
//! ```
//!
//! 结果对称负定。有界轴的壁面不贡献；周期轴的邻居按取模回绕，
//! 宽度为 1 或 2 的周期轴上同一列会累加多次。

use mh_runtime::RuntimeScalar;

use super::lateral_areas::VerticallyIntegratedLateralAreas;
use crate::grid::{RectilinearGrid, Topology};
use crate::numerics::linear_algebra::{CsrBuilder, CsrMatrix};

/// 算子组装器
///
/// 纯函数：相同输入给出逐位相同的矩阵。
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorBuilder;

impl OperatorBuilder {
    /// 组装 (g, Δt) 下的自由面算子
    ///
    /// # Panics
    /// 面积场尺寸与网格不一致时 panic。
    pub fn build<S: RuntimeScalar>(
        grid: &RectilinearGrid<S>,
        areas: &VerticallyIntegratedLateralAreas<S>,
        g: S,
        dt: S,
    ) -> CsrMatrix<S> {
        let (nx, ny) = (grid.nx(), grid.ny());
        assert_eq!(areas.x.size(), (nx, ny), "x 面积场尺寸与网格不一致");
        assert_eq!(areas.y.size(), (nx, ny), "y 面积场尺寸与网格不一致");

        let (tx, ty) = grid.topology();
        let helmholtz = S::ONE / (g * dt * dt);
        let mut builder = CsrBuilder::new_square(nx * ny);

        for j in 0..ny as isize {
            for i in 0..nx as isize {
                let row = grid.linear_index(i as usize, j as usize);

                // 西、东、南、北
                let faces = [
                    (i - 1, j, areas.x.get(i, j), grid.dx_f(i)),
                    (i + 1, j, areas.x.get(i + 1, j), grid.dx_f(i + 1)),
                    (i, j - 1, areas.y.get(i, j), grid.dy_f(j)),
                    (i, j + 1, areas.y.get(i, j + 1), grid.dy_f(j + 1)),
                ];

                for (ni, nj, area, distance) in faces {
                    let Some(ci) = wrap(ni, nx, tx) else { continue };
                    let Some(cj) = wrap(nj, ny, ty) else { continue };
                    if area == S::ZERO {
                        continue;
                    }
                    let c = area / distance;
                    builder.add(row, grid.linear_index(ci, cj), c);
                    builder.add(row, row, -c);
                }

                builder.add(row, row, -grid.az(i, j) * helmholtz);
            }
        }

        builder.build()
    }
}

/// 邻居索引：周期轴取模，有界轴越界返回 None
#[inline]
fn wrap(i: isize, n: usize, topology: Topology) -> Option<usize> {
    match topology {
        Topology::Periodic => Some(i.rem_euclid(n as isize) as usize),
        Topology::Bounded => (i >= 0 && i < n as isize).then_some(i as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::KernelLauncher;
    use crate::free_surface::LateralAreaIntegrator;

    fn assemble(nx: usize, ny: usize, topology: (Topology, Topology), dt: f64) -> CsrMatrix<f64> {
        let grid = RectilinearGrid::builder()
            .size(nx, ny)
            .topology(topology.0, topology.1)
            .x_spacing((0..nx).map(|i| 1000.0 + 100.0 * i as f64).collect())
            .y_spacing(vec![800.0; ny])
            .uniform_depth(1000.0, 3)
            .build()
            .unwrap();
        let areas = LateralAreaIntegrator::new(&grid)
            .unwrap()
            .compute(&KernelLauncher::sequential());
        OperatorBuilder::build(&grid, &areas, 9.80665, dt)
    }

    #[test]
    fn test_symmetric_negative_definite() {
        let a = assemble(5, 4, (Topology::Periodic, Topology::Bounded), 600.0);
        assert!(a.is_symmetric(1e-9));
        for row in 0..a.n_rows() {
            assert!(a.diagonal_value(row).unwrap() < 0.0);
        }
        let x: Vec<f64> = (0..20).map(|i| (i as f64 * 0.37).sin()).collect();
        let mut ax = vec![0.0; 20];
        a.mul_vec(&x, &mut ax);
        let quad: f64 = x.iter().zip(&ax).map(|(a, b)| a * b).sum();
        assert!(quad < 0.0);
    }

    #[test]
    fn test_row_sums_equal_helmholtz_shift() {
        let a = assemble(4, 3, (Topology::Bounded, Topology::Bounded), 300.0);
        let ones = vec![1.0; 12];
        let mut out = vec![0.0; 12];
        a.mul_vec(&ones, &mut out);
        // 内部耦合对常数场求和为零，只剩 −Az/(gΔt²)
        let az = 1000.0 * 800.0;
        let expected = -az / (9.80665 * 300.0 * 300.0);
        assert!((out[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_bounded_corner_has_two_neighbours() {
        let a = assemble(3, 3, (Topology::Bounded, Topology::Bounded), 600.0);
        assert_eq!(a.row(0).nnz(), 3);
        assert_eq!(a.row(4).nnz(), 5);
    }

    #[test]
    fn test_narrow_periodic_axes_accumulate() {
        let wide = assemble(1, 2, (Topology::Periodic, Topology::Periodic), 600.0);
        // x 宽度为 1：东西两侧都回到自身，+C 与 −C 抵消
        assert_eq!(wide.row(0).nnz(), 2);
        // y 宽度为 2：南北邻居是同一单元，系数累加两次
        let c = 2.0 * (1000.0 * 1000.0) / 800.0;
        assert!((wide.get(0, 1) - c).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let a = assemble(6, 5, (Topology::Periodic, Topology::Periodic), 450.0);
        let b = assemble(6, 5, (Topology::Periodic, Topology::Periodic), 450.0);
        assert_eq!(a, b);
    }
}
