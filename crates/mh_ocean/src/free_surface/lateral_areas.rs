// crates/mh_ocean/src/free_surface/lateral_areas.rs

//! 垂向积分侧面积
//!
//! x 界面 (i, j) 位于单元 (i-1, j) 与 (i, j) 之间，面积
//! `Ax = Σₖ Δz_eff(k)·Δyᶜ(j)`；y 界面同理乘 Δxᶜ(i)。
//!
//! 第 k 层在界面上的有效厚度取两侧底高程中较浅者以上的部分：
//!
//! ```text
//! Δz_eff = max(0, z[k+1] − max(z[k], max(b_left, b_right)))
//! ```
//!
//! 有界轴的两端壁面面积为零（不可穿透）。

use mh_runtime::RuntimeScalar;

use crate::engine::KernelLauncher;
use crate::error::{OceanError, OceanResult};
use crate::field::Field2D;
use crate::grid::{Location, RectilinearGrid, Topology};

/// x 界面场位置
pub const X_FACE: (Location, Location) = (Location::Face, Location::Center);
/// y 界面场位置
pub const Y_FACE: (Location, Location) = (Location::Center, Location::Face);

/// 垂向积分侧面积（halo 已填充）
#[derive(Debug, Clone, PartialEq)]
pub struct VerticallyIntegratedLateralAreas<S: RuntimeScalar> {
    /// x 界面面积 (Face, Center)
    pub x: Field2D<S>,
    /// y 界面面积 (Center, Face)
    pub y: Field2D<S>,
}

/// 侧面积积分器
///
/// 构建时校验垂向度量，之后的计算不会失败。
#[derive(Debug, Clone, Copy)]
pub struct LateralAreaIntegrator<'g, S: RuntimeScalar> {
    grid: &'g RectilinearGrid<S>,
}

impl<'g, S: RuntimeScalar> LateralAreaIntegrator<'g, S> {
    /// 校验网格深度度量
    ///
    /// # Errors
    /// 无垂向层、层界面非有限或非严格递增、底高程非有限时返回
    /// [`OceanError::MalformedGrid`]。
    pub fn new(grid: &'g RectilinearGrid<S>) -> OceanResult<Self> {
        let z = grid.z_faces();
        if grid.nz() == 0 {
            return Err(OceanError::malformed("网格没有垂向层 (nz = 0)"));
        }
        if let Some(k) = z.iter().position(|v| !v.is_finite()) {
            return Err(OceanError::malformed(format!("z_faces[{}] 不是有限值", k)));
        }
        if let Some(k) = z.windows(2).position(|w| w[1] <= w[0]) {
            return Err(OceanError::malformed(format!(
                "z_faces 必须严格递增: z[{}] = {}, z[{}] = {}",
                k,
                z[k],
                k + 1,
                z[k + 1]
            )));
        }
        if let Some((i, j, b)) = grid.bottom().interior().find(|(_, _, b)| !b.is_finite()) {
            return Err(OceanError::malformed(format!(
                "底高程 ({}, {}) = {} 不是有限值",
                i, j, b
            )));
        }
        Ok(Self { grid })
    }

    /// 所属网格
    pub fn grid(&self) -> &'g RectilinearGrid<S> {
        self.grid
    }

    /// 第 k 层在两侧底高程为 b_left、b_right 的界面上的有效厚度
    #[inline]
    fn effective_thickness(&self, k: usize, b_left: S, b_right: S) -> S {
        let floor = self.grid.z_face(k).max(b_left.max(b_right));
        (self.grid.z_face(k + 1) - floor).max(S::ZERO)
    }

    /// x 界面 (i, j) 在第 k 层的面积
    pub fn x_face_area(&self, i: isize, j: isize, k: usize) -> S {
        let grid = self.grid;
        if grid.topology().0 == Topology::Bounded && (i <= 0 || i >= grid.nx() as isize) {
            return S::ZERO;
        }
        let dz = self.effective_thickness(k, grid.bottom_height(i - 1, j), grid.bottom_height(i, j));
        dz * grid.dy_c(j)
    }

    /// y 界面 (i, j) 在第 k 层的面积
    pub fn y_face_area(&self, i: isize, j: isize, k: usize) -> S {
        let grid = self.grid;
        if grid.topology().1 == Topology::Bounded && (j <= 0 || j >= grid.ny() as isize) {
            return S::ZERO;
        }
        let dz = self.effective_thickness(k, grid.bottom_height(i, j - 1), grid.bottom_height(i, j));
        dz * grid.dx_c(i)
    }

    /// 计算垂向积分侧面积并填充 halo
    pub fn compute(&self, launcher: &KernelLauncher) -> VerticallyIntegratedLateralAreas<S> {
        let grid = self.grid;
        let nz = grid.nz();

        let mut x = grid.field(X_FACE);
        launcher.launch(&mut x, |i, j| (0..nz).map(|k| self.x_face_area(i, j, k)).sum());
        grid.fill_halo_regions(&mut x);

        let mut y = grid.field(Y_FACE);
        launcher.launch(&mut y, |i, j| (0..nz).map(|k| self.y_face_area(i, j, k)).sum());
        grid.fill_halo_regions(&mut y);

        log::debug!("侧面积积分完成: {}x{}x{}", grid.nx(), grid.ny(), nz);

        VerticallyIntegratedLateralAreas { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basin(topology: (Topology, Topology)) -> RectilinearGrid<f64> {
        RectilinearGrid::builder()
            .size(4, 3)
            .topology(topology.0, topology.1)
            .uniform_spacing(100.0, 50.0)
            .uniform_depth(40.0, 4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_flat_bottom_areas() {
        let grid = basin((Topology::Periodic, Topology::Bounded));
        let areas = LateralAreaIntegrator::new(&grid)
            .unwrap()
            .compute(&KernelLauncher::sequential());

        // 周期 x：所有界面都有面积 H·Δy
        assert_eq!(areas.x.get(0, 1), 40.0 * 50.0);
        assert_eq!(areas.x.get(3, 2), 40.0 * 50.0);
        // 有界 y：壁面为零，内部为 H·Δx
        assert_eq!(areas.y.get(1, 0), 0.0);
        assert_eq!(areas.y.get(1, 3), 0.0);
        assert_eq!(areas.y.get(2, 1), 40.0 * 100.0);
    }

    #[test]
    fn test_partial_cells_use_shallower_bottom() {
        let grid = RectilinearGrid::<f64>::builder()
            .size(2, 1)
            .topology(Topology::Periodic, Topology::Bounded)
            .uniform_spacing(1.0, 2.0)
            .z_faces(vec![-30.0, -20.0, -10.0, 0.0])
            .bottom_heights(vec![-30.0, -15.0])
            .build()
            .unwrap();
        let integrator = LateralAreaIntegrator::new(&grid).unwrap();
        assert_eq!(integrator.x_face_area(1, 0, 0), 0.0);
        assert_eq!(integrator.x_face_area(1, 0, 1), 5.0 * 2.0);
        assert_eq!(integrator.x_face_area(1, 0, 2), 10.0 * 2.0);

        let areas = integrator.compute(&KernelLauncher::sequential());
        assert_eq!(areas.x.get(1, 0), 30.0);
        assert_eq!(areas.x.get(0, 0), 30.0);
    }

    #[test]
    fn test_land_cell_closes_faces() {
        let grid = RectilinearGrid::<f64>::builder()
            .size(3, 1)
            .uniform_spacing(1.0, 1.0)
            .uniform_depth(10.0, 2)
            .bottom_heights(vec![-10.0, 5.0, -10.0])
            .build()
            .unwrap();
        let areas = LateralAreaIntegrator::new(&grid)
            .unwrap()
            .compute(&KernelLauncher::sequential());
        assert_eq!(areas.x.get(1, 0), 0.0);
        assert_eq!(areas.x.get(2, 0), 0.0);
    }

    #[test]
    fn test_halo_is_filled() {
        let grid = basin((Topology::Periodic, Topology::Periodic));
        let areas = LateralAreaIntegrator::new(&grid)
            .unwrap()
            .compute(&KernelLauncher::sequential());
        assert_eq!(areas.x.get(-1, -1), areas.x.get(3, 2));
        assert!(areas.y.get(4, 3) > 0.0);
    }

    #[test]
    fn test_malformed_depth_metric() {
        let no_layers = RectilinearGrid::<f64>::builder()
            .size(2, 2)
            .uniform_spacing(1.0, 1.0)
            .build()
            .unwrap();
        assert!(matches!(
            LateralAreaIntegrator::new(&no_layers),
            Err(OceanError::MalformedGrid(_))
        ));

        let decreasing = RectilinearGrid::<f64>::builder()
            .size(2, 2)
            .uniform_spacing(1.0, 1.0)
            .z_faces(vec![0.0, -10.0])
            .build()
            .unwrap();
        assert!(matches!(
            LateralAreaIntegrator::new(&decreasing),
            Err(OceanError::MalformedGrid(_))
        ));

        let nan_bottom = RectilinearGrid::<f64>::builder()
            .size(2, 1)
            .uniform_spacing(1.0, 1.0)
            .uniform_depth(10.0, 1)
            .bottom_heights(vec![-10.0, f64::NAN])
            .build()
            .unwrap();
        assert!(matches!(
            LateralAreaIntegrator::new(&nan_bottom),
            Err(OceanError::MalformedGrid(_))
        ));
    }
}
