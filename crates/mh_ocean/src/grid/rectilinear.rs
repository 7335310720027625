// crates/mh_ocean/src/grid/rectilinear.rs

//! 可拉伸直线网格
//!
//! 水平方向为张量积网格，单元宽度 Δxᶜ(i)、Δyᶜ(j) 可变；
//! 垂向为 z 坐标层界面 `z_faces`（自下而上递增，顶面为静止自由面）。
//! 底高程为单元中心场，低于顶层底面的部分形成部分单元。
//!
//! 构建器只校验水平参数；垂向度量由使用方（如侧面积积分器）按需校验，
//! 这样没有垂向信息的二维网格也能构建。
//!
//! ```
//! use mh_ocean::grid::{RectilinearGrid, Topology};
//!
//! let grid = RectilinearGrid::<f64>::builder()
//!     .size(8, 4)
//!     .topology(Topology::Periodic, Topology::Bounded)
//!     .uniform_spacing(1000.0, 500.0)
//!     .uniform_depth(100.0, 5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(grid.nz(), 5);
//! assert_eq!(grid.az(0, 0), 5.0e5);
//! assert_eq!(grid.bottom_height(3, 2), -100.0);
//! ```

use mh_runtime::RuntimeScalar;

use super::halo::fill_halo_regions;
use super::topology::{source_index, Location, Topology};
use crate::error::{OceanError, OceanResult};
use crate::field::Field2D;

/// 可拉伸直线网格
#[derive(Debug, Clone)]
pub struct RectilinearGrid<S: RuntimeScalar> {
    nx: usize,
    ny: usize,
    hx: usize,
    hy: usize,
    topology: (Topology, Topology),
    /// Δxᶜ，含 halo，下标 i + hx
    dx_c: Vec<S>,
    /// Δyᶜ，含 halo，下标 j + hy
    dy_c: Vec<S>,
    z_faces: Vec<S>,
    bottom: Field2D<S>,
}

impl<S: RuntimeScalar> RectilinearGrid<S> {
    /// 创建构建器
    pub fn builder() -> RectilinearGridBuilder<S> {
        RectilinearGridBuilder::new()
    }

    /// x 方向单元数
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// y 方向单元数
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// 垂向层数（无垂向度量时为 0）
    #[inline]
    pub fn nz(&self) -> usize {
        self.z_faces.len().saturating_sub(1)
    }

    /// 水平单元总数 nx·ny
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.nx * self.ny
    }

    /// halo 宽度 (hx, hy)
    #[inline]
    pub fn halo(&self) -> (usize, usize) {
        (self.hx, self.hy)
    }

    /// 轴拓扑 (x, y)
    #[inline]
    pub fn topology(&self) -> (Topology, Topology) {
        self.topology
    }

    /// 单元 i 的 x 宽度 Δxᶜ（halo 内按拓扑延拓）
    #[inline]
    pub fn dx_c(&self, i: isize) -> S {
        self.dx_c[(i + self.hx as isize) as usize]
    }

    /// 单元 j 的 y 宽度 Δyᶜ
    #[inline]
    pub fn dy_c(&self, j: isize) -> S {
        self.dy_c[(j + self.hy as isize) as usize]
    }

    /// x 界面 i 两侧单元中心距离 Δxᶠ
    ///
    /// 界面 i 位于单元 i-1 与 i 之间。
    #[inline]
    pub fn dx_f(&self, i: isize) -> S {
        (self.dx_c(i - 1) + self.dx_c(i)) * S::HALF
    }

    /// y 界面 j 两侧单元中心距离 Δyᶠ
    #[inline]
    pub fn dy_f(&self, j: isize) -> S {
        (self.dy_c(j - 1) + self.dy_c(j)) * S::HALF
    }

    /// 单元水平面积 Az = Δxᶜ·Δyᶜ
    #[inline]
    pub fn az(&self, i: isize, j: isize) -> S {
        self.dx_c(i) * self.dy_c(j)
    }

    /// 第 k 层厚度
    #[inline]
    pub fn dz(&self, k: usize) -> S {
        self.z_faces[k + 1] - self.z_faces[k]
    }

    /// 第 k 个层界面高度（k = 0 为最深）
    #[inline]
    pub fn z_face(&self, k: usize) -> S {
        self.z_faces[k]
    }

    /// 所有层界面
    pub fn z_faces(&self) -> &[S] {
        &self.z_faces
    }

    /// 静止自由面高度（最上层界面）
    pub fn top(&self) -> Option<S> {
        self.z_faces.last().copied()
    }

    /// 底高程（含 halo）
    #[inline]
    pub fn bottom_height(&self, i: isize, j: isize) -> S {
        self.bottom.get(i, j)
    }

    /// 底高程场
    pub fn bottom(&self) -> &Field2D<S> {
        &self.bottom
    }

    /// 按网格拓扑填充场的 halo
    ///
    /// # Panics
    /// 场的尺寸或 halo 与网格不一致时 panic。
    pub fn fill_halo_regions(&self, field: &mut Field2D<S>) {
        assert_eq!(field.size(), (self.nx, self.ny), "场尺寸与网格不一致");
        assert_eq!(field.halo(), (self.hx, self.hy), "场 halo 与网格不一致");
        fill_halo_regions(field, self.topology);
    }

    /// 在本网格上创建零场
    pub fn field(&self, location: (Location, Location)) -> Field2D<S> {
        Field2D::new(self, location)
    }

    /// 单元中心场 (Center, Center)
    pub fn center_field(&self) -> Field2D<S> {
        self.field((Location::Center, Location::Center))
    }

    /// 单元 (i, j) 的打包行号 i + nx·j
    #[inline]
    pub fn linear_index(&self, i: usize, j: usize) -> usize {
        i + self.nx * j
    }
}

// ============================================================
// 构建器
// ============================================================

/// 底高程来源
enum BottomSpec<S> {
    /// 平底，取最深层界面
    Flat,
    /// 按行优先给出 nx·ny 个值
    Values(Vec<S>),
    /// 由单元中心坐标 (x, y) 计算
    Function(Box<dyn Fn(S, S) -> S>),
}

/// 水平间距来源
enum SpacingSpec<S> {
    Uniform(S),
    Values(Vec<S>),
}

/// 网格构建器
pub struct RectilinearGridBuilder<S: RuntimeScalar> {
    nx: usize,
    ny: usize,
    hx: usize,
    hy: usize,
    topology: (Topology, Topology),
    dx: Option<SpacingSpec<S>>,
    dy: Option<SpacingSpec<S>>,
    z_faces: Vec<S>,
    bottom: BottomSpec<S>,
}

impl<S: RuntimeScalar> Default for RectilinearGridBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RuntimeScalar> RectilinearGridBuilder<S> {
    /// 默认 1×1 有界网格，halo 为 1，无垂向度量
    pub fn new() -> Self {
        Self {
            nx: 1,
            ny: 1,
            hx: 1,
            hy: 1,
            topology: (Topology::Bounded, Topology::Bounded),
            dx: None,
            dy: None,
            z_faces: Vec::new(),
            bottom: BottomSpec::Flat,
        }
    }

    /// 单元数
    pub fn size(mut self, nx: usize, ny: usize) -> Self {
        self.nx = nx;
        self.ny = ny;
        self
    }

    /// halo 宽度
    pub fn halo(mut self, hx: usize, hy: usize) -> Self {
        self.hx = hx;
        self.hy = hy;
        self
    }

    /// 轴拓扑
    pub fn topology(mut self, x: Topology, y: Topology) -> Self {
        self.topology = (x, y);
        self
    }

    /// 均匀水平间距
    pub fn uniform_spacing(mut self, dx: S, dy: S) -> Self {
        self.dx = Some(SpacingSpec::Uniform(dx));
        self.dy = Some(SpacingSpec::Uniform(dy));
        self
    }

    /// 逐单元 x 宽度（长度 nx）
    pub fn x_spacing(mut self, dx: Vec<S>) -> Self {
        self.dx = Some(SpacingSpec::Values(dx));
        self
    }

    /// 逐单元 y 宽度（长度 ny）
    pub fn y_spacing(mut self, dy: Vec<S>) -> Self {
        self.dy = Some(SpacingSpec::Values(dy));
        self
    }

    /// 垂向层界面（自下而上）
    pub fn z_faces(mut self, z_faces: Vec<S>) -> Self {
        self.z_faces = z_faces;
        self
    }

    /// 均匀分层：从 -depth 到 0 的 nz 层
    pub fn uniform_depth(mut self, depth: S, nz: usize) -> Self {
        let dz = depth / S::from_count(nz.max(1));
        self.z_faces = (0..=nz).map(|k| -depth + dz * S::from_count(k)).collect();
        self
    }

    /// 逐单元底高程（行优先，长度 nx·ny）
    pub fn bottom_heights(mut self, values: Vec<S>) -> Self {
        self.bottom = BottomSpec::Values(values);
        self
    }

    /// 由单元中心坐标计算底高程，坐标原点在西南角
    pub fn bottom_height_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(S, S) -> S + 'static,
    {
        self.bottom = BottomSpec::Function(Box::new(f));
        self
    }

    /// 校验并构建
    pub fn build(self) -> OceanResult<RectilinearGrid<S>> {
        if self.nx == 0 || self.ny == 0 {
            return Err(OceanError::invalid_grid(format!(
                "单元数必须为正: nx = {}, ny = {}",
                self.nx, self.ny
            )));
        }
        if self.hx == 0 || self.hy == 0 {
            return Err(OceanError::invalid_grid(format!(
                "halo 宽度至少为 1: hx = {}, hy = {}",
                self.hx, self.hy
            )));
        }

        let dx = Self::check_spacing("dx", self.dx, self.nx)?;
        let dy = Self::check_spacing("dy", self.dy, self.ny)?;

        let dx_c = extend_with_halo(&dx, self.hx, self.topology.0);
        let dy_c = extend_with_halo(&dy, self.hy, self.topology.1);

        let mut bottom = Field2D::with_layout(
            self.nx,
            self.ny,
            (self.hx, self.hy),
            self.topology,
            (Location::Center, Location::Center),
        );
        let floor = self.z_faces.first().copied().unwrap_or(S::ZERO);
        match self.bottom {
            BottomSpec::Flat => {
                for j in 0..self.ny as isize {
                    for i in 0..self.nx as isize {
                        bottom.set(i, j, floor);
                    }
                }
            }
            BottomSpec::Values(values) => {
                if values.len() != self.nx * self.ny {
                    return Err(OceanError::SizeMismatch {
                        what: "bottom_heights",
                        expected: self.nx * self.ny,
                        actual: values.len(),
                    });
                }
                bottom.unpack_interior(&values);
            }
            BottomSpec::Function(f) => {
                let mut y = S::ZERO;
                for (j, &hy) in dy.iter().enumerate() {
                    let yc = y + hy * S::HALF;
                    let mut x = S::ZERO;
                    for (i, &hx) in dx.iter().enumerate() {
                        let xc = x + hx * S::HALF;
                        bottom.set(i as isize, j as isize, f(xc, yc));
                        x += hx;
                    }
                    y += hy;
                }
            }
        }
        fill_halo_regions(&mut bottom, self.topology);

        log::debug!(
            "直线网格: {}x{}x{}, halo ({}, {}), 拓扑 {:?}",
            self.nx,
            self.ny,
            self.z_faces.len().saturating_sub(1),
            self.hx,
            self.hy,
            self.topology
        );

        Ok(RectilinearGrid {
            nx: self.nx,
            ny: self.ny,
            hx: self.hx,
            hy: self.hy,
            topology: self.topology,
            dx_c,
            dy_c,
            z_faces: self.z_faces,
            bottom,
        })
    }

    fn check_spacing(name: &str, spacing: Option<SpacingSpec<S>>, n: usize) -> OceanResult<Vec<S>> {
        let spacing = match spacing {
            Some(SpacingSpec::Uniform(d)) => vec![d; n],
            Some(SpacingSpec::Values(v)) => v,
            None => return Err(OceanError::invalid_grid(format!("未设置水平间距 {}", name))),
        };
        if spacing.len() != n {
            return Err(OceanError::invalid_grid(format!(
                "{} 长度 {} 与单元数 {} 不一致",
                name,
                spacing.len(),
                n
            )));
        }
        if let Some((idx, v)) = spacing
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= S::ZERO)
        {
            return Err(OceanError::invalid_grid(format!(
                "{}[{}] = {} 必须为正的有限值",
                name, idx, v
            )));
        }
        Ok(spacing)
    }
}

/// 按中心交错规则把一维间距延拓到 halo
fn extend_with_halo<S: RuntimeScalar>(spacing: &[S], halo: usize, topology: Topology) -> Vec<S> {
    let n = spacing.len();
    (-(halo as isize)..(n + halo) as isize)
        .map(|i| spacing[source_index(i, n, topology, Location::Center) as usize])
        .collect()
}
