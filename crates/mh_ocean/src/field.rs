// crates/mh_ocean/src/field.rs

//! 带 halo 的水平二维场
//!
//! 存储为 `(nx + 2hx) × (ny + 2hy)` 的行优先数组，x 为快变维。
//! 索引 `(i, j)` 为有符号整数：内部从 0 开始，halo 为负数或超过内部范围。
//!
//! 有界轴上的 Face 场有 N+1 个内部点，第 N 个点占用第一个 halo 槽位，
//! 因此 halo 宽度至少为 1。

use std::ops::{Index, IndexMut};

use mh_runtime::RuntimeScalar;

use crate::grid::{interior_extent, Location, RectilinearGrid, Topology};

/// 水平二维场
#[derive(Debug, Clone, PartialEq)]
pub struct Field2D<S: RuntimeScalar> {
    nx: usize,
    ny: usize,
    hx: usize,
    hy: usize,
    extent: (usize, usize),
    location: (Location, Location),
    data: Vec<S>,
}

impl<S: RuntimeScalar> Field2D<S> {
    /// 在网格上创建零场
    pub fn new(grid: &RectilinearGrid<S>, location: (Location, Location)) -> Self {
        let (tx, ty) = grid.topology();
        Self::with_layout(grid.nx(), grid.ny(), grid.halo(), (tx, ty), location)
    }

    /// 按原始布局创建零场
    ///
    /// # Panics
    /// halo 宽度为 0 时 panic。
    pub fn with_layout(
        nx: usize,
        ny: usize,
        halo: (usize, usize),
        topology: (Topology, Topology),
        location: (Location, Location),
    ) -> Self {
        let (hx, hy) = halo;
        assert!(hx >= 1 && hy >= 1, "halo 宽度至少为 1");
        let extent = (
            interior_extent(nx, topology.0, location.0),
            interior_extent(ny, topology.1, location.1),
        );
        Self {
            nx,
            ny,
            hx,
            hy,
            extent,
            location,
            data: vec![S::ZERO; (nx + 2 * hx) * (ny + 2 * hy)],
        }
    }

    /// 单元数 (nx, ny)
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// halo 宽度 (hx, hy)
    #[inline]
    pub fn halo(&self) -> (usize, usize) {
        (self.hx, self.hy)
    }

    /// 内部点数（考虑有界 Face 的 N+1）
    #[inline]
    pub fn interior_extent(&self) -> (usize, usize) {
        self.extent
    }

    /// 交错位置
    #[inline]
    pub fn location(&self) -> (Location, Location) {
        self.location
    }

    /// 存储行长度 nx + 2hx
    #[inline]
    pub fn row_len(&self) -> usize {
        self.nx + 2 * self.hx
    }

    /// 存储行数 ny + 2hy
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.ny + 2 * self.hy
    }

    /// 有符号索引 → 线性存储位置
    #[inline]
    pub fn offset(&self, i: isize, j: isize) -> usize {
        let ii = i + self.hx as isize;
        let jj = j + self.hy as isize;
        debug_assert!(
            ii >= 0 && (ii as usize) < self.row_len() && jj >= 0 && (jj as usize) < self.n_rows(),
            "索引 ({}, {}) 越界",
            i,
            j
        );
        ii as usize + jj as usize * self.row_len()
    }

    /// 读取 (i, j)
    #[inline]
    pub fn get(&self, i: isize, j: isize) -> S {
        self.data[self.offset(i, j)]
    }

    /// 写入 (i, j)
    #[inline]
    pub fn set(&mut self, i: isize, j: isize, value: S) {
        let idx = self.offset(i, j);
        self.data[idx] = value;
    }

    /// 全部存储（含 halo）
    #[inline]
    pub fn data(&self) -> &[S] {
        &self.data
    }

    /// 全部存储（含 halo，可变）
    #[inline]
    pub fn data_mut(&mut self) -> &mut [S] {
        &mut self.data
    }

    /// 以常数填充全部存储
    pub fn fill(&mut self, value: S) {
        self.data.fill(value);
    }

    /// 内部点迭代 (i, j, value)，j 外层
    pub fn interior(&self) -> impl Iterator<Item = (isize, isize, S)> + '_ {
        let (ex, ey) = self.extent;
        (0..ey as isize)
            .flat_map(move |j| (0..ex as isize).map(move |i| (i, j, self.get(i, j))))
    }

    /// 与另一个场是否同布局
    pub fn same_layout(&self, other: &Self) -> bool {
        self.nx == other.nx
            && self.ny == other.ny
            && self.hx == other.hx
            && self.hy == other.hy
            && self.location == other.location
    }

    /// 按单元打包内部值，`out[i + nx·j]`
    ///
    /// 只对 (Center, Center) 场有意义。
    ///
    /// # Panics
    /// 非单元中心场或长度不等于 nx·ny 时 panic。
    pub fn pack_interior(&self, out: &mut [S]) {
        assert_eq!(
            self.location,
            (Location::Center, Location::Center),
            "只有单元中心场可以打包"
        );
        assert_eq!(out.len(), self.nx * self.ny, "打包向量长度必须为 nx·ny");
        for j in 0..self.ny {
            let start = self.offset(0, j as isize);
            out[j * self.nx..(j + 1) * self.nx].copy_from_slice(&self.data[start..start + self.nx]);
        }
    }

    /// 从打包向量写回内部值（halo 不变）
    ///
    /// # Panics
    /// 非单元中心场或长度不等于 nx·ny 时 panic。
    pub fn unpack_interior(&mut self, src: &[S]) {
        assert_eq!(
            self.location,
            (Location::Center, Location::Center),
            "只有单元中心场可以解包"
        );
        assert_eq!(src.len(), self.nx * self.ny, "解包向量长度必须为 nx·ny");
        for j in 0..self.ny {
            let start = self.offset(0, j as isize);
            let nx = self.nx;
            self.data[start..start + nx].copy_from_slice(&src[j * nx..(j + 1) * nx]);
        }
    }
}

impl<S: RuntimeScalar> Index<(isize, isize)> for Field2D<S> {
    type Output = S;

    #[inline]
    fn index(&self, (i, j): (isize, isize)) -> &S {
        &self.data[self.offset(i, j)]
    }
}

impl<S: RuntimeScalar> IndexMut<(isize, isize)> for Field2D<S> {
    #[inline]
    fn index_mut(&mut self, (i, j): (isize, isize)) -> &mut S {
        let idx = self.offset(i, j);
        &mut self.data[idx]
    }
}

/// 分层场：每个垂向层一个 [`Field2D`]
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredField<S: RuntimeScalar> {
    levels: Vec<Field2D<S>>,
}

impl<S: RuntimeScalar> LayeredField<S> {
    /// 在网格上创建 nz 层零场
    pub fn new(grid: &RectilinearGrid<S>, location: (Location, Location)) -> Self {
        Self {
            levels: (0..grid.nz()).map(|_| Field2D::new(grid, location)).collect(),
        }
    }

    /// 层数
    #[inline]
    pub fn nz(&self) -> usize {
        self.levels.len()
    }

    /// 第 k 层
    #[inline]
    pub fn level(&self, k: usize) -> &Field2D<S> {
        &self.levels[k]
    }

    /// 第 k 层（可变）
    #[inline]
    pub fn level_mut(&mut self, k: usize) -> &mut Field2D<S> {
        &mut self.levels[k]
    }

    /// 所有层
    pub fn levels(&self) -> &[Field2D<S>] {
        &self.levels
    }

    /// 所有层（可变）
    pub fn levels_mut(&mut self) -> &mut [Field2D<S>] {
        &mut self.levels
    }

    /// 交错位置
    pub fn location(&self) -> Option<(Location, Location)> {
        self.levels.first().map(Field2D::location)
    }
}
