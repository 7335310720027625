// crates/mh_ocean/src/numerics/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 自由面椭圆算子、多重网格的延拓/限制算子以及各层 Galerkin 粗算子
//! 都以 CSR 存储。每行列索引严格递增，查找走二分。
//!
//! 支持泛型标量类型 `S: RuntimeScalar`（f32 或 f64）。
//!
//! # 使用示例
//!
//! ```
//! use mh_ocean::numerics::linear_algebra::csr::CsrBuilder;
//!
//! let mut builder = CsrBuilder::<f64>::new_square(3);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 1, -1.0);
//! builder.set(1, 0, -1.0);
//! builder.set(1, 1, 4.0);
//! builder.set(1, 2, -1.0);
//! builder.set(2, 1, -1.0);
//! builder.set(2, 2, 4.0);
//!
//! let matrix = builder.build();
//!
//! let x = vec![1.0, 2.0, 3.0];
//! let mut y = vec![0.0; 3];
//! matrix.mul_vec(&x, &mut y);
//! assert_eq!(y, vec![2.0, 4.0, 10.0]);
//! ```

use mh_runtime::RuntimeScalar;

use std::collections::BTreeMap;

// =============================================================================
// 稀疏模式
// =============================================================================

/// CSR 矩阵的稀疏模式
///
/// 存储矩阵的结构信息（哪些位置有非零元），与值分离。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 获取行指针切片
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 获取列索引切片
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 获取第 row 行的非零元列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }
}

// =============================================================================
// CSR 矩阵主体
// =============================================================================

/// CSR 格式稀疏矩阵
///
/// `PartialEq` 按位比较模式与值，用于验证算子构建的确定性。
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<S: RuntimeScalar> {
    pattern: CsrPattern,
    values: Vec<S>,
}

impl<S: RuntimeScalar> CsrMatrix<S> {
    /// 从原始 CSR 数据创建矩阵
    ///
    /// # Panics
    ///
    /// 数组长度不一致，或某行列索引未严格递增时 panic。
    pub fn from_raw(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<S>,
    ) -> Self {
        assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr 长度必须为 n_rows + 1");
        assert_eq!(col_idx.len(), values.len(), "col_idx 和 values 长度必须相等");
        assert_eq!(row_ptr[n_rows], col_idx.len(), "row_ptr 末尾必须等于 nnz");
        for row in 0..n_rows {
            let cols = &col_idx[row_ptr[row]..row_ptr[row + 1]];
            assert!(
                cols.windows(2).all(|w| w[0] < w[1]),
                "第 {} 行列索引必须严格递增",
                row
            );
            assert!(cols.iter().all(|&c| c < n_cols), "列索引越界");
        }

        Self {
            pattern: CsrPattern {
                n_rows,
                n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 创建对角矩阵
    pub fn diagonal(diag: &[S]) -> Self {
        let n = diag.len();
        Self {
            pattern: CsrPattern {
                n_rows: n,
                n_cols: n,
                row_ptr: (0..=n).collect(),
                col_idx: (0..n).collect(),
            },
            values: diag.to_vec(),
        }
    }

    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 获取稀疏模式引用
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &[S] {
        &self.values
    }

    /// 获取行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        self.pattern.row_ptr()
    }

    /// 获取列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        self.pattern.col_idx()
    }

    /// 获取 (row, col) 位置的值（如果不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> S {
        self.pattern
            .find_index(row, col)
            .map_or(S::ZERO, |idx| self.values[idx])
    }

    /// 设置 (row, col) 位置的值（必须已存在该位置）
    ///
    /// 位置不存在时返回 `false` 且不修改矩阵。
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: S) -> bool {
        if let Some(idx) = self.pattern.find_index(row, col) {
            self.values[idx] = value;
            true
        } else {
            false
        }
    }

    /// 获取第 row 行的非零元视图
    #[inline]
    pub fn row(&self, row: usize) -> RowView<'_, S> {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        RowView {
            col_idx: &self.pattern.col_idx[start..end],
            values: &self.values[start..end],
        }
    }

    /// 获取对角元素值（第 row 行）
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<S> {
        self.pattern.find_index(row, row).map(|idx| self.values[idx])
    }

    /// 提取对角线元素向量（缺失的对角元记为 0）
    pub fn extract_diagonal(&self) -> Vec<S> {
        (0..self.n_rows())
            .map(|i| self.diagonal_value(i).unwrap_or(S::ZERO))
            .collect()
    }

    #[inline]
    fn row_dot(&self, row: usize, x: &[S]) -> S {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        let mut sum = S::ZERO;
        for idx in start..end {
            sum += self.values[idx] * x[self.pattern.col_idx[idx]];
        }
        sum
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row_dot(row, x);
        }
    }

    /// 矩阵-向量乘法加法 y += alpha * A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec_add(&self, alpha: S, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out += alpha * self.row_dot(row, x);
        }
    }

    /// 残差 r = b - A * x
    ///
    /// # Panics
    /// 长度与矩阵维度不一致时 panic。
    pub fn residual(&self, x: &[S], b: &[S], r: &mut [S]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(b.len(), self.n_rows(), "b 长度必须等于矩阵行数");
        assert_eq!(r.len(), self.n_rows(), "r 长度必须等于矩阵行数");

        for row in 0..self.n_rows() {
            r[row] = b[row] - self.row_dot(row, x);
        }
    }

    /// 检查矩阵是否对称（在容差范围内）
    pub fn is_symmetric(&self, tol: S) -> bool {
        if self.n_rows() != self.n_cols() {
            return false;
        }
        for i in 0..self.n_rows() {
            for (j, a_ij) in self.row(i).iter() {
                if j > i && (a_ij - self.get(j, i)).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// 计算矩阵的无穷范数（最大行和）
    pub fn infinity_norm(&self) -> S {
        (0..self.n_rows())
            .map(|row| self.row(row).values().iter().map(|v| v.abs()).sum::<S>())
            .fold(S::ZERO, |acc, s| acc.max(s))
    }

    // -------------------------------------------------------------------------
    // 代数运算（多重网格层次构建）
    // -------------------------------------------------------------------------

    /// 转置 Aᵀ
    ///
    /// 计数排序实现，输出每行列索引天然递增。
    pub fn transpose(&self) -> Self {
        let n_rows = self.n_cols();
        let n_cols = self.n_rows();
        let nnz = self.nnz();

        let mut row_ptr = vec![0usize; n_rows + 1];
        for &c in self.col_idx() {
            row_ptr[c + 1] += 1;
        }
        for i in 0..n_rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        let mut next = row_ptr.clone();
        let mut col_idx = vec![0usize; nnz];
        let mut values = vec![S::ZERO; nnz];
        for row in 0..self.n_rows() {
            for (col, v) in self.row(row).iter() {
                let dst = next[col];
                col_idx[dst] = row;
                values[dst] = v;
                next[col] += 1;
            }
        }

        Self {
            pattern: CsrPattern {
                n_rows,
                n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 稀疏矩阵乘法 C = A * B（Gustavson 行累加）
    ///
    /// 每行先按首次出现顺序收集列，再排序，保证结果确定。
    ///
    /// # Panics
    /// `self.n_cols() != other.n_rows()` 时 panic。
    pub fn matmul(&self, other: &Self) -> Self {
        assert_eq!(self.n_cols(), other.n_rows(), "矩阵乘法维度不匹配");

        let n_rows = self.n_rows();
        let n_cols = other.n_cols();
        let mut row_ptr = Vec::with_capacity(n_rows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);

        let mut accum = vec![S::ZERO; n_cols];
        let mut marker = vec![usize::MAX; n_cols];
        let mut row_cols: Vec<usize> = Vec::new();

        for i in 0..n_rows {
            row_cols.clear();
            for (k, a_ik) in self.row(i).iter() {
                for (j, b_kj) in other.row(k).iter() {
                    if marker[j] != i {
                        marker[j] = i;
                        accum[j] = S::ZERO;
                        row_cols.push(j);
                    }
                    accum[j] += a_ik * b_kj;
                }
            }
            row_cols.sort_unstable();
            for &j in &row_cols {
                col_idx.push(j);
                values.push(accum[j]);
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            pattern: CsrPattern {
                n_rows,
                n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// Galerkin 粗算子 R A P，`restriction` 取 Pᵀ 时保持对称
    ///
    /// # Panics
    /// 维度不匹配时 panic。
    pub fn galerkin_product(&self, prolongation: &Self, restriction: &Self) -> Self {
        restriction.matmul(&self.matmul(prolongation))
    }
}

impl<S: RuntimeScalar> From<CsrPattern> for CsrMatrix<S> {
    /// 从稀疏模式创建矩阵（值初始化为 0）
    fn from(pattern: CsrPattern) -> Self {
        let nnz = pattern.nnz();
        Self {
            pattern,
            values: vec![S::ZERO; nnz],
        }
    }
}

// =============================================================================
// 行视图
// =============================================================================

/// 行视图：提供对矩阵某一行的非零元的只读访问
pub struct RowView<'a, S: RuntimeScalar> {
    col_idx: &'a [usize],
    values: &'a [S],
}

impl<'a, S: RuntimeScalar> RowView<'a, S> {
    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &'a [S] {
        self.values
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 迭代 (列索引, 值) 对
    pub fn iter(&self) -> impl Iterator<Item = (usize, S)> + 'a {
        self.col_idx.iter().copied().zip(self.values.iter().copied())
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 每行一个 `BTreeMap`，列有序，同样的插入序列总是得到按位相同的矩阵。
pub struct CsrBuilder<S: RuntimeScalar> {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, S>>,
}

impl<S: RuntimeScalar> CsrBuilder<S> {
    /// 创建方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 创建构建器
    ///
    /// # Panics
    /// - `n_rows == 0` 或 `n_cols == 0`
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        assert!(n_rows > 0, "行数必须大于 0");
        assert!(n_cols > 0, "列数必须大于 0");

        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    ///
    /// # Panics
    /// 索引越界时 panic。
    pub fn set(&mut self, row: usize, col: usize, value: S) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// 索引越界时 panic。
    pub fn add(&mut self, row: usize, col: usize, value: S) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(S::ZERO) += value;
    }

    /// 获取 (row, col) 的当前值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> S {
        self.rows[row].get(&col).copied().unwrap_or(S::ZERO)
    }

    /// 获取当前非零元总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建 CSR 矩阵（消耗构建器）
    pub fn build(self) -> CsrMatrix<S> {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows: self.n_rows,
                n_cols: self.n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }
}

// =============================================================================
// 测试套件（泛型覆盖 f32/f64）
// =============================================================================
