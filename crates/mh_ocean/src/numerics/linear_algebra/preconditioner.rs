// crates/mh_ocean/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器模块
//!
//! 将 Ax = b 转换为条件数更好的 M⁻¹Ax = M⁻¹b。
//! 自由面算子是对称负定的，这里的预条件器同样保持负定（与 A 同号），
//! PCG 迭代因此不需要翻转符号。
//!
//! # 预条件器类型
//!
//! - [`IdentityPreconditioner`]: 恒等（无预条件）
//! - [`JacobiPreconditioner`]: 对角预条件
//! - [`MultigridPreconditioner`]: 单次 SA-AMG V 循环
//!
//! ```
//! use mh_ocean::numerics::linear_algebra::{CsrMatrix, JacobiPreconditioner, Preconditioner};
//!
//! let matrix = CsrMatrix::<f64>::diagonal(&[-2.0, -4.0]);
//! let precond = JacobiPreconditioner::from_matrix(&matrix);
//!
//! let mut z = vec![0.0; 2];
//! precond.apply(&[1.0, 1.0], &mut z);
//! assert_eq!(z, vec![-0.5, -0.25]);
//! ```

use parking_lot::Mutex;

use super::csr::CsrMatrix;
use super::multigrid::{MultigridHierarchy, MultigridParameters, VCycleWorkspace};
use mh_runtime::RuntimeScalar;

/// 预条件器 trait
///
/// 核心操作是 `apply`: z = M⁻¹ * r
pub trait Preconditioner<S: RuntimeScalar>: Send + Sync {
    /// 应用预条件器: z = M⁻¹ * r
    fn apply(&self, r: &[S], z: &mut [S]);

    /// 获取预条件器名称
    fn name(&self) -> &'static str;

    /// 系数矩阵变化后重建
    fn update(&mut self, matrix: &CsrMatrix<S>);
}

/// 恒等预条件器（无预条件）
#[derive(Debug, Clone, Default)]
pub struct IdentityPreconditioner;

impl IdentityPreconditioner {
    /// 创建恒等预条件器
    pub fn new() -> Self {
        Self
    }
}

impl<S: RuntimeScalar> Preconditioner<S> for IdentityPreconditioner {
    fn apply(&self, r: &[S], z: &mut [S]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix<S>) {}
}

/// Jacobi 预条件器（对角预条件）
///
/// M = diag(A)，即 z_i = r_i / A_ii。对角元为零的行退化为单位预条件。
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<S: RuntimeScalar> {
    inv_diag: Vec<S>,
}

impl<S: RuntimeScalar> JacobiPreconditioner<S> {
    /// 从 CSR 矩阵创建
    pub fn from_matrix(matrix: &CsrMatrix<S>) -> Self {
        Self::from_diagonal(&matrix.extract_diagonal())
    }

    /// 从对角向量创建
    pub fn from_diagonal(diag: &[S]) -> Self {
        let threshold = S::from_config(1e-14).unwrap_or(S::MIN_POSITIVE);
        let inv_diag = diag
            .iter()
            .map(|&d| if d.abs() > threshold { S::ONE / d } else { S::ONE })
            .collect();
        Self { inv_diag }
    }

    /// 获取对角元素倒数
    pub fn inv_diagonal(&self) -> &[S] {
        &self.inv_diag
    }
}

impl<S: RuntimeScalar> Preconditioner<S> for JacobiPreconditioner<S> {
    fn apply(&self, r: &[S], z: &mut [S]) {
        debug_assert_eq!(r.len(), z.len());
        debug_assert_eq!(r.len(), self.inv_diag.len());

        for ((zi, &ri), &inv_d) in z.iter_mut().zip(r.iter()).zip(self.inv_diag.iter()) {
            *zi = ri * inv_d;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix<S>) {
        *self = Self::from_matrix(matrix);
    }
}

/// 多重网格预条件器：z = V(r)，单次 V 循环，零初值
///
/// `apply` 只拿到 `&self`，V 循环工作区放在 `parking_lot::Mutex` 里。
pub struct MultigridPreconditioner<S: RuntimeScalar> {
    params: MultigridParameters<S>,
    hierarchy: MultigridHierarchy<S>,
    workspace: Mutex<VCycleWorkspace<S>>,
}

impl<S: RuntimeScalar> MultigridPreconditioner<S> {
    /// 为给定矩阵构建层次
    pub fn from_matrix(matrix: &CsrMatrix<S>, params: MultigridParameters<S>) -> Self {
        let hierarchy = MultigridHierarchy::build(matrix, params);
        let workspace = Mutex::new(hierarchy.workspace());
        Self {
            params,
            hierarchy,
            workspace,
        }
    }

    /// 当前层次
    pub fn hierarchy(&self) -> &MultigridHierarchy<S> {
        &self.hierarchy
    }
}

impl<S: RuntimeScalar> Preconditioner<S> for MultigridPreconditioner<S> {
    fn apply(&self, r: &[S], z: &mut [S]) {
        let mut ws = self.workspace.lock();
        self.hierarchy.v_cycle(r, z, &mut ws);
    }

    fn name(&self) -> &'static str {
        "Multigrid"
    }

    fn update(&mut self, matrix: &CsrMatrix<S>) {
        *self = Self::from_matrix(matrix, self.params);
    }
}
