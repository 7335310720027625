// crates/mh_ocean/src/numerics/linear_algebra/solver.rs
//! 迭代线性求解器
//!
//! 求解稀疏线性系统 Ax = b，支持泛型标量类型 `S: RuntimeScalar`。
//!
//! - [`IterativeSolver`] / [`PcgSolver`]: 给定矩阵与预条件器的一次性求解
//! - [`LinearSolver`]: 持有可替换算子的求解器接口，自由面求解器通过它委托
//!   - [`PreconditionedCgSolver`]: PCG + Identity/Jacobi/Multigrid 预条件
//!   - [`MultigridSolver`](super::multigrid::MultigridSolver): V 循环迭代
//!
//! # 使用示例
//!
//! ```
//! use mh_ocean::numerics::linear_algebra::{
//!     CsrBuilder, IterativeSolver, JacobiPreconditioner, PcgSolver, SolverConfig,
//! };
//!
//! let mut builder = CsrBuilder::<f64>::new_square(2);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 1, 1.0);
//! builder.set(1, 0, 1.0);
//! builder.set(1, 1, 3.0);
//! let matrix = builder.build();
//!
//! let b = vec![1.0, 2.0];
//! let mut x = vec![0.0; 2];
//! let precond = JacobiPreconditioner::from_matrix(&matrix);
//! let mut solver = PcgSolver::<f64>::new(SolverConfig::new(1e-12, 10));
//!
//! let result = solver.solve(&matrix, &b, &mut x, &precond);
//! assert!(result.is_converged());
//! ```

use super::csr::CsrMatrix;
use super::multigrid::{MultigridParameters, MultigridSolver};
use super::preconditioner::{
    IdentityPreconditioner, JacobiPreconditioner, MultigridPreconditioner, Preconditioner,
};
use super::vector_ops::{axpy, copy, dot, norm2, xpay};
use mh_config::{LinearSolverSettings, PreconditionerKind, SolverMethod};
use mh_runtime::RuntimeScalar;
use serde::{Deserialize, Serialize};

// ============================================================================
// 配置层 (Layer 4) - 允许使用 f64
// ============================================================================

/// 相对容差下限（以 `S::EPSILON` 为单位）
///
/// 低于该值的相对残差在对应精度下无法可靠达到，迭代只会以停滞告终。
pub const PRECISION_FLOOR: f64 = 64.0;

/// 求解器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差（相对 ‖b‖）
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 是否打印迭代信息
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::from_settings(&LinearSolverSettings::default())
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 从 `mh_config` 的求解器设置转换
    pub fn from_settings(settings: &LinearSolverSettings) -> Self {
        Self {
            rtol: settings.rtol,
            atol: settings.atol,
            max_iter: settings.max_iterations,
            verbose: settings.verbose,
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    /// 启用详细输出
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// 标量精度下实际使用的相对容差：`max(rtol, PRECISION_FLOOR·ε)`
    pub fn effective_rtol<S: RuntimeScalar>(&self) -> S {
        let floor = S::from_config_or(PRECISION_FLOOR, S::ONE) * S::EPSILON;
        S::from_config_or(self.rtol, S::EPSILON).max(floor)
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverResult<S: RuntimeScalar> {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: S,
    /// 初始残差范数
    pub initial_residual_norm: S,
    /// 相对残差（相对初始残差）
    pub relative_residual: S,
}

impl<S: RuntimeScalar> SolverResult<S> {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

/// CG 求解器工作区
///
/// 预分配的工作向量，避免 solve 内部频繁分配
#[derive(Debug, Clone, Default)]
pub struct CgWorkspace<S: RuntimeScalar> {
    /// 残差向量
    pub r: Vec<S>,
    /// 搜索方向
    pub p: Vec<S>,
    /// A*p
    pub ap: Vec<S>,
    /// 预条件后的残差
    pub z: Vec<S>,
}

impl<S: RuntimeScalar> CgWorkspace<S> {
    /// 创建新的工作区
    pub fn new(n: usize) -> Self {
        Self {
            r: vec![S::ZERO; n],
            p: vec![S::ZERO; n],
            ap: vec![S::ZERO; n],
            z: vec![S::ZERO; n],
        }
    }

    /// 调整工作区大小并清零
    pub fn resize(&mut self, n: usize) {
        if self.r.len() != n {
            *self = Self::new(n);
        } else {
            self.r.fill(S::ZERO);
            self.p.fill(S::ZERO);
            self.ap.fill(S::ZERO);
            self.z.fill(S::ZERO);
        }
    }
}

/// 迭代求解器 trait
pub trait IterativeSolver<S: RuntimeScalar> {
    /// 求解线性系统 Ax = b
    ///
    /// `x` 输入初始猜测，输出解。
    fn solve<P: Preconditioner<S> + ?Sized>(
        &mut self,
        matrix: &CsrMatrix<S>,
        b: &[S],
        x: &mut [S],
        precond: &P,
    ) -> SolverResult<S>;

    /// 获取求解器名称
    fn name(&self) -> &'static str;
}

/// 预条件共轭梯度法求解器
///
/// 适用于对称定号矩阵（正定或负定），预条件器须与矩阵同号。
pub struct PcgSolver<S: RuntimeScalar> {
    config: SolverConfig,
    workspace: CgWorkspace<S>,
}

impl<S: RuntimeScalar> PcgSolver<S> {
    /// 创建 PCG 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            workspace: CgWorkspace::default(),
        }
    }

    /// 求解器配置
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// 使用外部工作区求解（避免内部分配）
    pub fn solve_with_workspace<P: Preconditioner<S> + ?Sized>(
        &self,
        matrix: &CsrMatrix<S>,
        b: &[S],
        x: &mut [S],
        precond: &P,
        ws: &mut CgWorkspace<S>,
    ) -> SolverResult<S> {
        let n = b.len();
        ws.resize(n);
        let rtol = self.config.effective_rtol::<S>();
        let atol = S::from_config(self.config.atol).unwrap_or(S::MIN_POSITIVE);
        let stag_tol = S::from_config(1e-30).unwrap_or(S::MIN_POSITIVE);

        let relative = |norm: S, initial: S| norm.safe_div(initial, S::ZERO);

        // r = b - A*x
        matrix.residual(x, b, &mut ws.r);

        let initial_norm = norm2(&ws.r);
        let b_norm = norm2(b);

        // b ≈ 0 时只用绝对容差
        let effective_tol = if b_norm < S::MIN_POSITIVE {
            atol
        } else {
            atol.max(rtol * b_norm)
        };

        if initial_norm <= effective_tol {
            return SolverResult {
                status: SolverStatus::Converged,
                iterations: 0,
                residual_norm: initial_norm,
                initial_residual_norm: initial_norm,
                relative_residual: S::ZERO,
            };
        }

        // z = M^{-1} * r
        precond.apply(&ws.r, &mut ws.z);
        copy(&ws.z, &mut ws.p);

        let mut rz = dot(&ws.r, &ws.z);

        for iter in 0..self.config.max_iter {
            matrix.mul_vec(&ws.p, &mut ws.ap);

            let pap = dot(&ws.p, &ws.ap);
            if pap.abs() < stag_tol || !pap.is_finite() {
                let res = norm2(&ws.r);
                return SolverResult {
                    status: if pap.is_finite() {
                        SolverStatus::Stagnated
                    } else {
                        SolverStatus::Diverged
                    },
                    iterations: iter,
                    residual_norm: res,
                    initial_residual_norm: initial_norm,
                    relative_residual: relative(res, initial_norm),
                };
            }

            let alpha = rz / pap;
            axpy(alpha, &ws.p, x);
            axpy(-alpha, &ws.ap, &mut ws.r);

            let res_norm = norm2(&ws.r);

            if self.config.verbose {
                log::trace!("PCG iter {}: residual = {:.6e}", iter + 1, res_norm.to_config());
            }

            if !res_norm.is_finite() {
                return SolverResult {
                    status: SolverStatus::Diverged,
                    iterations: iter + 1,
                    residual_norm: res_norm,
                    initial_residual_norm: initial_norm,
                    relative_residual: relative(res_norm, initial_norm),
                };
            }

            if res_norm <= effective_tol {
                return SolverResult {
                    status: SolverStatus::Converged,
                    iterations: iter + 1,
                    residual_norm: res_norm,
                    initial_residual_norm: initial_norm,
                    relative_residual: relative(res_norm, initial_norm),
                };
            }

            precond.apply(&ws.r, &mut ws.z);

            let rz_new = dot(&ws.r, &ws.z);
            let beta = rz_new / rz;
            rz = rz_new;

            // p = z + beta * p
            xpay(&ws.z, beta, &mut ws.p);
        }

        let res = norm2(&ws.r);
        SolverResult {
            status: SolverStatus::MaxIterationsReached,
            iterations: self.config.max_iter,
            residual_norm: res,
            initial_residual_norm: initial_norm,
            relative_residual: relative(res, initial_norm),
        }
    }
}

impl<S: RuntimeScalar> IterativeSolver<S> for PcgSolver<S> {
    fn solve<P: Preconditioner<S> + ?Sized>(
        &mut self,
        matrix: &CsrMatrix<S>,
        b: &[S],
        x: &mut [S],
        precond: &P,
    ) -> SolverResult<S> {
        let mut ws = std::mem::take(&mut self.workspace);
        let result = self.solve_with_workspace(matrix, b, x, precond, &mut ws);
        self.workspace = ws;
        result
    }

    fn name(&self) -> &'static str {
        "PCG"
    }
}

// ============================================================================
// 持有算子的线性求解器
// ============================================================================

/// 持有可替换算子的线性求解器
///
/// `set_operator` 之后 `solve` 总是针对最近一次设置的算子。
/// 不收敛不是错误，通过 [`SolverResult::status`] 报告。
pub trait LinearSolver<S: RuntimeScalar>: Send {
    /// 替换算子（重建预条件器/层次）
    fn set_operator(&mut self, operator: CsrMatrix<S>);

    /// 当前算子
    fn operator(&self) -> Option<&CsrMatrix<S>>;

    /// 求解 A x = b，`x` 输入为初始猜测
    ///
    /// # Panics
    /// 尚未设置算子或向量长度与算子不一致时 panic。
    fn solve(&mut self, x: &mut [S], b: &[S]) -> SolverResult<S>;

    /// 求解器名称
    fn name(&self) -> &'static str;
}

/// PCG + 可选预条件器
pub struct PreconditionedCgSolver<S: RuntimeScalar> {
    pcg: PcgSolver<S>,
    kind: PreconditionerKind,
    params: MultigridParameters<S>,
    operator: Option<CsrMatrix<S>>,
    preconditioner: Option<Box<dyn Preconditioner<S>>>,
}

impl<S: RuntimeScalar> PreconditionedCgSolver<S> {
    /// 创建求解器（尚无算子）
    pub fn new(
        config: SolverConfig,
        kind: PreconditionerKind,
        params: MultigridParameters<S>,
    ) -> Self {
        Self {
            pcg: PcgSolver::new(config),
            kind,
            params,
            operator: None,
            preconditioner: None,
        }
    }

    /// 预条件器类型
    pub fn preconditioner_kind(&self) -> PreconditionerKind {
        self.kind
    }

    /// 当前预条件器名称，尚无算子时为 `None`
    pub fn preconditioner_name(&self) -> Option<&'static str> {
        self.preconditioner.as_ref().map(|p| p.name())
    }

    fn build_preconditioner(&self, operator: &CsrMatrix<S>) -> Box<dyn Preconditioner<S>> {
        match self.kind {
            PreconditionerKind::Identity => Box::new(IdentityPreconditioner::new()),
            PreconditionerKind::Jacobi => Box::new(JacobiPreconditioner::from_matrix(operator)),
            PreconditionerKind::Multigrid => {
                Box::new(MultigridPreconditioner::from_matrix(operator, self.params))
            }
        }
    }
}

impl<S: RuntimeScalar> LinearSolver<S> for PreconditionedCgSolver<S> {
    fn set_operator(&mut self, operator: CsrMatrix<S>) {
        match self.preconditioner.as_mut() {
            Some(preconditioner) => preconditioner.update(&operator),
            None => self.preconditioner = Some(self.build_preconditioner(&operator)),
        }
        self.operator = Some(operator);
    }

    fn operator(&self) -> Option<&CsrMatrix<S>> {
        self.operator.as_ref()
    }

    fn solve(&mut self, x: &mut [S], b: &[S]) -> SolverResult<S> {
        let (Some(operator), Some(preconditioner)) =
            (self.operator.as_ref(), self.preconditioner.as_deref())
        else {
            panic!("PreconditionedCgSolver::solve 调用前必须先 set_operator");
        };
        assert_eq!(b.len(), operator.n_rows(), "右端项长度与算子不匹配");
        assert_eq!(x.len(), operator.n_cols(), "解向量长度与算子不匹配");
        self.pcg.solve(operator, b, x, preconditioner)
    }

    fn name(&self) -> &'static str {
        "PreconditionedCG"
    }
}

/// 按配置创建线性求解器
pub fn create_linear_solver<S: RuntimeScalar>(
    settings: &LinearSolverSettings,
) -> Box<dyn LinearSolver<S>> {
    let config = SolverConfig::from_settings(settings);
    let params = MultigridParameters::from_settings(&settings.multigrid);
    match settings.method {
        SolverMethod::Multigrid => Box::new(MultigridSolver::new(config, params)),
        SolverMethod::PreconditionedConjugateGradient => Box::new(PreconditionedCgSolver::new(
            config,
            settings.preconditioner,
            params,
        )),
    }
}
