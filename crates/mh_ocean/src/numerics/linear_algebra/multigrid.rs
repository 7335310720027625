// crates/mh_ocean/src/numerics/linear_algebra/multigrid.rs

//! 光滑聚合代数多重网格（SA-AMG）
//!
//! 自由面算子是变系数、可能带干单元/周期连接的 CSR 矩阵，几何粗化不可靠，
//! 这里只依赖矩阵本身构建层次：
//!
//! 1. 强连接：`|aᵢⱼ| ≥ θ·√|aᵢᵢ·aⱼⱼ|`
//! 2. 贪心三遍聚合 → 分片常数延拓 P₀
//! 3. 延拓光滑：`P = (I − ω D⁻¹A) P₀`，`ω = 4/(3ρ)`，ρ 取 Gershgorin 上界
//! 4. Galerkin 粗算子 `PᵀAP`，限制算子 `R = Pᵀ`
//!
//! V 循环使用加权 Jacobi 前/后光滑，最粗层用部分选主元稠密 LU 直接求解。
//! 前后光滑次数相同时 V 循环是对称算子，可以直接作 PCG 预条件器。
//!
//! 矩阵的符号不影响算法：负定算子的 Jacobi 与 LU 同样成立。

use mh_config::MultigridSettings;
use mh_runtime::RuntimeScalar;

use super::csr::{CsrBuilder, CsrMatrix};
use super::solver::{LinearSolver, SolverConfig, SolverResult, SolverStatus};
use super::vector_ops::{axpy, norm2};

/// 稠密 LU 允许的最大粗网格规模
const MAX_DIRECT_SIZE: usize = 1024;

/// 粗网格无法直接分解时的 Jacobi 迭代次数
const COARSE_JACOBI_SWEEPS: usize = 32;

/// 残差增长超过初始残差该倍数视为发散
const DIVERGENCE_FACTOR: f64 = 1e10;

// =============================================================================
// 参数
// =============================================================================

/// 多重网格参数（计算精度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultigridParameters<S: RuntimeScalar> {
    /// 最大层数（含最细层）
    pub max_levels: usize,
    /// 粗网格规模上限
    pub coarse_size: usize,
    /// 强连接阈值 θ
    pub strength_threshold: S,
    /// 加权 Jacobi 权重
    pub smoother_weight: S,
    /// 前光滑次数
    pub pre_smooth: usize,
    /// 后光滑次数
    pub post_smooth: usize,
}

impl<S: RuntimeScalar> Default for MultigridParameters<S> {
    fn default() -> Self {
        Self::from_settings(&MultigridSettings::default())
    }
}

impl<S: RuntimeScalar> MultigridParameters<S> {
    /// 从配置层参数转换
    pub fn from_settings(settings: &MultigridSettings) -> Self {
        Self {
            max_levels: settings.max_levels.max(1),
            coarse_size: settings.coarse_size.max(1),
            strength_threshold: S::from_config_or(settings.strength_threshold, S::ZERO),
            smoother_weight: S::from_config_or(settings.smoother_weight, S::ONE),
            pre_smooth: settings.pre_smooth,
            post_smooth: settings.post_smooth,
        }
    }
}

// =============================================================================
// 最粗层直接求解
// =============================================================================

/// 部分选主元稠密 LU 分解
#[derive(Debug, Clone)]
pub struct DenseLu<S: RuntimeScalar> {
    n: usize,
    lu: Vec<S>,
    pivots: Vec<usize>,
}

impl<S: RuntimeScalar> DenseLu<S> {
    /// 分解 CSR 矩阵，主元过小（数值奇异）时返回 `None`
    pub fn factor(matrix: &CsrMatrix<S>) -> Option<Self> {
        let n = matrix.n_rows();
        if n == 0 || n != matrix.n_cols() {
            return None;
        }

        let mut lu = vec![S::ZERO; n * n];
        for i in 0..n {
            for (j, v) in matrix.row(i).iter() {
                lu[i * n + j] = v;
            }
        }

        let scale = lu.iter().fold(S::ZERO, |acc, v| acc.max(v.abs()));
        let tiny = scale * S::EPSILON * S::from_count(n);
        let mut pivots = vec![0usize; n];

        for k in 0..n {
            let mut p = k;
            let mut max = lu[k * n + k].abs();
            for i in (k + 1)..n {
                let v = lu[i * n + k].abs();
                if v > max {
                    max = v;
                    p = i;
                }
            }
            if max.is_nan() || max <= tiny {
                return None;
            }
            pivots[k] = p;
            if p != k {
                for j in 0..n {
                    lu.swap(k * n + j, p * n + j);
                }
            }

            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                if factor != S::ZERO {
                    for j in (k + 1)..n {
                        let u = lu[k * n + j];
                        lu[i * n + j] -= factor * u;
                    }
                }
            }
        }

        Some(Self { n, lu, pivots })
    }

    /// 求解 LU x = b
    pub fn solve(&self, b: &[S], x: &mut [S]) {
        let n = self.n;
        debug_assert_eq!(b.len(), n);
        debug_assert_eq!(x.len(), n);

        x.copy_from_slice(b);
        for k in 0..n {
            x.swap(k, self.pivots[k]);
        }
        // 前代（L 对角为 1）
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum;
        }
        // 回代
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum / self.lu[i * n + i];
        }
    }
}

#[derive(Debug, Clone)]
enum CoarseSolver<S: RuntimeScalar> {
    Direct(DenseLu<S>),
    Jacobi { sweeps: usize },
}

// =============================================================================
// 层次构建
// =============================================================================

#[derive(Debug, Clone)]
struct Level<S: RuntimeScalar> {
    operator: CsrMatrix<S>,
    inv_diag: Vec<S>,
}

impl<S: RuntimeScalar> Level<S> {
    fn new(operator: CsrMatrix<S>) -> Self {
        let inv_diag = inverse_diagonal(&operator);
        Self { operator, inv_diag }
    }

    fn size(&self) -> usize {
        self.operator.n_rows()
    }
}

#[derive(Debug, Clone)]
struct Transfer<S: RuntimeScalar> {
    prolongation: CsrMatrix<S>,
    restriction: CsrMatrix<S>,
}

fn inverse_diagonal<S: RuntimeScalar>(matrix: &CsrMatrix<S>) -> Vec<S> {
    matrix
        .extract_diagonal()
        .into_iter()
        .map(|d| S::ONE.safe_div(d, S::ZERO))
        .collect()
}

/// 对称强连接图（不含对角）
fn strength_of_connection<S: RuntimeScalar>(matrix: &CsrMatrix<S>, theta: S) -> Vec<Vec<usize>> {
    let diag = matrix.extract_diagonal();
    (0..matrix.n_rows())
        .map(|i| {
            matrix
                .row(i)
                .iter()
                .filter(|&(j, v)| {
                    j != i
                        && v != S::ZERO
                        && v.abs() >= theta * (diag[i] * diag[j]).abs().sqrt()
                })
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

/// 贪心聚合，返回每个节点的聚合编号与聚合总数
///
/// 第一遍：邻居全未聚合的节点与其强邻居组成新聚合（孤立节点自成一组）；
/// 第二遍：剩余节点并入任一已聚合强邻居所在的聚合；
/// 第三遍：仍未聚合的节点与其未聚合强邻居组成新聚合。
fn aggregate(strength: &[Vec<usize>]) -> (Vec<usize>, usize) {
    const UNASSIGNED: usize = usize::MAX;
    let n = strength.len();
    let mut agg = vec![UNASSIGNED; n];
    let mut count = 0usize;

    for i in 0..n {
        if agg[i] != UNASSIGNED {
            continue;
        }
        if strength[i].iter().all(|&j| agg[j] == UNASSIGNED) {
            agg[i] = count;
            for &j in &strength[i] {
                agg[j] = count;
            }
            count += 1;
        }
    }

    let first_pass = agg.clone();
    for i in 0..n {
        if agg[i] != UNASSIGNED {
            continue;
        }
        if let Some(&j) = strength[i].iter().find(|&&j| first_pass[j] != UNASSIGNED) {
            agg[i] = first_pass[j];
        }
    }

    for i in 0..n {
        if agg[i] != UNASSIGNED {
            continue;
        }
        agg[i] = count;
        for &j in &strength[i] {
            if agg[j] == UNASSIGNED {
                agg[j] = count;
            }
        }
        count += 1;
    }

    (agg, count)
}

/// Gershgorin 上界 ρ(D⁻¹A) ≤ maxᵢ Σⱼ |aᵢⱼ / aᵢᵢ|
fn spectral_radius_bound<S: RuntimeScalar>(matrix: &CsrMatrix<S>, inv_diag: &[S]) -> S {
    (0..matrix.n_rows())
        .map(|i| {
            let row_sum: S = matrix.row(i).values().iter().map(|v| v.abs()).sum();
            row_sum * inv_diag[i].abs()
        })
        .fold(S::ZERO, |acc, r| acc.max(r))
}

/// 光滑延拓算子 P = (I − ω D⁻¹A) P₀
fn smoothed_prolongation<S: RuntimeScalar>(
    level: &Level<S>,
    aggregates: &[usize],
    n_coarse: usize,
) -> CsrMatrix<S> {
    let n = level.size();
    let tentative = CsrMatrix::from_raw(
        n,
        n_coarse,
        (0..=n).collect(),
        aggregates.to_vec(),
        vec![S::ONE; n],
    );

    let rho = spectral_radius_bound(&level.operator, &level.inv_diag);
    let four_thirds = S::from_config_or(4.0 / 3.0, S::ONE);
    let omega = four_thirds.safe_div(rho, S::ZERO);

    let ap = level.operator.matmul(&tentative);
    let mut builder = CsrBuilder::new(n, n_coarse);
    for i in 0..n {
        builder.add(i, aggregates[i], S::ONE);
        let w = omega * level.inv_diag[i];
        for (j, v) in ap.row(i).iter() {
            builder.add(i, j, -w * v);
        }
    }
    builder.build()
}

/// 多重网格层次
///
/// `levels[0]` 为最细层，`transfers[l]` 连接第 l 与 l+1 层。
#[derive(Debug, Clone)]
pub struct MultigridHierarchy<S: RuntimeScalar> {
    levels: Vec<Level<S>>,
    transfers: Vec<Transfer<S>>,
    coarse: CoarseSolver<S>,
    params: MultigridParameters<S>,
}

impl<S: RuntimeScalar> MultigridHierarchy<S> {
    /// 从最细层算子构建层次
    pub fn build(operator: &CsrMatrix<S>, params: MultigridParameters<S>) -> Self {
        let mut levels = vec![Level::new(operator.clone())];
        let mut transfers = Vec::new();

        while levels.len() < params.max_levels {
            let Some(fine) = levels.last() else { break };
            let n = fine.size();
            if n <= params.coarse_size {
                break;
            }

            let strength = strength_of_connection(&fine.operator, params.strength_threshold);
            let (aggregates, n_coarse) = aggregate(&strength);
            if n_coarse == 0 || n_coarse >= n {
                log::debug!("多重网格粗化停止: 第 {} 层 {} 个未知量无法继续聚合", levels.len() - 1, n);
                break;
            }

            let prolongation = smoothed_prolongation(fine, &aggregates, n_coarse);
            let restriction = prolongation.transpose();
            let coarse_op = fine.operator.galerkin_product(&prolongation, &restriction);

            transfers.push(Transfer {
                prolongation,
                restriction,
            });
            levels.push(Level::new(coarse_op));
        }

        let coarsest = &levels[levels.len() - 1];
        let coarse = if coarsest.size() <= MAX_DIRECT_SIZE {
            match DenseLu::factor(&coarsest.operator) {
                Some(lu) => CoarseSolver::Direct(lu),
                None => {
                    log::warn!("最粗层矩阵数值奇异，退化为 Jacobi 迭代");
                    CoarseSolver::Jacobi {
                        sweeps: COARSE_JACOBI_SWEEPS,
                    }
                }
            }
        } else {
            CoarseSolver::Jacobi {
                sweeps: COARSE_JACOBI_SWEEPS,
            }
        };

        log::debug!(
            "多重网格层次: {} 层, 规模 {:?}",
            levels.len(),
            levels.iter().map(Level::size).collect::<Vec<_>>()
        );

        Self {
            levels,
            transfers,
            coarse,
            params,
        }
    }

    /// 层数
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// 各层规模（从细到粗）
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.iter().map(Level::size).collect()
    }

    /// 最细层算子
    pub fn operator(&self) -> &CsrMatrix<S> {
        &self.levels[0].operator
    }

    /// 最粗层是否使用直接求解
    pub fn has_direct_coarse_solve(&self) -> bool {
        matches!(self.coarse, CoarseSolver::Direct(_))
    }

    /// 分配与本层次匹配的工作区
    pub fn workspace(&self) -> VCycleWorkspace<S> {
        let sizes = self.level_sizes();
        VCycleWorkspace {
            b: sizes.iter().map(|&n| vec![S::ZERO; n]).collect(),
            x: sizes.iter().map(|&n| vec![S::ZERO; n]).collect(),
            r: sizes.iter().map(|&n| vec![S::ZERO; n]).collect(),
        }
    }

    fn smooth(level: &Level<S>, omega: S, b: &[S], x: &mut [S], r: &mut [S], sweeps: usize) {
        for _ in 0..sweeps {
            level.operator.residual(x, b, r);
            for ((xi, &ri), &d) in x.iter_mut().zip(r.iter()).zip(level.inv_diag.iter()) {
                *xi += omega * d * ri;
            }
        }
    }

    /// 单次 V 循环：x ≈ A⁻¹ b，x 从零初值开始（输入值被覆盖）
    pub fn v_cycle(&self, b: &[S], x: &mut [S], ws: &mut VCycleWorkspace<S>) {
        let last = self.levels.len() - 1;
        let omega = self.params.smoother_weight;
        ws.b[0].copy_from_slice(b);

        // 下行：光滑 → 残差 → 限制
        for l in 0..last {
            let level = &self.levels[l];
            ws.x[l].fill(S::ZERO);
            Self::smooth(level, omega, &ws.b[l], &mut ws.x[l], &mut ws.r[l], self.params.pre_smooth);
            level.operator.residual(&ws.x[l], &ws.b[l], &mut ws.r[l]);
            self.transfers[l].restriction.mul_vec(&ws.r[l], &mut ws.b[l + 1]);
        }

        // 最粗层
        let coarsest = &self.levels[last];
        match &self.coarse {
            CoarseSolver::Direct(lu) => lu.solve(&ws.b[last], &mut ws.x[last]),
            CoarseSolver::Jacobi { sweeps } => {
                ws.x[last].fill(S::ZERO);
                Self::smooth(coarsest, omega, &ws.b[last], &mut ws.x[last], &mut ws.r[last], *sweeps);
            }
        }

        // 上行：延拓校正 → 后光滑
        for l in (0..last).rev() {
            let (fine_x, coarse_x) = ws.x.split_at_mut(l + 1);
            self.transfers[l]
                .prolongation
                .mul_vec_add(S::ONE, &coarse_x[0], &mut fine_x[l]);
            Self::smooth(
                &self.levels[l],
                omega,
                &ws.b[l],
                &mut ws.x[l],
                &mut ws.r[l],
                self.params.post_smooth,
            );
        }

        x.copy_from_slice(&ws.x[0]);
    }
}

/// V 循环各层工作向量
#[derive(Debug, Clone, Default)]
pub struct VCycleWorkspace<S: RuntimeScalar> {
    b: Vec<Vec<S>>,
    x: Vec<Vec<S>>,
    r: Vec<Vec<S>>,
}

// =============================================================================
// 多重网格求解器
// =============================================================================

/// 以 V 循环为迭代的独立求解器
///
/// 每次迭代：`e = V(b − Ax)`，`x += e`，直到 `‖b − Ax‖ ≤ max(atol, rtol·‖b‖)`。
pub struct MultigridSolver<S: RuntimeScalar> {
    config: SolverConfig,
    params: MultigridParameters<S>,
    hierarchy: Option<MultigridHierarchy<S>>,
    workspace: VCycleWorkspace<S>,
    residual: Vec<S>,
    correction: Vec<S>,
}

impl<S: RuntimeScalar> MultigridSolver<S> {
    /// 创建求解器（尚无算子）
    pub fn new(config: SolverConfig, params: MultigridParameters<S>) -> Self {
        Self {
            config,
            params,
            hierarchy: None,
            workspace: VCycleWorkspace::default(),
            residual: Vec::new(),
            correction: Vec::new(),
        }
    }

    /// 当前层次
    pub fn hierarchy(&self) -> Option<&MultigridHierarchy<S>> {
        self.hierarchy.as_ref()
    }

    fn result(status: SolverStatus, iterations: usize, norm: S, initial: S) -> SolverResult<S> {
        SolverResult {
            status,
            iterations,
            residual_norm: norm,
            initial_residual_norm: initial,
            relative_residual: norm.safe_div(initial, S::ZERO),
        }
    }
}

impl<S: RuntimeScalar> LinearSolver<S> for MultigridSolver<S> {
    fn set_operator(&mut self, operator: CsrMatrix<S>) {
        let n = operator.n_rows();
        let hierarchy = MultigridHierarchy::build(&operator, self.params);
        self.workspace = hierarchy.workspace();
        self.residual = vec![S::ZERO; n];
        self.correction = vec![S::ZERO; n];
        self.hierarchy = Some(hierarchy);
    }

    fn operator(&self) -> Option<&CsrMatrix<S>> {
        self.hierarchy.as_ref().map(MultigridHierarchy::operator)
    }

    fn solve(&mut self, x: &mut [S], b: &[S]) -> SolverResult<S> {
        let Some(hierarchy) = self.hierarchy.as_ref() else {
            panic!("MultigridSolver::solve 调用前必须先 set_operator");
        };
        let a = hierarchy.operator();
        assert_eq!(b.len(), a.n_rows(), "右端项长度与算子不匹配");
        assert_eq!(x.len(), a.n_cols(), "解向量长度与算子不匹配");

        let rtol = self.config.effective_rtol::<S>();
        let atol = S::from_config_or(self.config.atol, S::ZERO);
        let divergence = S::from_config_or(DIVERGENCE_FACTOR, S::MAX);

        a.residual(x, b, &mut self.residual);
        let initial = norm2(&self.residual);
        let b_norm = norm2(b);
        let tol = if b_norm < S::MIN_POSITIVE {
            atol
        } else {
            atol.max(rtol * b_norm)
        };

        if initial <= tol {
            return Self::result(SolverStatus::Converged, 0, initial, initial);
        }

        let mut previous = initial;
        for iter in 1..=self.config.max_iter {
            hierarchy.v_cycle(&self.residual, &mut self.correction, &mut self.workspace);
            axpy(S::ONE, &self.correction, x);
            a.residual(x, b, &mut self.residual);
            let norm = norm2(&self.residual);

            if self.config.verbose {
                log::trace!("MG cycle {}: residual = {:.6e}", iter, norm.to_config());
            }

            if !norm.is_finite() || norm > divergence * initial {
                return Self::result(SolverStatus::Diverged, iter, norm, initial);
            }
            if norm <= tol {
                return Self::result(SolverStatus::Converged, iter, norm, initial);
            }
            if norm >= previous {
                return Self::result(SolverStatus::Stagnated, iter, norm, initial);
            }
            previous = norm;
        }

        Self::result(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            previous,
            initial,
        )
    }

    fn name(&self) -> &'static str {
        "Multigrid"
    }
}
