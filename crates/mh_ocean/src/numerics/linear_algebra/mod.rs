// =============================================================================
// mh_ocean/src/numerics/linear_algebra/mod.rs
// =============================================================================
//! 稀疏线性代数模块
//!
//! 自由面椭圆方程所需的稀疏矩阵、预条件器、迭代求解器与代数多重网格。
//! 全部组件以 `S: RuntimeScalar` 为泛型参数。
//!
//! 层次关系：
//!
//! - `csr` / `vector_ops`: 存储与 BLAS-1 运算
//! - `preconditioner`: `Preconditioner<S>` 及 Identity/Jacobi/Multigrid
//! - `multigrid`: SA-AMG 层次、V 循环、`MultigridSolver`
//! - `solver`: PCG、`LinearSolver<S>` 接口与按配置创建

pub mod csr;
pub mod multigrid;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern, RowView};

pub use vector_ops::{axpy, copy, dot, norm2, xpay};

pub use preconditioner::{
    IdentityPreconditioner, JacobiPreconditioner, MultigridPreconditioner, Preconditioner,
};

pub use multigrid::{
    DenseLu, MultigridHierarchy, MultigridParameters, MultigridSolver, VCycleWorkspace,
};

pub use solver::{
    create_linear_solver, CgWorkspace, IterativeSolver, LinearSolver, PcgSolver,
    PreconditionedCgSolver, SolverConfig, SolverResult, SolverStatus,
};
