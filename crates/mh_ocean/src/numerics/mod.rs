// crates/mh_ocean/src/numerics/mod.rs

//! 数值方法模块
//!
//! 包含：
//! - linear_algebra/ - 稀疏线性代数 (CSR, PCG, SA-AMG)

pub mod linear_algebra;

// 稀疏线性代数
pub use linear_algebra::{
    // CSR 矩阵
    CsrBuilder,
    CsrMatrix,
    CsrPattern,
    // 向量运算
    axpy,
    copy,
    dot,
    norm2,
    xpay,
    // 预条件器
    IdentityPreconditioner,
    JacobiPreconditioner,
    MultigridPreconditioner,
    Preconditioner,
    // 多重网格
    MultigridHierarchy,
    MultigridParameters,
    MultigridSolver,
    // 求解器
    create_linear_solver,
    IterativeSolver,
    LinearSolver,
    PcgSolver,
    PreconditionedCgSolver,
    SolverConfig,
    SolverResult,
    SolverStatus,
};
