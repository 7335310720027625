// crates/mh_config/src/lib.rs

//! MariHydro Config Layer (Layer 4)
//!
//! 隐式自由面求解的运行配置。本层完全无泛型，所有数值使用 f64，
//! 由核心层在构建求解器时经 `RuntimeScalar::from_config` 转换到计算精度。
//!
//! # 模块概览
//!
//! - [`free_surface`]: FreeSurfaceConfig（重力、线性求解器、多重网格、并行）
//! - [`error`]: 配置错误类型
//!
//! # 示例
//!
//! ```
//! use mh_config::{FreeSurfaceConfig, SolverMethod};
//!
//! let json = r#"{ "solver": { "method": "preconditioned_conjugate_gradient" } }"#;
//! let config = FreeSurfaceConfig::from_json_str(json).unwrap();
//! assert_eq!(config.solver.method, SolverMethod::PreconditionedConjugateGradient);
//! assert_eq!(config.gravitational_acceleration, 9.80665);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod free_surface;

/// 层级标识
pub const LAYER: u8 = 4;

pub use error::ConfigError;
pub use free_surface::{
    FreeSurfaceConfig, LinearSolverSettings, MultigridSettings, ParallelSettings,
    PreconditionerKind, SolverMethod,
};
