// crates/mh_runtime/src/lib.rs

//! MariHydro Runtime Layer (Layer 2)
//!
//! 运行时抽象层，为海洋核心层提供精度无关的标量抽象。
//!
//! # 模块概览
//!
//! - [`scalar`]: RuntimeScalar trait（密封，仅 f32/f64 可实现）
//! - [`numerics`]: 泛型数值工具（Kahan 补偿求和）
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: mh_config   ─> FreeSurfaceConfig（全 f64）
//! Layer 3: mh_ocean    ─> ImplicitFreeSurfaceSolver<S: RuntimeScalar>
//! Layer 2: mh_runtime  ─> RuntimeScalar, KahanSum (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod numerics;
pub mod scalar;

/// 层级标识
pub const LAYER: u8 = 2;

pub use numerics::KahanSum;
pub use scalar::RuntimeScalar;

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::{KahanSum, RuntimeScalar};
}
