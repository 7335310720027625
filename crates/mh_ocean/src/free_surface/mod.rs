// crates/mh_ocean/src/free_surface/mod.rs

//! 隐式自由面椭圆求解
//!
//! 组件（自底向上）：
//!
//! - [`lateral_areas`]: 垂向积分侧面积，每个网格计算一次
//! - [`operator`]: 由侧面积、g 与 Δt 组装椭圆算子
//! - [`rhs`]: 右端项、正压体积通量与正压速度修正
//! - [`cache`]: 算子缓存状态机
//! - [`solver`]: 求解编排与自由面时间步驱动

pub mod cache;
pub mod lateral_areas;
pub mod operator;
pub mod rhs;
pub mod solver;

pub use cache::{CachedTimeStep, OperatorCache, OperatorStatus};
pub use lateral_areas::{LateralAreaIntegrator, VerticallyIntegratedLateralAreas, X_FACE, Y_FACE};
pub use operator::OperatorBuilder;
pub use rhs::{
    apply_barotropic_correction, check_field, check_layered_field, compute_rhs,
    compute_vertically_integrated_volume_flux, flux_fields, CENTER,
};
pub use solver::{ImplicitFreeSurface, ImplicitFreeSurfaceSolver};
