// crates/mh_ocean/src/grid/mod.rs

//! 结构化直线网格
//!
//! - [`topology`]: 轴拓扑、交错位置与 halo 映射规则
//! - [`halo`]: halo 填充
//! - [`rectilinear`]: 可拉伸直线网格及其构建器

pub mod halo;
pub mod rectilinear;
pub mod topology;

pub use halo::fill_halo_regions;
pub use rectilinear::{RectilinearGrid, RectilinearGridBuilder};
pub use topology::{interior_extent, source_index, Location, Topology};
