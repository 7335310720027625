// crates/mh_ocean/src/grid/topology.rs

//! 轴拓扑与交错位置

use serde::{Deserialize, Serialize};

/// 水平轴拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Topology {
    /// 周期
    Periodic,
    /// 有界（两端为不可穿透壁面）
    #[default]
    Bounded,
}

/// 沿某轴的交错位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// 单元中心
    Center,
    /// 单元界面
    Face,
}

/// 沿一个轴的内部点数
///
/// 有界轴上的 Face 包含两端壁面，共 N+1 个点；其余情况 N 个点。
#[inline]
pub fn interior_extent(n: usize, topology: Topology, location: Location) -> usize {
    match (topology, location) {
        (Topology::Bounded, Location::Face) => n + 1,
        _ => n,
    }
}

/// 把任意（可能在 halo 中的）索引映射到提供其值的内部索引
///
/// - 周期：取模
/// - 有界 Center：关于壁面偶对称，`f[-k] = f[k-1]`，`f[N-1+k] = f[N-k]`
/// - 有界 Face：关于壁面对称，`f[-k] = f[k]`，`f[N+k] = f[N-k]`
///
/// halo 宽度超过 N 时反复折返，直到落入内部。
pub fn source_index(i: isize, n: usize, topology: Topology, location: Location) -> isize {
    let n = n as isize;
    match topology {
        Topology::Periodic => i.rem_euclid(n),
        Topology::Bounded => {
            let mut i = i;
            loop {
                match location {
                    Location::Center => {
                        if i < 0 {
                            i = -i - 1;
                        } else if i > n - 1 {
                            i = 2 * n - 1 - i;
                        } else {
                            return i;
                        }
                    }
                    Location::Face => {
                        if i < 0 {
                            i = -i;
                        } else if i > n {
                            i = 2 * n - i;
                        } else {
                            return i;
                        }
                    }
                }
            }
        }
    }
}
