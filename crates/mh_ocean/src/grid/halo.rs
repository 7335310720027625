// crates/mh_ocean/src/grid/halo.rs

//! halo 填充
//!
//! 先沿 x 填内部行的 halo，再沿 y 填所有存储列（包括 x 的 halo 列），
//! 角点因此由两次映射的复合给出。

use mh_runtime::RuntimeScalar;

use super::topology::{source_index, Topology};
use crate::field::Field2D;

/// 按拓扑填充场的 halo
pub fn fill_halo_regions<S: RuntimeScalar>(field: &mut Field2D<S>, topology: (Topology, Topology)) {
    let (nx, ny) = field.size();
    let (hx, hy) = field.halo();
    let (ex, ey) = field.interior_extent();
    let (lx, ly) = field.location();

    let x_range = -(hx as isize)..(nx + hx) as isize;
    let y_range = -(hy as isize)..(ny + hy) as isize;

    // x 方向
    for j in 0..ey as isize {
        for i in x_range.clone() {
            if i >= 0 && i < ex as isize {
                continue;
            }
            let src = source_index(i, nx, topology.0, lx);
            let value = field.get(src, j);
            field.set(i, j, value);
        }
    }

    // y 方向
    for j in y_range {
        if j >= 0 && j < ey as isize {
            continue;
        }
        let src = source_index(j, ny, topology.1, ly);
        for i in x_range.clone() {
            let value = field.get(i, src);
            field.set(i, j, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Location;

    fn ramp(nx: usize, ny: usize, halo: usize, topo: (Topology, Topology), loc: (Location, Location)) -> Field2D<f64> {
        let mut f = Field2D::with_layout(nx, ny, (halo, halo), topo, loc);
        let (ex, ey) = f.interior_extent();
        for j in 0..ey as isize {
            for i in 0..ex as isize {
                f.set(i, j, (i + 100 * j) as f64);
            }
        }
        f
    }

    #[test]
    fn test_periodic_halo() {
        let topo = (Topology::Periodic, Topology::Periodic);
        let mut f = ramp(4, 3, 2, topo, (Location::Center, Location::Center));
        fill_halo_regions(&mut f, topo);
        assert_eq!(f.get(-1, 0), 3.0);
        assert_eq!(f.get(4, 1), 100.0);
        assert_eq!(f.get(0, -1), 200.0);
        assert_eq!(f.get(-1, -1), 203.0);
        assert_eq!(f.get(5, 4), 101.0);
    }

    #[test]
    fn test_bounded_center_halo() {
        let topo = (Topology::Bounded, Topology::Bounded);
        let mut f = ramp(4, 3, 1, topo, (Location::Center, Location::Center));
        fill_halo_regions(&mut f, topo);
        assert_eq!(f.get(-1, 1), 100.0);
        assert_eq!(f.get(4, 1), 103.0);
        assert_eq!(f.get(2, 3), 202.0);
        assert_eq!(f.get(-1, -1), 0.0);
    }

    #[test]
    fn test_bounded_face_keeps_wall_point() {
        let topo = (Topology::Bounded, Topology::Bounded);
        let mut f = ramp(4, 3, 2, topo, (Location::Face, Location::Center));
        fill_halo_regions(&mut f, topo);
        // i = 4 是东侧壁面，属于内部
        assert_eq!(f.get(4, 0), 4.0);
        assert_eq!(f.get(5, 0), 3.0);
        assert_eq!(f.get(-1, 0), 1.0);
        assert_eq!(f.get(-2, 2), 202.0);
    }

    #[test]
    fn test_idempotent() {
        let topo = (Topology::Periodic, Topology::Bounded);
        let mut f = ramp(5, 4, 3, topo, (Location::Center, Location::Face));
        fill_halo_regions(&mut f, topo);
        let once = f.clone();
        fill_halo_regions(&mut f, topo);
        assert_eq!(f, once);
    }
}
