// crates/mh_ocean/src/free_surface/rhs.rs

//! 右端项、正压体积通量与正压速度修正
//!
//! 隐式自由面方程（面积积分形式）：
//!
//! ```text
//! ∇·(gΔt H∇η) − Az·η/Δt = δx Q★x + δy Q★y − Az·ηⁿ/Δt
//! ```
//!
//! 两边除以 gΔt 即得算子与右端项：
//!
//! ```text
//! rhs = (δx Qx + δy Qy − Az·η/Δt) / (g·Δt)
//! ```
//!
//! 求解后用新的 η 修正各层速度，使修正后的体积通量满足离散连续方程。

use mh_runtime::RuntimeScalar;

use super::lateral_areas::{LateralAreaIntegrator, VerticallyIntegratedLateralAreas, X_FACE, Y_FACE};
use crate::engine::KernelLauncher;
use crate::error::{OceanError, OceanResult};
use crate::field::{Field2D, LayeredField};
use crate::grid::{Location, RectilinearGrid};

/// 单元中心场位置
pub const CENTER: (Location, Location) = (Location::Center, Location::Center);

/// 校验场与网格布局一致
///
/// # Errors
/// 存储长度不一致返回 [`OceanError::SizeMismatch`]，
/// 交错位置不一致返回 [`OceanError::LocationMismatch`]。
pub fn check_field<S: RuntimeScalar>(
    what: &'static str,
    field: &Field2D<S>,
    grid: &RectilinearGrid<S>,
    location: (Location, Location),
) -> OceanResult<()> {
    let (hx, hy) = grid.halo();
    let expected = (grid.nx() + 2 * hx) * (grid.ny() + 2 * hy);
    if field.size() != (grid.nx(), grid.ny()) || field.halo() != (hx, hy) {
        return Err(OceanError::SizeMismatch {
            what,
            expected,
            actual: field.data().len(),
        });
    }
    if field.location() != location {
        return Err(OceanError::LocationMismatch {
            what,
            expected: location,
            actual: field.location(),
        });
    }
    Ok(())
}

/// 校验分层场的层数与每层布局
pub fn check_layered_field<S: RuntimeScalar>(
    what: &'static str,
    field: &LayeredField<S>,
    grid: &RectilinearGrid<S>,
    location: (Location, Location),
) -> OceanResult<()> {
    if field.nz() != grid.nz() {
        return Err(OceanError::SizeMismatch {
            what,
            expected: grid.nz(),
            actual: field.nz(),
        });
    }
    field
        .levels()
        .iter()
        .try_for_each(|level| check_field(what, level, grid, location))
}

/// 计算自由面方程右端项
///
/// 纯逐单元核函数，只写 `rhs` 的内部点；输入的 halo 由调用方保证最新。
///
/// # Panics
/// 输入场尺寸与网格不一致时 panic。
#[allow(clippy::too_many_arguments)]
pub fn compute_rhs<S: RuntimeScalar>(
    rhs: &mut Field2D<S>,
    grid: &RectilinearGrid<S>,
    g: S,
    dt: S,
    qx: &Field2D<S>,
    qy: &Field2D<S>,
    eta: &Field2D<S>,
    launcher: &KernelLauncher,
) {
    let size = (grid.nx(), grid.ny());
    assert_eq!(rhs.size(), size, "rhs 尺寸与网格不一致");
    assert_eq!(qx.size(), size, "Qx 尺寸与网格不一致");
    assert_eq!(qy.size(), size, "Qy 尺寸与网格不一致");
    assert_eq!(eta.size(), size, "η 尺寸与网格不一致");

    let inv_gdt = S::ONE / (g * dt);
    let inv_dt = S::ONE / dt;

    launcher.launch(rhs, |i, j| {
        let div = qx.get(i + 1, j) - qx.get(i, j) + qy.get(i, j + 1) - qy.get(i, j);
        (div - grid.az(i, j) * eta.get(i, j) * inv_dt) * inv_gdt
    });
}

/// 由各层界面速度积分正压体积通量 `Q = Σₖ uₖ·Aₖ`，并填充 halo
///
/// # Panics
/// 速度层数与网格不一致时 panic。
pub fn compute_vertically_integrated_volume_flux<S: RuntimeScalar>(
    grid: &RectilinearGrid<S>,
    integrator: &LateralAreaIntegrator<'_, S>,
    u: &LayeredField<S>,
    v: &LayeredField<S>,
    qx: &mut Field2D<S>,
    qy: &mut Field2D<S>,
    launcher: &KernelLauncher,
) {
    let nz = grid.nz();
    assert_eq!(u.nz(), nz, "u 层数与网格不一致");
    assert_eq!(v.nz(), nz, "v 层数与网格不一致");

    launcher.launch(qx, |i, j| {
        (0..nz)
            .map(|k| u.level(k).get(i, j) * integrator.x_face_area(i, j, k))
            .sum()
    });
    grid.fill_halo_regions(qx);

    launcher.launch(qy, |i, j| {
        (0..nz)
            .map(|k| v.level(k).get(i, j) * integrator.y_face_area(i, j, k))
            .sum()
    });
    grid.fill_halo_regions(qy);
}

/// 正压速度修正：`uₖ −= gΔt·δx η / Δxᶠ`，只作用于有面积的界面，随后填充 halo
///
/// η 的 halo 必须已填充。
pub fn apply_barotropic_correction<S: RuntimeScalar>(
    grid: &RectilinearGrid<S>,
    areas: &VerticallyIntegratedLateralAreas<S>,
    g: S,
    dt: S,
    eta: &Field2D<S>,
    u: &mut LayeredField<S>,
    v: &mut LayeredField<S>,
) {
    let gdt = g * dt;
    let (ex, ey) = areas.x.interior_extent();
    for level in u.levels_mut() {
        for j in 0..ey as isize {
            for i in 0..ex as isize {
                if areas.x.get(i, j) > S::ZERO {
                    let grad = (eta.get(i, j) - eta.get(i - 1, j)) / grid.dx_f(i);
                    level[(i, j)] -= gdt * grad;
                }
            }
        }
        grid.fill_halo_regions(level);
    }

    let (ex, ey) = areas.y.interior_extent();
    for level in v.levels_mut() {
        for j in 0..ey as isize {
            for i in 0..ex as isize {
                if areas.y.get(i, j) > S::ZERO {
                    let grad = (eta.get(i, j) - eta.get(i, j - 1)) / grid.dy_f(j);
                    level[(i, j)] -= gdt * grad;
                }
            }
        }
        grid.fill_halo_regions(level);
    }
}

/// 新建 x/y 体积通量场
pub fn flux_fields<S: RuntimeScalar>(grid: &RectilinearGrid<S>) -> (Field2D<S>, Field2D<S>) {
    (grid.field(X_FACE), grid.field(Y_FACE))
}
