// crates/mh_runtime/src/scalar.rs

//! RuntimeScalar - 密封的标量类型抽象
//!
//! 海洋核心层（网格、场、稀疏矩阵、多重网格）全部以 `S: RuntimeScalar`
//! 为泛型边界，在 f32 和 f64 之间零成本切换。配置层保持全 f64，
//! 通过 [`RuntimeScalar::from_config`] 进入计算层。
//!
//! ```rust
//! use mh_runtime::RuntimeScalar;
//!
//! fn helmholtz_shift<S: RuntimeScalar>(area: S, g: S, dt: S) -> S {
//!     -area / (g * dt * dt)
//! }
//!
//! let d = helmholtz_shift(1.0e8_f64, 9.80665, 600.0);
//! assert!(d < 0.0);
//! ```

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, NumAssign, ToPrimitive};

/// 密封模块，禁止外部实现
mod private {
    /// 密封 trait
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// 运行时标量类型（密封，仅 f32/f64 可实现）
///
/// - `f32`: 内存减半，适合大规模水平网格
/// - `f64`: 默认精度，椭圆求解收敛到 1e-10 量级需要它
pub trait RuntimeScalar:
    private::Sealed
    + Pod
    + Float
    + FromPrimitive
    + ToPrimitive
    + NumAssign
    + Copy
    + Clone
    + Debug
    + Display
    + Send
    + Sync
    + Sum
    + Default
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// 零值
    const ZERO: Self;
    /// 一
    const ONE: Self;
    /// 二分之一
    const HALF: Self;
    /// 机器精度
    const EPSILON: Self;
    /// 最小正值
    const MIN_POSITIVE: Self;
    /// 最大值
    const MAX: Self;

    /// 从配置层 f64 转换
    ///
    /// f64 → f32 超出范围时返回 `None`。
    #[inline]
    fn from_config(value: f64) -> Option<Self> {
        let v = Self::from_f64(value)?;
        if value.is_finite() && !v.is_finite() {
            None
        } else {
            Some(v)
        }
    }

    /// 从配置层 f64 转换，失败时使用 fallback
    #[inline]
    fn from_config_or(value: f64, fallback: Self) -> Self {
        Self::from_config(value).unwrap_or(fallback)
    }

    /// 从 usize 计数转换（网格尺寸、迭代次数）
    #[inline]
    fn from_count(n: usize) -> Self {
        Self::from_usize(n).unwrap_or(Self::MAX)
    }

    /// 转回 f64（日志与诊断用）
    #[inline]
    fn to_config(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// 安全除法
    ///
    /// 当除数绝对值小于 MIN_POSITIVE 时返回 fallback
    #[inline]
    fn safe_div(self, rhs: Self, fallback: Self) -> Self {
        if rhs.abs() < Self::MIN_POSITIVE {
            fallback
        } else {
            self / rhs
        }
    }
}

impl RuntimeScalar for f32 {
    const ZERO: f32 = 0.0;
    const ONE: f32 = 1.0;
    const HALF: f32 = 0.5;
    const EPSILON: f32 = f32::EPSILON;
    const MIN_POSITIVE: f32 = f32::MIN_POSITIVE;
    const MAX: f32 = f32::MAX;
}

impl RuntimeScalar for f64 {
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;
    const HALF: f64 = 0.5;
    const EPSILON: f64 = f64::EPSILON;
    const MIN_POSITIVE: f64 = f64::MIN_POSITIVE;
    const MAX: f64 = f64::MAX;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(f32::HALF, 0.5f32);
        assert_eq!(f64::ONE, 1.0f64);
    }

    #[test]
    fn test_from_config() {
        assert_eq!(f32::from_config(9.80665), Some(9.80665f32));
        assert_eq!(f64::from_config(9.80665), Some(9.80665f64));
        // 超出 f32 范围
        assert_eq!(f32::from_config(1e300), None);
        assert_eq!(f32::from_config_or(1e300, 1.0), 1.0);
    }

    #[test]
    fn test_from_count_and_back() {
        assert_eq!(f64::from_count(128), 128.0);
        assert_eq!(600.0f32.to_config(), 600.0);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(1.0f64.safe_div(0.0, 999.0), 999.0);
        assert_eq!(1.0f64.safe_div(2.0, 999.0), 0.5);
    }
}
