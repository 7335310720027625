// crates/mh_ocean/src/numerics/linear_algebra/vector_ops.rs

//! 向量运算（BLAS Level 1 风格）
//!
//! 迭代求解器与多重网格光滑器的基础运算，泛型覆盖 f32/f64。
//!
//! ```
//! use mh_ocean::numerics::linear_algebra::vector_ops::{axpy, dot, norm2};
//!
//! let x = vec![1.0, 2.0, 3.0];
//! let mut y = vec![4.0, 5.0, 6.0];
//!
//! assert_eq!(dot(&x, &y), 32.0);
//! assert!((norm2(&x) - 14.0_f64.sqrt()).abs() < 1e-15);
//!
//! axpy(2.0, &x, &mut y);
//! assert_eq!(y, vec![6.0, 9.0, 12.0]);
//! ```

use mh_runtime::RuntimeScalar;

/// 点积 x·y
#[inline]
pub fn dot<S: RuntimeScalar>(x: &[S], y: &[S]) -> S {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).map(|(&xi, &yi)| xi * yi).sum()
}

/// 二范数 ‖x‖₂
#[inline]
pub fn norm2<S: RuntimeScalar>(x: &[S]) -> S {
    dot(x, x).sqrt()
}

/// AXPY: y = α*x + y
#[inline]
pub fn axpy<S: RuntimeScalar>(alpha: S, x: &[S], y: &mut [S]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// XPAY: y = x + α*y
#[inline]
pub fn xpay<S: RuntimeScalar>(x: &[S], alpha: S, y: &mut [S]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = xi + alpha * *yi;
    }
}

/// 复制: y = x
#[inline]
pub fn copy<S: RuntimeScalar>(x: &[S], y: &mut [S]) {
    debug_assert_eq!(x.len(), y.len());
    y.copy_from_slice(x);
}
