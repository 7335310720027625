// crates/mh_runtime/src/numerics/kahan_sum.rs

//! Kahan 补偿求和（泛型版）
//!
//! 体积守恒诊断需要对上万个 `Az·η` 量级差异很大的项求和，
//! 直接累加在 f32 下误差明显，这里统一走补偿求和。

use crate::scalar::RuntimeScalar;

/// Kahan 求和器
///
/// # 示例
///
/// ```rust
/// use mh_runtime::KahanSum;
///
/// let mut acc = KahanSum::<f64>::new();
/// for _ in 0..1000 {
///     acc.add(0.1);
/// }
/// assert!((acc.value() - 100.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum<S: RuntimeScalar> {
    sum: S,
    compensation: S,
}

impl<S: RuntimeScalar> KahanSum<S> {
    /// 创建新的求和器
    pub fn new() -> Self {
        Self {
            sum: S::ZERO,
            compensation: S::ZERO,
        }
    }

    /// 累加一个值
    #[inline]
    pub fn add(&mut self, value: S) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 累加乘积 a·b（面积加权积分常用）
    #[inline]
    pub fn add_product(&mut self, a: S, b: S) {
        self.add(a * b);
    }

    /// 当前求和值
    #[inline]
    pub fn value(&self) -> S {
        self.sum
    }

    /// 重置
    #[inline]
    pub fn reset(&mut self) {
        self.sum = S::ZERO;
        self.compensation = S::ZERO;
    }

    /// 对迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = S>>(iter: I) -> S {
        iter.into_iter().collect::<Self>().value()
    }
}

impl<S: RuntimeScalar> FromIterator<S> for KahanSum<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}

impl<S: RuntimeScalar> Extend<S> for KahanSum<S> {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for v in iter {
            self.add(v);
        }
    }
}
