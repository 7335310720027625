// crates/mh_ocean/src/error.rs
//! 海洋核心层错误类型
//!
//! 网格构建与度量校验失败通过 `OceanError` 返回；
//! 线性求解不收敛不是错误，见 `SolverResult`。

use thiserror::Error;

use crate::grid::Location;
use mh_config::ConfigError;

/// 海洋核心层结果类型
pub type OceanResult<T> = Result<T, OceanError>;

/// 海洋核心层错误枚举
#[derive(Error, Debug)]
pub enum OceanError {
    /// 水平网格参数无效（尺寸、halo、间距）
    #[error("无效网格: {0}")]
    InvalidGrid(String),

    /// 垂向度量缺失或无效（无层、非有限或非递增的层界面、非有限底高程）
    #[error("网格深度度量无效: {0}")]
    MalformedGrid(String),

    /// 数组尺寸不匹配
    #[error("尺寸不匹配: {what} 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 数据名称
        what: &'static str,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 场的交错位置不匹配
    #[error("场位置不匹配: {what} 期望 {expected:?}, 实际 {actual:?}")]
    LocationMismatch {
        /// 场名称
        what: &'static str,
        /// 期望位置
        expected: (Location, Location),
        /// 实际位置
        actual: (Location, Location),
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl OceanError {
    /// 构造无效网格错误
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// 构造深度度量错误
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedGrid(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = OceanError::SizeMismatch {
            what: "z_faces",
            expected: 5,
            actual: 3,
        };
        assert!(err.to_string().contains("z_faces"));
        assert!(OceanError::malformed("nz = 0").to_string().contains("nz = 0"));
    }

    #[test]
    fn test_from_config_error() {
        let err: OceanError = ConfigError::invalid("solver.rtol", 0.0, "必须为正").into();
        assert!(matches!(err, OceanError::Config(_)));
    }
}
