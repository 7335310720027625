// crates/mh_config/src/free_surface.rs

//! FreeSurfaceConfig - 隐式自由面求解配置（全 f64）
//!
//! 所有字段都有 serde 默认值，JSON 中只需写出与默认不同的项。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// 隐式自由面配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSurfaceConfig {
    /// 重力加速度 [m/s²]
    #[serde(default = "default_gravity")]
    pub gravitational_acceleration: f64,

    /// 椭圆方程线性求解器
    #[serde(default)]
    pub solver: LinearSolverSettings,

    /// 逐单元核函数并行设置
    #[serde(default)]
    pub parallel: ParallelSettings,
}

fn default_gravity() -> f64 { 9.80665 }

impl Default for FreeSurfaceConfig {
    fn default() -> Self {
        Self {
            gravitational_acceleration: default_gravity(),
            solver: LinearSolverSettings::default(),
            parallel: ParallelSettings::default(),
        }
    }
}

/// 线性求解方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// 代数多重网格 V 循环迭代
    #[default]
    Multigrid,
    /// 预条件共轭梯度
    PreconditionedConjugateGradient,
}

/// PCG 预条件器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionerKind {
    /// 无预条件
    Identity,
    /// 对角预条件
    Jacobi,
    /// 单次多重网格 V 循环
    #[default]
    Multigrid,
}

/// 线性求解器设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverSettings {
    /// 求解方法
    #[serde(default)]
    pub method: SolverMethod,

    /// PCG 预条件器（仅 PCG 方法使用）
    #[serde(default)]
    pub preconditioner: PreconditionerKind,

    /// 相对收敛容差（相对 ‖b‖）
    #[serde(default = "default_rtol")]
    pub rtol: f64,

    /// 绝对收敛容差
    #[serde(default = "default_atol")]
    pub atol: f64,

    /// 最大迭代次数（PCG 迭代或 V 循环数）
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// 是否逐次输出残差（trace 级别）
    #[serde(default)]
    pub verbose: bool,

    /// 多重网格参数
    #[serde(default)]
    pub multigrid: MultigridSettings,
}

fn default_rtol() -> f64 { 1e-10 }
fn default_atol() -> f64 { 1e-14 }
fn default_max_iterations() -> usize { 200 }

impl Default for LinearSolverSettings {
    fn default() -> Self {
        Self {
            method: SolverMethod::default(),
            preconditioner: PreconditionerKind::default(),
            rtol: default_rtol(),
            atol: default_atol(),
            max_iterations: default_max_iterations(),
            verbose: false,
            multigrid: MultigridSettings::default(),
        }
    }
}

/// 多重网格参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultigridSettings {
    /// 最大层数（含最细层）
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,

    /// 粗网格规模上限，低于此值直接 LU 求解
    #[serde(default = "default_coarse_size")]
    pub coarse_size: usize,

    /// 强连接阈值 θ
    #[serde(default = "default_strength_threshold")]
    pub strength_threshold: f64,

    /// 加权 Jacobi 光滑权重 ω
    #[serde(default = "default_smoother_weight")]
    pub smoother_weight: f64,

    /// 前光滑次数
    #[serde(default = "default_sweeps")]
    pub pre_smooth: usize,

    /// 后光滑次数
    #[serde(default = "default_sweeps")]
    pub post_smooth: usize,
}

fn default_max_levels() -> usize { 10 }
fn default_coarse_size() -> usize { 64 }
fn default_strength_threshold() -> f64 { 0.08 }
fn default_smoother_weight() -> f64 { 2.0 / 3.0 }
fn default_sweeps() -> usize { 2 }

impl Default for MultigridSettings {
    fn default() -> Self {
        Self {
            max_levels: default_max_levels(),
            coarse_size: default_coarse_size(),
            strength_threshold: default_strength_threshold(),
            smoother_weight: default_smoother_weight(),
            pre_smooth: default_sweeps(),
            post_smooth: default_sweeps(),
        }
    }
}

/// 并行设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelSettings {
    /// 是否允许并行核函数
    #[serde(default = "default_parallel_enabled")]
    pub enabled: bool,

    /// 最小并行规模（内部点数），低于此值串行
    #[serde(default = "default_min_parallel_size")]
    pub min_parallel_size: usize,
}

fn default_parallel_enabled() -> bool { true }
fn default_min_parallel_size() -> usize { 4096 }

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            enabled: default_parallel_enabled(),
            min_parallel_size: default_min_parallel_size(),
        }
    }
}

impl FreeSurfaceConfig {
    /// 从 JSON 文件加载并验证
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串解析并验证
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: FreeSurfaceConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = self.gravitational_acceleration;
        if !g.is_finite() || g <= 0.0 {
            return Err(ConfigError::invalid(
                "gravitational_acceleration",
                g,
                "重力必须为有限正数",
            ));
        }
        self.solver.validate()
    }
}

impl LinearSolverSettings {
    /// 验证求解器参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rtol > 0.0 && self.rtol < 1.0) {
            return Err(ConfigError::invalid("solver.rtol", self.rtol, "rtol 必须在 (0, 1) 范围内"));
        }
        if self.atol.is_nan() || self.atol < 0.0 {
            return Err(ConfigError::invalid("solver.atol", self.atol, "atol 不能为负"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "solver.max_iterations",
                self.max_iterations,
                "至少需要一次迭代",
            ));
        }
        self.multigrid.validate()
    }
}

impl MultigridSettings {
    /// 验证多重网格参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_levels == 0 {
            return Err(ConfigError::invalid(
                "solver.multigrid.max_levels",
                self.max_levels,
                "至少需要一层",
            ));
        }
        if self.coarse_size == 0 {
            return Err(ConfigError::invalid(
                "solver.multigrid.coarse_size",
                self.coarse_size,
                "粗网格规模必须为正",
            ));
        }
        if !(self.strength_threshold >= 0.0 && self.strength_threshold < 1.0) {
            return Err(ConfigError::invalid(
                "solver.multigrid.strength_threshold",
                self.strength_threshold,
                "θ 必须在 [0, 1) 范围内",
            ));
        }
        if !(self.smoother_weight > 0.0 && self.smoother_weight <= 1.0) {
            return Err(ConfigError::invalid(
                "solver.multigrid.smoother_weight",
                self.smoother_weight,
                "ω 必须在 (0, 1] 范围内",
            ));
        }
        if self.pre_smooth == 0 && self.post_smooth == 0 {
            return Err(ConfigError::invalid(
                "solver.multigrid.pre_smooth",
                0,
                "前后光滑次数不能同时为零",
            ));
        }
        Ok(())
    }
}
