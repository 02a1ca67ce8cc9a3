//! 模块管理配置
//!
//! 定义配置结构和加载逻辑。配置来源的优先级（低到高）：
//! 默认值 → 配置文件（YAML 或 JSON）→ 环境变量。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::module::dependency::CriticalityWeights;
use crate::utils::{CoreError, Result};

/// 默认的环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "CHIPS_MODULES";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略（minutely / hourly / daily / never）
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// 保留日志文件数
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
            max_files: default_max_files(),
        }
    }
}

/// 模块来源配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// 模块目录列表（每个子目录包含一个 module.yaml）
    #[serde(default)]
    pub module_dirs: Vec<PathBuf>,

    /// 注册表文件路径，不设置时注册表只保存在内存中
    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    /// 发现清单缓存容量
    #[serde(default = "default_manifest_cache_capacity")]
    pub manifest_cache_capacity: usize,
}

fn default_manifest_cache_capacity() -> usize {
    256
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            module_dirs: vec![],
            registry_path: None,
            manifest_cache_capacity: default_manifest_cache_capacity(),
        }
    }
}

/// 生命周期配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// 获取模块锁的超时时间（毫秒）
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// 快照过期时的最大重试次数
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_max_commit_retries() -> u32 {
    3
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_commit_retries: default_max_commit_retries(),
        }
    }
}

/// 依赖分析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 关键度评分中直接依赖方数量的权重
    #[serde(default = "default_direct_dependent_weight")]
    pub direct_dependent_weight: f64,

    /// 关键度评分中影响半径的权重
    #[serde(default = "default_impact_radius_weight")]
    pub impact_radius_weight: f64,

    /// 枢纽模块的直接依赖方数量阈值
    #[serde(default = "default_hub_threshold")]
    pub hub_threshold: usize,
}

fn default_direct_dependent_weight() -> f64 {
    1.0
}

fn default_impact_radius_weight() -> f64 {
    0.5
}

fn default_hub_threshold() -> usize {
    3
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            direct_dependent_weight: default_direct_dependent_weight(),
            impact_radius_weight: default_impact_radius_weight(),
            hub_threshold: default_hub_threshold(),
        }
    }
}

impl AnalysisConfig {
    /// 转换为关键度权重
    pub fn weights(&self) -> CriticalityWeights {
        CriticalityWeights {
            direct_dependent_weight: self.direct_dependent_weight,
            impact_radius_weight: self.impact_radius_weight,
        }
    }
}

/// 模块管理配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 模块来源配置
    #[serde(default)]
    pub modules: ModuleConfig,

    /// 生命周期配置
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// 依赖分析配置
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl CoreConfig {
    /// 创建配置构建器
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// 从文件加载配置
    ///
    /// 扩展名为 `.json` 时按 JSON 解析，其余按 YAML 解析。
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取配置文件 {:?}: {}", path, e))
        })?;

        let mut config: CoreConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        config.validate()?;
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: CoreConfig) {
        // 只覆盖非默认值的配置
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if !other.modules.module_dirs.is_empty() {
            self.modules.module_dirs.extend(other.modules.module_dirs);
        }
        if other.modules.registry_path.is_some() {
            self.modules.registry_path = other.modules.registry_path;
        }
        if other.lifecycle.lock_timeout_ms != default_lock_timeout_ms() {
            self.lifecycle.lock_timeout_ms = other.lifecycle.lock_timeout_ms;
        }
        if other.lifecycle.max_commit_retries != default_max_commit_retries() {
            self.lifecycle.max_commit_retries = other.lifecycle.max_commit_retries;
        }
        if other.analysis != AnalysisConfig::default() {
            self.analysis = other.analysis;
        }
    }

    /// 使用环境变量覆盖配置
    ///
    /// 支持的变量（以前缀 `CHIPS_MODULES` 为例）：
    /// `CHIPS_MODULES_LOG_LEVEL`、`CHIPS_MODULES_MODULE_DIRS`（按平台路径分隔符分隔）、
    /// `CHIPS_MODULES_REGISTRY_PATH`、`CHIPS_MODULES_LOCK_TIMEOUT_MS`。
    pub fn apply_env(&mut self, prefix: &str) -> Result<()> {
        let var = |key: &str| std::env::var(format!("{}_{}", prefix, key)).ok();

        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dirs) = var("MODULE_DIRS") {
            self.modules.module_dirs = std::env::split_paths(&dirs).collect();
        }
        if let Some(path) = var("REGISTRY_PATH") {
            self.modules.registry_path = Some(PathBuf::from(path));
        }
        if let Some(timeout) = var("LOCK_TIMEOUT_MS") {
            self.lifecycle.lock_timeout_ms =
                timeout.parse().map_err(|_| CoreError::InvalidConfigValue {
                    key: format!("{}_LOCK_TIMEOUT_MS", prefix),
                    reason: format!("'{}' 不是有效的毫秒数", timeout),
                })?;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(CoreError::InvalidConfigValue {
                key: "logging.level".to_string(),
                reason: format!("未知的日志级别 '{}'", self.logging.level),
            });
        }
        if self.logging.file_output && self.logging.log_dir.is_none() {
            return Err(CoreError::InvalidConfigValue {
                key: "logging.log_dir".to_string(),
                reason: "启用文件日志时必须设置日志目录".to_string(),
            });
        }
        if self.lifecycle.lock_timeout_ms == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "lifecycle.lock_timeout_ms".to_string(),
                reason: "锁超时时间必须大于 0".to_string(),
            });
        }
        if self.modules.manifest_cache_capacity == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "modules.manifest_cache_capacity".to_string(),
                reason: "缓存容量必须大于 0".to_string(),
            });
        }
        for (key, weight) in [
            ("analysis.direct_dependent_weight", self.analysis.direct_dependent_weight),
            ("analysis.impact_radius_weight", self.analysis.impact_radius_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(CoreError::InvalidConfigValue {
                    key: key.to_string(),
                    reason: format!("权重必须是非负有限数，实际为 {}", weight),
                });
            }
        }
        Ok(())
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 添加模块目录
    pub fn module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.modules.module_dirs.push(dir.into());
        self
    }

    /// 设置注册表文件路径
    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.modules.registry_path = Some(path.into());
        self
    }

    /// 设置锁超时时间
    pub fn lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.lifecycle.lock_timeout_ms = timeout_ms;
        self
    }

    /// 设置提交重试次数
    pub fn max_commit_retries(mut self, retries: u32) -> Self {
        self.config.lifecycle.max_commit_retries = retries;
        self
    }

    /// 设置关键度权重
    pub fn criticality_weights(mut self, direct: f64, radius: f64) -> Self {
        self.config.analysis.direct_dependent_weight = direct;
        self.config.analysis.impact_radius_weight = radius;
        self
    }

    /// 设置枢纽阈值
    pub fn hub_threshold(mut self, threshold: usize) -> Self {
        self.config.analysis.hub_threshold = threshold;
        self
    }

    /// 构建配置
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
