//! 模块管理核心错误类型定义
//!
//! 本模块定义了依赖解析与生命周期管理中使用的所有错误类型。
//! 每个错误都会指明出错的模块，依赖/冲突类错误还会列出具体的阻塞模块。

use thiserror::Error;

/// 模块管理核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 依赖图错误 ====================

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 依赖图引用了不存在的模块
    #[error("未知依赖: 模块 '{module}' 依赖的 '{dependency}' 不在清单集合中")]
    UnknownDependency {
        module: String,
        dependency: String,
    },

    /// 循环依赖
    #[error("检测到循环依赖: {}", format_cycles(.cycles))]
    CircularDependency {
        cycles: Vec<Vec<String>>,
    },

    // ==================== 生命周期错误 ====================

    /// 依赖错误（缺失/未启用的必需依赖，或被存活的依赖方阻塞）
    #[error("依赖错误: 模块 '{module}' {reason}: {blockers:?}")]
    Dependency {
        module: String,
        reason: String,
        blockers: Vec<String>,
    },

    /// 冲突错误
    #[error("冲突错误: 模块 '{module}' 与已启用的模块冲突: {conflicts:?}")]
    Conflict {
        module: String,
        conflicts: Vec<String>,
    },

    /// 提交时快照已过期
    #[error("并发修改: 模块 '{module}' - {reason}")]
    ConcurrentModification {
        module: String,
        reason: String,
    },

    /// 获取模块锁超时
    #[error("获取模块锁超时: '{module}' ({timeout_ms} ms)")]
    LockTimeout {
        module: String,
        timeout_ms: u64,
    },

    /// 当前状态不允许该操作
    #[error("状态转换无效: 模块 '{module}' 当前状态 {state} 不允许 {operation}")]
    InvalidTransition {
        module: String,
        state: String,
        operation: String,
    },

    /// 模块已安装
    #[error("模块已安装: '{0}'")]
    ModuleAlreadyInstalled(String),

    /// 无效的模块清单
    #[error("无效的模块清单: {0}")]
    InvalidManifest(String),

    /// 生命周期钩子执行失败
    #[error("生命周期钩子执行失败: 模块 '{module}' 在 {operation} 阶段 - {reason}")]
    HookFailed {
        module: String,
        operation: String,
        reason: String,
    },

    /// 更新失败后无法写回更新前的条目
    #[error("更新回滚失败: 模块 '{module}' 已标记为 {state} - 更新错误: {update_error}; 回滚错误: {revert_error}")]
    UpdateRevertFailed {
        module: String,
        state: String,
        update_error: String,
        revert_error: String,
    },

    /// 注册表存储失败
    #[error("注册表存储失败: {0}")]
    Storage(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut closed = cycle.clone();
            if let Some(first) = cycle.first() {
                closed.push(first.clone());
            }
            closed.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 状态码常量
pub mod status_code {
    /// 成功
    pub const OK: u16 = 200;

    /// 请求格式错误
    pub const BAD_REQUEST: u16 = 400;

    /// 未找到
    pub const NOT_FOUND: u16 = 404;

    /// 请求超时
    pub const TIMEOUT: u16 = 408;

    /// 冲突
    pub const CONFLICT: u16 = 409;

    /// 前置条件不满足
    pub const PRECONDITION_FAILED: u16 = 412;

    /// 无法处理
    pub const UNPROCESSABLE: u16 = 422;

    /// 内部错误
    pub const INTERNAL_ERROR: u16 = 500;
}

/// 错误码常量
pub mod error_code {
    // 模块错误 (MODULE-xxx)
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    pub const MODULE_ALREADY_INSTALLED: &str = "MODULE-002";
    pub const MODULE_INVALID_TRANSITION: &str = "MODULE-003";
    pub const MODULE_INVALID_MANIFEST: &str = "MODULE-004";
    pub const MODULE_HOOK_FAILED: &str = "MODULE-005";
    pub const MODULE_UPDATE_REVERT_FAILED: &str = "MODULE-006";

    // 依赖错误 (DEPENDENCY-xxx)
    pub const DEPENDENCY_UNKNOWN: &str = "DEPENDENCY-001";
    pub const DEPENDENCY_CIRCULAR: &str = "DEPENDENCY-002";
    pub const DEPENDENCY_UNSATISFIED: &str = "DEPENDENCY-003";
    pub const DEPENDENCY_CONFLICT: &str = "DEPENDENCY-004";

    // 并发错误 (CONCURRENCY-xxx)
    pub const CONCURRENT_MODIFICATION: &str = "CONCURRENCY-001";
    pub const LOCK_TIMEOUT: &str = "CONCURRENCY-002";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";

    // 存储错误 (STORAGE-xxx)
    pub const STORAGE_FAILED: &str = "STORAGE-001";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::ModuleAlreadyInstalled(_) => error_code::MODULE_ALREADY_INSTALLED,
            CoreError::InvalidTransition { .. } => error_code::MODULE_INVALID_TRANSITION,
            CoreError::InvalidManifest(_) => error_code::MODULE_INVALID_MANIFEST,
            CoreError::HookFailed { .. } => error_code::MODULE_HOOK_FAILED,
            CoreError::UpdateRevertFailed { .. } => error_code::MODULE_UPDATE_REVERT_FAILED,
            CoreError::UnknownDependency { .. } => error_code::DEPENDENCY_UNKNOWN,
            CoreError::CircularDependency { .. } => error_code::DEPENDENCY_CIRCULAR,
            CoreError::Dependency { .. } => error_code::DEPENDENCY_UNSATISFIED,
            CoreError::Conflict { .. } => error_code::DEPENDENCY_CONFLICT,
            CoreError::ConcurrentModification { .. } => error_code::CONCURRENT_MODIFICATION,
            CoreError::LockTimeout { .. } => error_code::LOCK_TIMEOUT,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            CoreError::Storage(_) => error_code::STORAGE_FAILED,
            _ => "UNKNOWN",
        }
    }

    /// 获取 HTTP 风格的状态码
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::ModuleNotFound(_) => status_code::NOT_FOUND,
            CoreError::InvalidManifest(_) => status_code::BAD_REQUEST,
            CoreError::ModuleAlreadyInstalled(_)
            | CoreError::Conflict { .. }
            | CoreError::ConcurrentModification { .. } => status_code::CONFLICT,
            CoreError::InvalidTransition { .. } | CoreError::Dependency { .. } => {
                status_code::PRECONDITION_FAILED
            }
            CoreError::UnknownDependency { .. } | CoreError::CircularDependency { .. } => {
                status_code::UNPROCESSABLE
            }
            CoreError::LockTimeout { .. } => status_code::TIMEOUT,
            _ => status_code::INTERNAL_ERROR,
        }
    }

    /// 是否可以被 `force` 降级为警告
    ///
    /// 只有依赖错误和冲突错误是策略性的；循环依赖和未知依赖表示依赖图本身不可解析，始终致命。
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, CoreError::Dependency { .. } | CoreError::Conflict { .. })
    }
}
