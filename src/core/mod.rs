//! 核心模块
//!
//! 包含配置定义与加载。

pub mod config;

pub use config::{
    AnalysisConfig, CoreConfig, CoreConfigBuilder, LifecycleConfig, LogConfig, ModuleConfig,
    DEFAULT_ENV_PREFIX,
};
