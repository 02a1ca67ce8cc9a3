//! 工具模块
//!
//! 包含错误类型和日志系统等通用工具。

pub mod error;
pub mod logger;

// 重导出常用类型
pub use error::{CoreError, Result, status_code, error_code};
pub use logger::{Logger, LoggerConfig, LoggerConfigBuilder, LogGuard, RotationStrategy, fields};
