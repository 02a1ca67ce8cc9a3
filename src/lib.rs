//! # Chips Modules - 模块依赖解析与生命周期管理
//!
//! 本库管理一组由清单（manifest）描述的模块，提供以下核心功能：
//!
//! - **依赖图**: 必需/可选依赖、冲突声明、环检测与确定性的拓扑排序
//! - **影响分析**: 传递依赖、反向依赖、影响半径与关键度评分
//! - **注册表**: 模块状态的持久化、清单发现与乐观并发提交
//! - **生命周期管理**: 安装、启用、禁用、移除与更新，强制执行依赖和冲突约束
//! - **事件发布**: 每次成功的状态转换都会发布生命周期事件
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use chips_modules::{LifecycleManager, ModuleManifest, ModuleRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ModuleRegistry::in_memory(vec![
//!         ModuleManifest::new("core", "1.0.0"),
//!         ModuleManifest::new("auth", "1.0.0").requires(["core"]),
//!     ]);
//!     let manager = LifecycleManager::new(registry);
//!
//!     manager.install("core", false).await?;
//!     manager.install("auth", false).await?;
//!     manager.enable("core", false).await?;
//!     manager.enable("auth", false).await?;
//!
//!     println!("{:?}", manager.install_order().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 清单、依赖图、注册表与生命周期管理
//! - `utils` - 错误类型和日志系统
//! - `core` - 配置定义与加载

#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use module::{
    event_types, BroadcastPublisher, Cluster, CriticalityWeights, DependencyGraph,
    DependencyKind, DirectoryDiscovery, EventPublisher, HubModule, ImpactReport, JsonFileStore,
    LifecycleEvent, LifecycleManager, ManifestSource, MemoryStore, ModuleHooks, ModuleManifest,
    ModuleRegistry, ModuleState, NoopHooks, NoopPublisher, RegistryEntry, RegistryStore,
    StaticDiscovery, UnresolvedEdge,
};

pub use utils::{error_code, status_code, CoreError, Result};
pub use utils::logger::{Logger, LoggerConfig, LoggerConfigBuilder, LogGuard, RotationStrategy, fields};

pub use core::config::{
    AnalysisConfig, CoreConfig, CoreConfigBuilder, LifecycleConfig, LogConfig, ModuleConfig,
    DEFAULT_ENV_PREFIX,
};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
