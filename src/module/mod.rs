//! 模块管理模块
//!
//! 包含模块管理系统的核心组件：
//! - 模块清单与状态定义
//! - 依赖图构建与分析
//! - 注册表、存储与清单发现
//! - 生命周期管理与事件发布

pub mod dependency;
pub mod discovery;
pub mod events;
pub mod hooks;
pub mod lifecycle;
pub mod manifest;
pub mod registry;
pub mod state;
pub mod store;

// 重导出常用类型
pub use dependency::{
    Cluster, CriticalityWeights, DependencyGraph, DependencyKind, Dependent, DirectDependency,
    HubModule, ImpactReport, TransitiveDependency, UnresolvedEdge,
};
pub use discovery::{DirectoryDiscovery, ManifestSource, StaticDiscovery, MODULE_MANIFEST_FILENAME};
pub use events::{event_types, BroadcastPublisher, EventPublisher, LifecycleEvent, NoopPublisher};
pub use hooks::{ModuleHooks, NoopHooks};
pub use lifecycle::LifecycleManager;
pub use manifest::ModuleManifest;
pub use registry::{ModuleLock, ModuleRegistry, RegistryChange, RegistryEntry, RegistrySnapshot};
pub use state::ModuleState;
pub use store::{JsonFileStore, MemoryStore, RegistryStore};
