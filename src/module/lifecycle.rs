//! 生命周期管理器
//!
//! 驱动模块在状态机上转换，并在转换时维护依赖与冲突约束：
//!
//! ```text
//! NotInstalled --install--> Installed --enable--> Enabled
//!                               ^                  |  ^
//!                               |               disable |
//!                               |                  v  | enable
//!                               +---- remove <-- Disabled
//! ```
//!
//! 每个操作的流程：
//! 1. 获取模块锁（带超时）
//! 2. 在注册表快照上校验前置条件，记录校验时观察到的条目修订号
//! 3. 调用钩子
//! 4. 乐观提交；快照过期时重新快照、重新校验，重试次数有上限
//! 5. 发布事件

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::CoreConfig;
use crate::module::dependency::{
    Cluster, CriticalityWeights, DependencyGraph, HubModule, ImpactReport, UnresolvedEdge,
};
use crate::module::events::{event_types, EventPublisher, NoopPublisher};
use crate::module::hooks::{ModuleHooks, NoopHooks};
use crate::module::manifest::ModuleManifest;
use crate::module::registry::{ModuleRegistry, RegistryChange, RegistryEntry, RegistrySnapshot};
use crate::module::state::ModuleState;
use crate::utils::{CoreError, Result};

/// 默认的提交重试次数
const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;

/// 默认的枢纽阈值
const DEFAULT_HUB_THRESHOLD: usize = 3;

/// 一次经过校验、等待提交的转换
#[derive(Debug, Clone)]
struct Transition {
    /// 校验时观察到的修订号
    expected: HashMap<String, Option<u64>>,
    /// 要提交的变更
    change: RegistryChange,
    /// 被 force 降级的违规
    overridden: Vec<String>,
}

impl Transition {
    fn new(change: RegistryChange) -> Self {
        Self {
            expected: HashMap::new(),
            change,
            overridden: Vec::new(),
        }
    }

    fn observe(&mut self, snapshot: &RegistrySnapshot, name: &str) {
        self.expected
            .entry(name.to_string())
            .or_insert_with(|| snapshot.revision(name));
    }

    /// 策略违规：force 时记录并继续，否则返回错误
    fn enforce(&mut self, name: &str, force: bool, violation: CoreError) -> Result<()> {
        if !force {
            return Err(violation);
        }
        warn!(module_id = %name, violation = %violation, "强制执行，忽略策略违规");
        self.overridden.push(violation.to_string());
        Ok(())
    }
}

/// 生命周期管理器
///
/// 所有状态修改都经过这里。实例可以在任务之间共享（`Arc<LifecycleManager>`）。
pub struct LifecycleManager {
    /// 模块注册表
    registry: ModuleRegistry,

    /// 事件发布者
    publisher: Arc<dyn EventPublisher>,

    /// 生命周期钩子
    hooks: Arc<dyn ModuleHooks>,

    /// 提交冲突时的最大重试次数
    max_commit_retries: u32,

    /// 关键度权重
    weights: CriticalityWeights,

    /// 默认枢纽阈值
    hub_threshold: usize,
}

impl LifecycleManager {
    /// 创建新的生命周期管理器
    pub fn new(registry: ModuleRegistry) -> Self {
        info!("创建生命周期管理器");
        Self {
            registry,
            publisher: Arc::new(NoopPublisher),
            hooks: Arc::new(NoopHooks),
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            weights: CriticalityWeights::default(),
            hub_threshold: DEFAULT_HUB_THRESHOLD,
        }
    }

    /// 根据配置创建
    pub fn from_config(registry: ModuleRegistry, config: &CoreConfig) -> Self {
        Self::new(registry)
            .with_max_commit_retries(config.lifecycle.max_commit_retries)
            .with_weights(config.analysis.weights())
            .with_hub_threshold(config.analysis.hub_threshold)
    }

    /// 设置事件发布者
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// 设置生命周期钩子
    pub fn with_hooks(mut self, hooks: Arc<dyn ModuleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// 设置提交重试次数
    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    /// 设置关键度权重
    pub fn with_weights(mut self, weights: CriticalityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// 设置默认枢纽阈值
    pub fn with_hub_threshold(mut self, threshold: usize) -> Self {
        self.hub_threshold = threshold;
        self
    }

    /// 获取注册表
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    // ==================== 生命周期操作 ====================

    /// 安装模块
    ///
    /// 模块必须可被发现，且尚未安装（`Failed` 状态的模块可以重新安装）。
    ///
    /// # Errors
    ///
    /// - `ModuleNotFound` - 模块未知
    /// - `ModuleAlreadyInstalled` - 模块已安装
    /// - `CircularDependency` - 模块处于必需依赖环上（force 也无法跳过）
    /// - `Dependency` - 必需依赖不存在（force 时降级为警告）
    #[instrument(skip(self), fields(module_id = %name))]
    pub async fn install(&self, name: &str, force: bool) -> Result<()> {
        info!("安装模块");
        let _lock = self.registry.lock_module(name).await?;

        let snapshot = self.registry.snapshot().await?;
        let transition = self.validate_install(&snapshot, name, force)?;
        let manifest = Self::manifest_of(&snapshot, name)?;

        if let Err(e) = self.hooks.on_install(&manifest).await {
            return Err(self.fail_module(manifest, "install", e).await);
        }

        let overridden = transition.overridden.clone();
        self.commit_with_retry(name, transition, |s| self.validate_install(s, name, force))
            .await?;

        info!("模块安装成功");
        self.publish(
            event_types::MODULE_INSTALLED,
            name,
            json!({ "version": manifest.version, "forced": force, "overridden": overridden }),
        )
        .await;
        Ok(())
    }

    /// 启用模块
    ///
    /// 已启用的模块直接返回成功。启用成功后，会尽力启用已安装的可选依赖：
    /// 每个只尝试一次、不强制、不继续传递，失败只记录警告。
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` - 当前状态不允许启用
    /// - `Dependency` - 必需依赖未启用（force 时降级）
    /// - `Conflict` - 与已启用模块冲突（force 时降级）
    #[instrument(skip(self), fields(module_id = %name))]
    pub async fn enable(&self, name: &str, force: bool) -> Result<()> {
        info!("启用模块");
        let Some(manifest) = self.enable_single(name, force).await? else {
            return Ok(());
        };

        for optional in &manifest.optional_dependencies {
            let state = match self.registry.get_state(optional).await {
                Ok(state) => state.unwrap_or(ModuleState::NotInstalled),
                Err(e) => {
                    warn!(module_id = %name, optional = %optional, error = %e, "无法读取可选依赖状态");
                    continue;
                }
            };
            if !state.can_enable() {
                debug!(module_id = %name, optional = %optional, state = %state, "跳过可选依赖");
                continue;
            }
            match self.enable_single(optional, false).await {
                Ok(_) => info!(module_id = %name, optional = %optional, "已启用可选依赖"),
                Err(e) => warn!(module_id = %name, optional = %optional, error = %e, "启用可选依赖失败"),
            }
        }

        Ok(())
    }

    /// 启用单个模块，不处理可选依赖
    ///
    /// 返回启用的模块清单；模块已处于启用状态时返回 `None`。
    async fn enable_single(&self, name: &str, force: bool) -> Result<Option<ModuleManifest>> {
        let _lock = self.registry.lock_module(name).await?;

        let snapshot = self.registry.snapshot().await?;
        let Some(transition) = self.validate_enable(&snapshot, name, force)? else {
            debug!(module_id = %name, "模块已启用");
            return Ok(None);
        };
        let manifest = Self::manifest_of(&snapshot, name)?;

        if let Err(e) = self.hooks.on_enable(&manifest).await {
            return Err(self.fail_module(manifest, "enable", e).await);
        }

        let overridden = transition.overridden.clone();
        self.commit_with_retry(name, transition, |s| self.validate_enable(s, name, force))
            .await?;

        info!(module_id = %name, "模块启用成功");
        self.publish(
            event_types::MODULE_ENABLED,
            name,
            json!({ "forced": force, "overridden": overridden }),
        )
        .await;
        Ok(Some(manifest))
    }

    /// 禁用模块
    ///
    /// 已禁用的模块直接返回成功。
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` - 当前状态不允许禁用
    /// - `Dependency` - 仍有已启用的模块必需依赖它（force 时降级）
    #[instrument(skip(self), fields(module_id = %name))]
    pub async fn disable(&self, name: &str, force: bool) -> Result<()> {
        info!("禁用模块");
        let _lock = self.registry.lock_module(name).await?;

        let snapshot = self.registry.snapshot().await?;
        let Some(transition) = self.validate_disable(&snapshot, name, force)? else {
            debug!("模块已禁用");
            return Ok(());
        };
        let manifest = Self::manifest_of(&snapshot, name)?;

        if let Err(e) = self.hooks.on_disable(&manifest).await {
            return Err(self.fail_module(manifest, "disable", e).await);
        }

        let overridden = transition.overridden.clone();
        self.commit_with_retry(name, transition, |s| self.validate_disable(s, name, force))
            .await?;

        info!("模块禁用成功");
        self.publish(
            event_types::MODULE_DISABLED,
            name,
            json!({ "forced": force, "overridden": overridden }),
        )
        .await;
        Ok(())
    }

    /// 移除模块
    ///
    /// 成功后注册表中不再有该模块的条目。
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` - 当前状态不允许移除（例如仍处于启用状态）
    /// - `Dependency` - 仍有已安装的模块必需依赖它（force 时降级）
    #[instrument(skip(self), fields(module_id = %name))]
    pub async fn remove(&self, name: &str, force: bool) -> Result<()> {
        info!("移除模块");
        let _lock = self.registry.lock_module(name).await?;

        let snapshot = self.registry.snapshot().await?;
        let transition = self.validate_remove(&snapshot, name, force)?;
        let manifest = Self::manifest_of(&snapshot, name)?;

        if let Err(e) = self.hooks.on_remove(&manifest).await {
            return Err(self.fail_module(manifest, "remove", e).await);
        }

        let overridden = transition.overridden.clone();
        self.commit_with_retry(name, transition, |s| self.validate_remove(s, name, force))
            .await?;

        info!("模块移除成功");
        self.publish(
            event_types::MODULE_REMOVED,
            name,
            json!({ "version": manifest.version, "forced": force, "overridden": overridden }),
        )
        .await;
        Ok(())
    }

    /// 更新模块清单
    ///
    /// 更新期间模块处于 `Updating` 状态，其它操作的约束检查按更新前的状态对待它。
    /// 成功后以新清单保留原状态；任何失败都会有条件地恢复到更新前的条目并返回错误。
    /// 恢复也失败时模块被标记为 `Failed`，返回 `UpdateRevertFailed`，模块不会停留在 `Updating`。
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` - 当前状态不允许更新
    /// - `InvalidManifest` - 新清单无效或名称不一致
    /// - `Dependency` / `CircularDependency` / `Conflict` - 新清单破坏约束
    /// - `HookFailed` - 更新钩子失败
    /// - `UpdateRevertFailed` - 更新失败且无法恢复更新前的条目
    #[instrument(skip(self, new_manifest), fields(module_id = %name, version = %new_manifest.version))]
    pub async fn update(&self, name: &str, new_manifest: ModuleManifest) -> Result<()> {
        info!("更新模块");
        let _lock = self.registry.lock_module(name).await?;

        let new_manifest = new_manifest.normalized();
        if new_manifest.name != name {
            return Err(CoreError::InvalidManifest(format!(
                "新清单名称 '{}' 与模块 '{}' 不一致",
                new_manifest.name, name
            )));
        }

        let snapshot = self.registry.snapshot().await?;
        let prior = match snapshot.entry(name) {
            Some(entry) if entry.state.can_update() => entry.clone(),
            Some(entry) => return Err(Self::invalid_transition(name, entry.state, "update")),
            None => return Err(Self::not_installed(&snapshot, name, "update")),
        };

        let mut updating = Transition::new(RegistryChange::Put(prior.clone().begin_update()));
        updating.observe(&snapshot, name);
        let updating_revision = self
            .commit_with_retry(name, updating, |_| -> Result<Option<Transition>> {
                Err(CoreError::ConcurrentModification {
                    module: name.to_string(),
                    reason: "进入更新状态时条目被修改".to_string(),
                })
            })
            .await?
            .map(|entry| entry.revision);

        match self.apply_update(&prior, &new_manifest).await {
            Ok(()) => {
                info!(from = %prior.manifest.version, "模块更新成功");
                self.publish(
                    event_types::MODULE_UPDATED,
                    name,
                    json!({
                        "from_version": prior.manifest.version,
                        "to_version": new_manifest.version,
                        "state": prior.state,
                    }),
                )
                .await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "模块更新失败，恢复原条目");
                let reverted = self.revert_update(&prior, updating_revision, &e).await;
                self.publish(
                    event_types::MODULE_UPDATE_FAILED,
                    name,
                    json!({
                        "from_version": prior.manifest.version,
                        "to_version": new_manifest.version,
                        "error": e.to_string(),
                        "reverted": reverted.is_ok(),
                    }),
                )
                .await;
                reverted?;
                Err(e)
            }
        }
    }

    /// 把模块恢复到更新前的条目
    ///
    /// 只有条目仍是本次写入的 `Updating` 条目时才提交。写入失败会按提交重试次数重试，
    /// 仍然失败则把模块标记为 `Failed`；存储完全不可写时只在内存中标记。
    async fn revert_update(
        &self,
        prior: &RegistryEntry,
        updating_revision: Option<u64>,
        update_error: &CoreError,
    ) -> Result<()> {
        let name = prior.name();
        let expected = HashMap::from([(name.to_string(), updating_revision)]);

        let mut revert_error = None;
        for attempt in 0..=self.max_commit_retries {
            match self
                .registry
                .commit(&expected, RegistryChange::Put(prior.clone()))
                .await
            {
                Ok(_) => {
                    debug!(module_id = %name, state = %prior.state, "已恢复更新前的条目");
                    return Ok(());
                }
                Err(e) => {
                    warn!(module_id = %name, attempt, error = %e, "恢复更新前的条目失败");
                    let stale = matches!(e, CoreError::ConcurrentModification { .. });
                    revert_error = Some(e);
                    if stale {
                        break;
                    }
                }
            }
        }
        let revert_error = revert_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "未知错误".to_string());

        error!(module_id = %name, error = %revert_error, "无法恢复更新前的条目，标记为失败");
        let failed = RegistryEntry::new(prior.manifest.clone(), ModuleState::Failed);
        if let Err(e) = self.registry.put(failed.clone()).await {
            error!(module_id = %name, error = %e, "无法持久化失败状态");
            self.registry.replace_in_memory(failed).await;
        }

        Err(CoreError::UpdateRevertFailed {
            module: name.to_string(),
            state: ModuleState::Failed.to_string(),
            update_error: update_error.to_string(),
            revert_error,
        })
    }

    async fn apply_update(&self, prior: &RegistryEntry, new_manifest: &ModuleManifest) -> Result<()> {
        let name = prior.name();
        new_manifest.validate()?;

        let snapshot = self.registry.snapshot().await?;
        let transition = self.validate_update(&snapshot, prior, new_manifest)?;

        if let Err(e) = self.hooks.on_update(&prior.manifest, new_manifest).await {
            return Err(CoreError::HookFailed {
                module: name.to_string(),
                operation: "update".to_string(),
                reason: e.to_string(),
            });
        }

        self.commit_with_retry(name, transition, |s| self.validate_update(s, prior, new_manifest))
            .await?;
        Ok(())
    }

    // ==================== 校验 ====================

    fn validate_install(
        &self,
        snapshot: &RegistrySnapshot,
        name: &str,
        force: bool,
    ) -> Result<Transition> {
        let manifest = Self::manifest_of(snapshot, name)?;

        let state = snapshot.state(name);
        if !matches!(state, ModuleState::NotInstalled | ModuleState::Failed) {
            return Err(CoreError::ModuleAlreadyInstalled(name.to_string()));
        }

        let (graph, _) = DependencyGraph::build_lenient(snapshot.all_manifests());
        if let Some(cycle) = graph.cycle_through(name) {
            return Err(CoreError::CircularDependency {
                cycles: vec![cycle],
            });
        }

        let mut transition = Transition::new(RegistryChange::Put(RegistryEntry::new(
            manifest.clone(),
            ModuleState::Installed,
        )));
        transition.observe(snapshot, name);

        let missing: Vec<String> = manifest
            .required_dependencies
            .iter()
            .filter(|dep| !graph.contains_module(dep))
            .cloned()
            .collect();
        if !missing.is_empty() {
            transition.enforce(
                name,
                force,
                CoreError::Dependency {
                    module: name.to_string(),
                    reason: "的必需依赖不存在".to_string(),
                    blockers: missing,
                },
            )?;
        }

        Ok(transition)
    }

    fn validate_enable(
        &self,
        snapshot: &RegistrySnapshot,
        name: &str,
        force: bool,
    ) -> Result<Option<Transition>> {
        let entry = match snapshot.entry(name) {
            Some(entry) => entry,
            None => return Err(Self::not_installed(snapshot, name, "enable")),
        };
        if entry.state == ModuleState::Enabled {
            return Ok(None);
        }
        if !entry.state.can_enable() {
            return Err(Self::invalid_transition(name, entry.state, "enable"));
        }

        let mut transition =
            Transition::new(RegistryChange::Put(entry.clone().with_state(ModuleState::Enabled)));
        transition.observe(snapshot, name);

        let mut not_enabled = Vec::new();
        for dep in &entry.manifest.required_dependencies {
            transition.observe(snapshot, dep);
            if snapshot.state(dep) != ModuleState::Enabled {
                not_enabled.push(dep.clone());
            }
        }
        if !not_enabled.is_empty() {
            transition.enforce(
                name,
                force,
                CoreError::Dependency {
                    module: name.to_string(),
                    reason: "的必需依赖未启用".to_string(),
                    blockers: not_enabled,
                },
            )?;
        }

        let conflicts = Self::enabled_conflicts(snapshot, &entry.manifest, &mut transition);
        if !conflicts.is_empty() {
            transition.enforce(
                name,
                force,
                CoreError::Conflict {
                    module: name.to_string(),
                    conflicts,
                },
            )?;
        }

        Ok(Some(transition))
    }

    fn validate_disable(
        &self,
        snapshot: &RegistrySnapshot,
        name: &str,
        force: bool,
    ) -> Result<Option<Transition>> {
        let entry = match snapshot.entry(name) {
            Some(entry) => entry,
            None => return Err(Self::not_installed(snapshot, name, "disable")),
        };
        if entry.state == ModuleState::Disabled {
            return Ok(None);
        }
        if !entry.state.can_disable() {
            return Err(Self::invalid_transition(name, entry.state, "disable"));
        }

        let mut transition =
            Transition::new(RegistryChange::Put(entry.clone().with_state(ModuleState::Disabled)));
        transition.observe(snapshot, name);

        let enabled_dependents: Vec<String> =
            Self::required_by(snapshot, name, &mut transition)
                .into_iter()
                .filter(|dependent| snapshot.may_be_enabled(dependent))
                .collect();
        if !enabled_dependents.is_empty() {
            transition.enforce(
                name,
                force,
                CoreError::Dependency {
                    module: name.to_string(),
                    reason: "仍被已启用的模块依赖".to_string(),
                    blockers: enabled_dependents,
                },
            )?;
        }

        Ok(Some(transition))
    }

    fn validate_remove(
        &self,
        snapshot: &RegistrySnapshot,
        name: &str,
        force: bool,
    ) -> Result<Transition> {
        let entry = match snapshot.entry(name) {
            Some(entry) => entry,
            None => return Err(Self::not_installed(snapshot, name, "remove")),
        };
        if !entry.state.can_remove() {
            return Err(Self::invalid_transition(name, entry.state, "remove"));
        }

        let mut transition = Transition::new(RegistryChange::Delete(name.to_string()));
        transition.observe(snapshot, name);

        let installed_dependents: Vec<String> =
            Self::required_by(snapshot, name, &mut transition)
                .into_iter()
                .filter(|dependent| snapshot.state(dependent).is_installed())
                .collect();
        if !installed_dependents.is_empty() {
            transition.enforce(
                name,
                force,
                CoreError::Dependency {
                    module: name.to_string(),
                    reason: "仍被已安装的模块依赖".to_string(),
                    blockers: installed_dependents,
                },
            )?;
        }

        Ok(transition)
    }

    fn validate_update(
        &self,
        snapshot: &RegistrySnapshot,
        prior: &RegistryEntry,
        new_manifest: &ModuleManifest,
    ) -> Result<Transition> {
        let name = prior.name();
        let mut transition = Transition::new(RegistryChange::Put(
            prior.clone().with_manifest(new_manifest.clone()),
        ));
        transition.observe(snapshot, name);

        let mut manifests = snapshot.manifests.clone();
        manifests.insert(name.to_string(), new_manifest.clone());
        let (graph, unresolved) = DependencyGraph::build_lenient(manifests.into_values());

        let missing: Vec<String> = unresolved
            .into_iter()
            .filter(|edge| edge.module == name)
            .map(|edge| edge.dependency)
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Dependency {
                module: name.to_string(),
                reason: "的新必需依赖不存在".to_string(),
                blockers: missing,
            });
        }

        if let Some(cycle) = graph.cycle_through(name) {
            return Err(CoreError::CircularDependency {
                cycles: vec![cycle],
            });
        }

        if prior.state == ModuleState::Enabled {
            let mut not_enabled = Vec::new();
            for dep in &new_manifest.required_dependencies {
                transition.observe(snapshot, dep);
                if snapshot.state(dep) != ModuleState::Enabled {
                    not_enabled.push(dep.clone());
                }
            }
            if !not_enabled.is_empty() {
                return Err(CoreError::Dependency {
                    module: name.to_string(),
                    reason: "的新必需依赖未启用".to_string(),
                    blockers: not_enabled,
                });
            }

            let conflicts = Self::enabled_conflicts(snapshot, new_manifest, &mut transition);
            if !conflicts.is_empty() {
                return Err(CoreError::Conflict {
                    module: name.to_string(),
                    conflicts,
                });
            }
        }

        Ok(transition)
    }

    /// 与模块冲突且可能处于启用状态的模块（双向检查）
    ///
    /// 正在更新的模块的清单可能随时改变，所以总是观察它们的修订号。
    fn enabled_conflicts(
        snapshot: &RegistrySnapshot,
        manifest: &ModuleManifest,
        transition: &mut Transition,
    ) -> Vec<String> {
        let name = manifest.name.as_str();
        let mut conflicts: Vec<String> = Vec::new();

        for other in &manifest.conflicts {
            transition.observe(snapshot, other);
            if snapshot.may_be_enabled(other) {
                conflicts.push(other.clone());
            }
        }

        for (other, entry) in &snapshot.entries {
            if other == name || !entry.manifest.conflicts_with(name) {
                continue;
            }
            transition.observe(snapshot, other);
            if entry.may_be_enabled() && !conflicts.contains(other) {
                conflicts.push(other.clone());
            }
        }
        for updating in snapshot.updating_modules() {
            transition.observe(snapshot, &updating);
        }

        conflicts.sort();
        conflicts
    }

    /// 必需依赖该模块的已安装模块
    ///
    /// 同时观察所有正在更新的模块，它们的新清单可能会加上这条依赖。
    fn required_by(
        snapshot: &RegistrySnapshot,
        name: &str,
        transition: &mut Transition,
    ) -> Vec<String> {
        let dependents: Vec<String> = snapshot
            .entries
            .values()
            .filter(|entry| entry.manifest.requires_module(name))
            .map(|entry| entry.manifest.name.clone())
            .collect();
        for dependent in dependents.iter().cloned().chain(snapshot.updating_modules()) {
            transition.observe(snapshot, &dependent);
        }
        dependents
    }

    fn manifest_of(snapshot: &RegistrySnapshot, name: &str) -> Result<ModuleManifest> {
        snapshot
            .manifests
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))
    }

    fn not_installed(snapshot: &RegistrySnapshot, name: &str, operation: &str) -> CoreError {
        if snapshot.manifests.contains_key(name) {
            Self::invalid_transition(name, ModuleState::NotInstalled, operation)
        } else {
            CoreError::ModuleNotFound(name.to_string())
        }
    }

    fn invalid_transition(name: &str, state: ModuleState, operation: &str) -> CoreError {
        CoreError::InvalidTransition {
            module: name.to_string(),
            state: state.to_string(),
            operation: operation.to_string(),
        }
    }

    // ==================== 提交 ====================

    /// 乐观提交，快照过期时重新校验后重试
    ///
    /// `revalidate` 返回 `Ok(None)` 表示目标状态已经达到，不再提交。
    async fn commit_with_retry<F, T>(
        &self,
        name: &str,
        mut transition: Transition,
        revalidate: F,
    ) -> Result<Option<RegistryEntry>>
    where
        F: Fn(&RegistrySnapshot) -> Result<T>,
        T: Into<Option<Transition>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match self
                .registry
                .commit(&transition.expected, transition.change.clone())
                .await
            {
                Ok(entry) => return Ok(entry),
                Err(CoreError::ConcurrentModification { reason, .. }) => {
                    if attempt >= self.max_commit_retries {
                        warn!(module_id = %name, attempts = attempt + 1, "提交重试次数已用尽");
                        return Err(CoreError::ConcurrentModification {
                            module: name.to_string(),
                            reason: format!("重试 {} 次后仍然冲突: {}", attempt, reason),
                        });
                    }
                    attempt += 1;
                    debug!(module_id = %name, attempt, reason = %reason, "快照已过期，重新校验");

                    let snapshot = self.registry.snapshot().await?;
                    let outcome: Result<Option<Transition>> = revalidate(&snapshot).map(Into::into);
                    match outcome {
                        Ok(Some(next)) => transition = next,
                        Ok(None) => return Ok(snapshot.entry(name).cloned()),
                        Err(e) => {
                            return Err(CoreError::ConcurrentModification {
                                module: name.to_string(),
                                reason: format!("并发修改后重新校验失败: {}", e),
                            })
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 钩子失败：把模块标记为 `Failed` 并返回 `HookFailed`
    async fn fail_module(
        &self,
        manifest: ModuleManifest,
        operation: &str,
        err: anyhow::Error,
    ) -> CoreError {
        let name = manifest.name.clone();
        error!(module_id = %name, operation, error = %err, "生命周期钩子执行失败");

        if let Err(e) = self
            .registry
            .put(RegistryEntry::new(manifest, ModuleState::Failed))
            .await
        {
            error!(module_id = %name, error = %e, "无法记录失败状态");
        }

        CoreError::HookFailed {
            module: name,
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }

    async fn publish(&self, event_name: &str, name: &str, data: Value) {
        let mut payload = Map::new();
        payload.insert("module".to_string(), json!(name));
        if let Value::Object(extra) = data {
            payload.extend(extra);
        }

        if let Err(e) = self.publisher.publish(event_name, payload).await {
            warn!(module_id = %name, event_type = event_name, error = %e, "事件发布失败");
        }
    }

    // ==================== 查询 ====================

    /// 获取模块状态
    pub async fn status(&self, name: &str) -> Result<ModuleState> {
        self.registry
            .get_state(name)
            .await?
            .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))
    }

    /// 基于当前注册表构建严格依赖图
    ///
    /// 任何必需依赖缺失都会返回 `UnknownDependency`。
    pub async fn graph(&self) -> Result<DependencyGraph> {
        let snapshot = self.registry.snapshot().await?;
        Ok(DependencyGraph::build(snapshot.all_manifests())?
            .with_states(snapshot.states())
            .with_weights(self.weights))
    }

    /// 基于当前注册表构建宽松依赖图，同时返回缺失的依赖边
    pub async fn lenient_graph(&self) -> Result<(DependencyGraph, Vec<UnresolvedEdge>)> {
        let snapshot = self.registry.snapshot().await?;
        let (graph, unresolved) = DependencyGraph::build_lenient(snapshot.all_manifests());
        Ok((
            graph.with_states(snapshot.states()).with_weights(self.weights),
            unresolved,
        ))
    }

    /// 全部已知模块的安装顺序
    pub async fn install_order(&self) -> Result<Vec<String>> {
        self.graph().await?.topological_order()
    }

    /// 影响分析
    pub async fn analyze(&self, name: &str) -> Result<ImpactReport> {
        self.lenient_graph().await?.0.analyze_impact(name)
    }

    /// 枢纽模块，`threshold` 为空时使用配置的默认值
    pub async fn hubs(&self, threshold: Option<usize>) -> Result<Vec<HubModule>> {
        let threshold = threshold.unwrap_or(self.hub_threshold);
        Ok(self.lenient_graph().await?.0.identify_hubs(threshold))
    }

    /// 模块聚类
    pub async fn clusters(&self) -> Result<Vec<Cluster>> {
        Ok(self.lenient_graph().await?.0.cluster())
    }

    /// 所有循环依赖
    pub async fn cycles(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.lenient_graph().await?.0.find_cycles())
    }
}
