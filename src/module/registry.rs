//! 模块注册表
//!
//! 保存每个已安装模块的清单与状态，提供读穿透查询、一致性快照，
//! 以及生命周期管理器使用的按模块加锁和乐观提交。
//!
//! 读取路径：内存条目表 → 持久化存储 → 发现来源。
//! 只被发现、尚未安装的模块以临时的 `NotInstalled` 条目返回，不会写入存储。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::core::config::CoreConfig;
use crate::module::discovery::{DirectoryDiscovery, ManifestSource, StaticDiscovery};
use crate::module::manifest::ModuleManifest;
use crate::module::state::ModuleState;
use crate::module::store::{JsonFileStore, MemoryStore, RegistryStore};
use crate::utils::{CoreError, Result};

/// 默认的锁等待超时
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// 默认的清单缓存容量
const DEFAULT_MANIFEST_CACHE_CAPACITY: usize = 256;

/// 模块锁守卫，释放即解锁
pub type ModuleLock = OwnedMutexGuard<()>;

/// 注册表条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// 模块清单
    pub manifest: ModuleManifest,

    /// 当前状态
    pub state: ModuleState,

    /// 最后修改时间
    pub last_modified: DateTime<Utc>,

    /// 修订号，每次写入都会递增，用于乐观提交检查
    #[serde(default)]
    pub revision: u64,

    /// 更新前的状态，只在 `Updating` 期间存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<ModuleState>,
}

impl RegistryEntry {
    /// 创建新条目
    pub fn new(manifest: ModuleManifest, state: ModuleState) -> Self {
        Self {
            manifest,
            state,
            last_modified: Utc::now(),
            revision: 0,
            resume_state: None,
        }
    }

    /// 模块名称
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// 返回修改了状态的副本
    pub fn with_state(mut self, state: ModuleState) -> Self {
        self.state = state;
        self.resume_state = None;
        self
    }

    /// 返回进入 `Updating` 的副本，记住更新前的状态
    pub fn begin_update(mut self) -> Self {
        self.resume_state = Some(self.state);
        self.state = ModuleState::Updating;
        self
    }

    /// 模块可能处于启用状态
    ///
    /// 更新中的模块在更新结束后会回到更新前的状态，
    /// 所以更新前已启用的模块在整个更新期间都按已启用对待。
    pub fn may_be_enabled(&self) -> bool {
        match self.state {
            ModuleState::Enabled => true,
            ModuleState::Updating => self.resume_state == Some(ModuleState::Enabled),
            _ => false,
        }
    }

    /// 从存储恢复时，把中断的更新还原为更新前的状态
    ///
    /// 存储里留下 `Updating` 说明新清单从未提交，条目中仍是旧清单。
    fn recovered(mut self) -> Self {
        if self.state == ModuleState::Updating {
            tracing::warn!(
                module_id = %self.manifest.name,
                resume_state = ?self.resume_state,
                "发现中断的更新，恢复到更新前的状态"
            );
            self.state = self.resume_state.take().unwrap_or(ModuleState::Failed);
        }
        self
    }

    /// 返回替换了清单的副本
    pub fn with_manifest(mut self, manifest: ModuleManifest) -> Self {
        self.manifest = manifest;
        self
    }
}

/// 注册表的一致性快照
///
/// 生命周期管理器基于快照做所有前置条件检查，然后凭快照中的修订号提交。
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// 已安装模块的条目
    pub entries: BTreeMap<String, RegistryEntry>,

    /// 全部已知清单（已注册的优先于发现的）
    pub manifests: BTreeMap<String, ModuleManifest>,
}

impl RegistrySnapshot {
    /// 获取条目
    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// 获取模块状态，未安装的模块返回 `NotInstalled`
    pub fn state(&self, name: &str) -> ModuleState {
        self.entries
            .get(name)
            .map(|e| e.state)
            .unwrap_or(ModuleState::NotInstalled)
    }

    /// 模块可能处于启用状态，见 [`RegistryEntry::may_be_enabled`]
    pub fn may_be_enabled(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(RegistryEntry::may_be_enabled)
            .unwrap_or(false)
    }

    /// 正在更新的模块名（升序）
    pub fn updating_modules(&self) -> Vec<String> {
        self.modules_in_state(ModuleState::Updating)
    }

    /// 获取模块修订号，`None` 表示条目不存在
    pub fn revision(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|e| e.revision)
    }

    /// 所有已安装模块的状态
    pub fn states(&self) -> HashMap<String, ModuleState> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.state))
            .collect()
    }

    /// 所有已知清单
    pub fn all_manifests(&self) -> Vec<ModuleManifest> {
        self.manifests.values().cloned().collect()
    }

    /// 处于指定状态的模块名（升序）
    pub fn modules_in_state(&self, state: ModuleState) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.state == state)
            .map(|e| e.manifest.name.clone())
            .collect()
    }
}

/// 注册表变更
#[derive(Debug, Clone)]
pub enum RegistryChange {
    /// 写入条目
    Put(RegistryEntry),
    /// 删除条目
    Delete(String),
}

impl RegistryChange {
    fn module(&self) -> &str {
        match self {
            RegistryChange::Put(entry) => entry.name(),
            RegistryChange::Delete(name) => name,
        }
    }
}

/// 模块注册表
///
/// 内部状态都在 `Arc` 中，克隆出的注册表共享同一份数据。
#[derive(Clone)]
pub struct ModuleRegistry {
    /// 已安装模块：name -> RegistryEntry
    entries: Arc<RwLock<HashMap<String, RegistryEntry>>>,

    /// 持久化存储
    store: Arc<dyn RegistryStore>,

    /// 清单发现来源
    discovery: Arc<dyn ManifestSource>,

    /// 按名称查询到的发现清单缓存
    manifest_cache: Arc<Mutex<LruCache<String, ModuleManifest>>>,

    /// 完整的发现清单列表缓存
    discovered: Arc<RwLock<Option<BTreeMap<String, ModuleManifest>>>>,

    /// 已启用模块列表缓存，任何写入都会使其失效
    enabled_cache: Arc<RwLock<Option<Vec<String>>>>,

    /// 每个模块一把锁
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,

    /// 全局修订号计数器
    revision_counter: Arc<AtomicU64>,

    /// 锁等待超时
    lock_timeout: Duration,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("lock_timeout", &self.lock_timeout)
            .field("revision", &self.revision_counter.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ModuleRegistry {
    /// 创建新的模块注册表
    ///
    /// # Arguments
    ///
    /// * `store` - 持久化存储
    /// * `discovery` - 清单发现来源
    pub fn new(store: Arc<dyn RegistryStore>, discovery: Arc<dyn ManifestSource>) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_MANIFEST_CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            store,
            discovery,
            manifest_cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            discovered: Arc::new(RwLock::new(None)),
            enabled_cache: Arc::new(RwLock::new(None)),
            locks: Arc::new(Mutex::new(HashMap::new())),
            revision_counter: Arc::new(AtomicU64::new(0)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// 使用内存存储和静态清单创建注册表
    pub fn in_memory<I>(manifests: I) -> Self
    where
        I: IntoIterator<Item = ModuleManifest>,
    {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticDiscovery::from_manifests(manifests)),
        )
    }

    /// 根据配置创建注册表
    ///
    /// 配置了 `registry_path` 时使用 JSON 文件存储，否则使用内存存储；
    /// 清单从 `module_dirs` 中扫描。
    pub fn from_config(config: &CoreConfig) -> Self {
        let store: Arc<dyn RegistryStore> = match &config.modules.registry_path {
            Some(path) => Arc::new(JsonFileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        let discovery = Arc::new(DirectoryDiscovery::new(config.modules.module_dirs.clone()));

        Self::new(store, discovery)
            .with_lock_timeout(Duration::from_millis(config.lifecycle.lock_timeout_ms))
            .with_cache_capacity(config.modules.manifest_cache_capacity)
    }

    /// 设置锁等待超时
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// 设置清单缓存容量
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self.manifest_cache = Arc::new(Mutex::new(LruCache::new(capacity)));
        self
    }

    /// 获取锁等待超时
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// 从持久化存储加载全部条目
    ///
    /// 通常在启动时调用一次。返回加载的条目数量。
    pub async fn load(&self) -> Result<usize> {
        let loaded = self.store.load_all().await?;
        let count = loaded.len();

        let mut entries = self.entries.write().await;
        for entry in loaded {
            self.revision_counter
                .fetch_max(entry.revision, Ordering::SeqCst);
            entries.insert(entry.manifest.name.clone(), entry.recovered());
        }
        drop(entries);

        self.invalidate_views().await;
        tracing::info!(modules = count, "已从存储加载注册表");
        Ok(count)
    }

    // ==================== 查询 ====================

    /// 读穿透查询
    ///
    /// 依次查找内存条目表、持久化存储和发现来源。
    /// 只存在于发现来源中的模块返回 `NotInstalled` 状态的临时条目。
    pub async fn get(&self, name: &str) -> Result<Option<RegistryEntry>> {
        if let Some(entry) = self.entries.read().await.get(name) {
            return Ok(Some(entry.clone()));
        }

        if let Some(stored) = self.store.load(name).await? {
            self.revision_counter
                .fetch_max(stored.revision, Ordering::SeqCst);
            let mut entries = self.entries.write().await;
            let entry = entries
                .entry(name.to_string())
                .or_insert_with(|| stored.recovered())
                .clone();
            drop(entries);
            self.invalidate_views().await;
            return Ok(Some(entry));
        }

        Ok(self
            .discovered_manifest(name)
            .await?
            .map(|manifest| RegistryEntry::new(manifest, ModuleState::NotInstalled)))
    }

    /// 获取模块状态
    pub async fn get_state(&self, name: &str) -> Result<Option<ModuleState>> {
        Ok(self.get(name).await?.map(|e| e.state))
    }

    /// 列出所有已安装模块的条目（按名称排序的副本）
    pub async fn list(&self) -> Vec<RegistryEntry> {
        let entries = self.entries.read().await;
        let mut list: Vec<RegistryEntry> = entries.values().cloned().collect();
        drop(entries);
        list.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        list
    }

    /// 已安装模块数量
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 已启用模块名（升序，带缓存）
    pub async fn enabled_modules(&self) -> Vec<String> {
        if let Some(cached) = self.enabled_cache.read().await.as_ref() {
            return cached.clone();
        }

        // 写入缓存前不能释放读锁
        let entries = self.entries.read().await;
        let mut enabled: Vec<String> = entries
            .values()
            .filter(|e| e.state == ModuleState::Enabled)
            .map(|e| e.manifest.name.clone())
            .collect();
        enabled.sort();

        *self.enabled_cache.write().await = Some(enabled.clone());
        enabled
    }

    /// 全部已知清单：已注册的与发现的并集，同名时已注册的优先
    pub async fn manifests(&self) -> Result<Vec<ModuleManifest>> {
        Ok(self.snapshot().await?.all_manifests())
    }

    /// 获取一致性快照
    pub async fn snapshot(&self) -> Result<RegistrySnapshot> {
        let mut manifests = self.discovered_manifests().await?;

        let entries: BTreeMap<String, RegistryEntry> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        for (name, entry) in &entries {
            manifests.insert(name.clone(), entry.manifest.clone());
        }

        Ok(RegistrySnapshot { entries, manifests })
    }

    /// 丢弃发现来源的缓存，下次查询时重新扫描
    pub async fn refresh_discovery(&self) {
        self.manifest_cache.lock().await.clear();
        *self.discovered.write().await = None;
        tracing::debug!("已清空发现清单缓存");
    }

    async fn discovered_manifests(&self) -> Result<BTreeMap<String, ModuleManifest>> {
        if let Some(cached) = self.discovered.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let listed: BTreeMap<String, ModuleManifest> = self
            .discovery
            .list_manifests()
            .await?
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();
        tracing::debug!(modules = listed.len(), "已读取发现清单");

        *self.discovered.write().await = Some(listed.clone());
        Ok(listed)
    }

    async fn discovered_manifest(&self, name: &str) -> Result<Option<ModuleManifest>> {
        if let Some(manifest) = self.manifest_cache.lock().await.get(name) {
            return Ok(Some(manifest.clone()));
        }

        let found = self.discovery.find_manifest(name).await?;
        if let Some(manifest) = &found {
            self.manifest_cache
                .lock()
                .await
                .put(name.to_string(), manifest.clone());
        }
        Ok(found)
    }

    // ==================== 写入 ====================

    /// 写入条目（无条件）
    ///
    /// 分配新的修订号并持久化，返回写入后的条目。
    pub async fn put(&self, entry: RegistryEntry) -> Result<RegistryEntry> {
        let written = self
            .commit(&HashMap::new(), RegistryChange::Put(entry))
            .await?;
        written.ok_or_else(|| CoreError::Internal("写入条目后未返回结果".to_string()))
    }

    /// 删除条目
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.commit(&HashMap::new(), RegistryChange::Delete(name.to_string()))
            .await?;
        Ok(())
    }

    /// 乐观提交
    ///
    /// `expected` 记录了校验时观察到的修订号（`None` 表示当时条目不存在）。
    /// 任何一个与当前值不一致时返回 `ConcurrentModification`，不做任何修改。
    /// 先写存储再更新内存，存储失败时内存保持不变。
    ///
    /// 条目表的写锁一直持有到存储写入完成：修订号检查、存储写入和内存更新
    /// 必须对其它提交表现为一步。因此提交之间的并发度受存储写入速度限制，
    /// `JsonFileStore` 每次提交都会重写整个文件。读操作只在复制条目时短暂持有读锁。
    pub async fn commit(
        &self,
        expected: &HashMap<String, Option<u64>>,
        change: RegistryChange,
    ) -> Result<Option<RegistryEntry>> {
        let module = change.module().to_string();
        let mut entries = tokio::time::timeout(self.lock_timeout, self.entries.write())
            .await
            .map_err(|_| CoreError::LockTimeout {
                module: module.clone(),
                timeout_ms: self.lock_timeout.as_millis() as u64,
            })?;

        for (name, revision) in expected {
            let current = entries.get(name).map(|e| e.revision);
            if current != *revision {
                tracing::debug!(
                    module_id = %module,
                    changed = %name,
                    expected = ?revision,
                    current = ?current,
                    "提交检测到过期快照"
                );
                return Err(CoreError::ConcurrentModification {
                    module,
                    reason: format!("模块 '{}' 在校验后被修改", name),
                });
            }
        }

        let result = match change {
            RegistryChange::Put(mut entry) => {
                entry.revision = self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1;
                entry.last_modified = Utc::now();
                self.store.save(&entry).await?;
                entries.insert(module.clone(), entry.clone());
                tracing::trace!(module_id = %module, state = %entry.state, revision = entry.revision, "条目已写入");
                Some(entry)
            }
            RegistryChange::Delete(name) => {
                self.store.remove(&name).await?;
                entries.remove(&name);
                tracing::trace!(module_id = %name, "条目已删除");
                None
            }
        };
        self.invalidate_views().await;
        drop(entries);

        Ok(result)
    }

    /// 只在内存中覆盖条目，不写存储
    ///
    /// 仅用于存储不可写时，避免模块在内存中停留在 `Updating`。
    /// 存储中的旧条目会在下次加载时按 [`RegistryEntry`] 的恢复规则处理。
    pub(crate) async fn replace_in_memory(&self, mut entry: RegistryEntry) -> RegistryEntry {
        let name = entry.manifest.name.clone();
        let mut entries = self.entries.write().await;
        entry.revision = self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1;
        entry.last_modified = Utc::now();
        entries.insert(name.clone(), entry.clone());
        self.invalidate_views().await;
        drop(entries);

        tracing::warn!(module_id = %name, state = %entry.state, "条目只写入了内存");
        entry
    }

    async fn invalidate_views(&self) {
        *self.enabled_cache.write().await = None;
    }

    // ==================== 加锁 ====================

    /// 获取模块锁
    ///
    /// 同一模块上的写操作串行执行，不同模块互不影响。
    /// 锁表只保留正在使用或等待中的锁，已移除或从未存在的模块不会一直占用条目。
    ///
    /// # Errors
    ///
    /// 在超时时间内未能获得锁时返回 `LockTimeout`，调用方未做任何修改。
    pub async fn lock_module(&self, name: &str) -> Result<ModuleLock> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // 只有表本身持有的锁没有人在用或在等，可以丢弃
            locks.retain(|locked, lock| locked == name || Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        match tokio::time::timeout(self.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(
                    module_id = %name,
                    timeout_ms = self.lock_timeout.as_millis() as u64,
                    "获取模块锁超时"
                );
                Err(CoreError::LockTimeout {
                    module: name.to_string(),
                    timeout_ms: self.lock_timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::in_memory(vec![
            ModuleManifest::new("db", "1.0"),
            ModuleManifest::new("app", "1.0").requires(["db"]),
        ])
    }

    #[tokio::test]
    async fn test_get_discovered_module_is_not_installed() {
        let registry = registry();
        let entry = registry.get("db").await.unwrap().unwrap();
        assert_eq!(entry.state, ModuleState::NotInstalled);
        assert_eq!(registry.count().await, 0);
        assert!(registry.list().await.is_empty());
        assert!(registry.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let registry = registry();
        let written = registry
            .put(RegistryEntry::new(
                ModuleManifest::new("db", "1.0"),
                ModuleState::Installed,
            ))
            .await
            .unwrap();
        assert!(written.revision > 0);

        let entry = registry.get("db").await.unwrap().unwrap();
        assert_eq!(entry.state, ModuleState::Installed);
        assert_eq!(entry.revision, written.revision);
        assert_eq!(registry.get_state("db").await.unwrap(), Some(ModuleState::Installed));
    }

    #[tokio::test]
    async fn test_revision_increases_on_every_write() {
        let registry = registry();
        let first = registry
            .put(RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Installed))
            .await
            .unwrap();
        let second = registry
            .put(first.clone().with_state(ModuleState::Enabled))
            .await
            .unwrap();
        assert!(second.revision > first.revision);
        assert!(second.last_modified >= first.last_modified);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let registry = registry();
        registry
            .put(RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Installed))
            .await
            .unwrap();
        registry.delete("db").await.unwrap();

        assert_eq!(registry.count().await, 0);
        // 删除后仍可从发现来源查到
        let entry = registry.get("db").await.unwrap().unwrap();
        assert_eq!(entry.state, ModuleState::NotInstalled);
    }

    #[tokio::test]
    async fn test_enabled_modules_cache_invalidation() {
        let registry = registry();
        assert!(registry.enabled_modules().await.is_empty());

        registry
            .put(RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Enabled))
            .await
            .unwrap();
        assert_eq!(registry.enabled_modules().await, vec!["db"]);

        let entry = registry.get("db").await.unwrap().unwrap();
        registry
            .put(entry.with_state(ModuleState::Disabled))
            .await
            .unwrap();
        assert!(registry.enabled_modules().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_prefers_registered_manifest() {
        let registry = registry();
        registry
            .put(RegistryEntry::new(
                ModuleManifest::new("db", "2.0"),
                ModuleState::Installed,
            ))
            .await
            .unwrap();

        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(snapshot.manifests.len(), 2);
        assert_eq!(snapshot.manifests["db"].version, "2.0");
        assert_eq!(snapshot.state("db"), ModuleState::Installed);
        assert_eq!(snapshot.state("app"), ModuleState::NotInstalled);
        assert!(snapshot.revision("app").is_none());
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_revision() {
        let registry = registry();
        let entry = registry
            .put(RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Installed))
            .await
            .unwrap();

        let expected = HashMap::from([("db".to_string(), Some(entry.revision))]);
        registry
            .put(entry.clone().with_state(ModuleState::Enabled))
            .await
            .unwrap();

        let result = registry
            .commit(&expected, RegistryChange::Put(entry.with_state(ModuleState::Disabled)))
            .await;
        assert!(matches!(result, Err(CoreError::ConcurrentModification { .. })));
        assert_eq!(
            registry.get_state("db").await.unwrap(),
            Some(ModuleState::Enabled)
        );
    }

    #[tokio::test]
    async fn test_commit_expects_absent_entry() {
        let registry = registry();
        let expected = HashMap::from([("db".to_string(), None)]);
        let entry = RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Installed);

        registry
            .commit(&expected, RegistryChange::Put(entry.clone()))
            .await
            .unwrap();
        // 条目已存在，再次以"不存在"为前提提交会失败
        assert!(registry
            .commit(&expected, RegistryChange::Put(entry))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = Arc::new(MemoryStore::new());
        let mut entry = RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Enabled);
        entry.revision = 41;
        store.save(&entry).await.unwrap();

        let registry = ModuleRegistry::new(store, Arc::new(StaticDiscovery::new()));
        assert_eq!(registry.load().await.unwrap(), 1);
        assert_eq!(registry.enabled_modules().await, vec!["db"]);

        let next = registry.put(entry.with_state(ModuleState::Disabled)).await.unwrap();
        assert!(next.revision > 41);
    }

    #[tokio::test]
    async fn test_get_reads_through_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Disabled))
            .await
            .unwrap();

        let registry = ModuleRegistry::new(store, Arc::new(StaticDiscovery::new()));
        assert_eq!(registry.get_state("db").await.unwrap(), Some(ModuleState::Disabled));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_lock_module_timeout() {
        let registry = registry().with_lock_timeout(Duration::from_millis(20));
        let _guard = registry.lock_module("db").await.unwrap();

        let result = registry.lock_module("db").await;
        assert!(matches!(
            result,
            Err(CoreError::LockTimeout { timeout_ms: 20, .. })
        ));

        // 其他模块不受影响
        assert!(registry.lock_module("app").await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let registry = registry().with_lock_timeout(Duration::from_millis(50));
        {
            let _guard = registry.lock_module("db").await.unwrap();
        }
        assert!(registry.lock_module("db").await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_table_drops_unused_locks() {
        let registry = registry();
        for i in 0..20 {
            let _guard = registry.lock_module(&format!("ghost-{}", i)).await.unwrap();
        }

        let held = registry.lock_module("db").await.unwrap();
        assert_eq!(registry.locks.lock().await.len(), 1);

        // 正在使用的锁不会被丢弃
        let _other = registry.lock_module("app").await.unwrap();
        assert_eq!(registry.locks.lock().await.len(), 2);
        drop(held);
        assert!(registry.lock_module("db").await.is_ok());
    }

    #[test]
    fn test_updating_entry_may_be_enabled() {
        let enabled = RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Enabled);
        let updating = enabled.clone().begin_update();
        assert_eq!(updating.state, ModuleState::Updating);
        assert_eq!(updating.resume_state, Some(ModuleState::Enabled));
        assert!(updating.may_be_enabled());

        let disabled = enabled.with_state(ModuleState::Disabled).begin_update();
        assert!(!disabled.may_be_enabled());
        assert!(disabled.with_state(ModuleState::Disabled).resume_state.is_none());
    }

    #[tokio::test]
    async fn test_interrupted_update_recovered_on_load() {
        let store = Arc::new(MemoryStore::new());
        let enabled = RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Enabled);
        store.save(&enabled.begin_update()).await.unwrap();
        let orphan = RegistryEntry::new(ModuleManifest::new("app", "1"), ModuleState::Updating);
        store.save(&orphan).await.unwrap();

        let registry = ModuleRegistry::new(store, Arc::new(StaticDiscovery::new()));
        registry.load().await.unwrap();

        let db = registry.get("db").await.unwrap().unwrap();
        assert_eq!(db.state, ModuleState::Enabled);
        assert!(db.resume_state.is_none());
        assert_eq!(registry.get_state("app").await.unwrap(), Some(ModuleState::Failed));
    }

    struct ReadOnlyStore;

    #[async_trait::async_trait]
    impl RegistryStore for ReadOnlyStore {
        async fn load_all(&self) -> Result<Vec<RegistryEntry>> {
            Ok(Vec::new())
        }

        async fn load(&self, _name: &str) -> Result<Option<RegistryEntry>> {
            Ok(None)
        }

        async fn save(&self, _entry: &RegistryEntry) -> Result<()> {
            Err(CoreError::Storage("只读存储".to_string()))
        }

        async fn remove(&self, _name: &str) -> Result<()> {
            Err(CoreError::Storage("只读存储".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_leaves_memory_unchanged() {
        let registry = ModuleRegistry::new(
            Arc::new(ReadOnlyStore),
            Arc::new(StaticDiscovery::from_manifests(vec![ModuleManifest::new("db", "1")])),
        );
        let result = registry
            .put(RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Installed))
            .await;
        assert!(matches!(result, Err(CoreError::Storage(_))));
        assert_eq!(registry.count().await, 0);

        let entry = registry
            .replace_in_memory(RegistryEntry::new(
                ModuleManifest::new("db", "1"),
                ModuleState::Failed,
            ))
            .await;
        assert!(entry.revision > 0);
        assert_eq!(registry.get_state("db").await.unwrap(), Some(ModuleState::Failed));
    }

    #[tokio::test]
    async fn test_registry_clone_shares_state() {
        let registry = registry();
        let cloned = registry.clone();
        registry
            .put(RegistryEntry::new(ModuleManifest::new("db", "1"), ModuleState::Installed))
            .await
            .unwrap();
        assert_eq!(cloned.count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let registry = Arc::new(ModuleRegistry::in_memory(Vec::<ModuleManifest>::new()));

        let mut handles = vec![];
        for i in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                reg.put(RegistryEntry::new(
                    ModuleManifest::new(format!("concurrent-module-{}", i), "1.0.0"),
                    ModuleState::Installed,
                ))
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let list = registry.list().await;
        assert_eq!(list.len(), 10);
        let mut revisions: Vec<u64> = list.iter().map(|e| e.revision).collect();
        revisions.sort();
        revisions.dedup();
        assert_eq!(revisions.len(), 10);
    }
}
