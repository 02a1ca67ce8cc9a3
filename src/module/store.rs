//! 注册表持久化存储
//!
//! 注册表把每个已安装模块的清单和状态写入 [`RegistryStore`]。
//! 内置两个实现：进程内的 [`MemoryStore`] 和单文件 JSON 的 [`JsonFileStore`]。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::module::registry::RegistryEntry;
use crate::utils::{CoreError, Result};

/// 注册表存储接口
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// 读取全部条目
    async fn load_all(&self) -> Result<Vec<RegistryEntry>>;

    /// 读取单个条目
    async fn load(&self, name: &str) -> Result<Option<RegistryEntry>>;

    /// 写入（插入或覆盖）条目
    async fn save(&self, entry: &RegistryEntry) -> Result<()>;

    /// 删除条目，条目不存在时不报错
    async fn remove(&self, name: &str) -> Result<()>;
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn load(&self, name: &str) -> Result<Option<RegistryEntry>> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn save(&self, entry: &RegistryEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.manifest.name.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.entries.write().await.remove(name);
        Ok(())
    }
}

/// JSON 文件中的文档结构
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    modules: BTreeMap<String, RegistryEntry>,
}

/// JSON 文件存储
///
/// 整个注册表保存为一个 JSON 文档。每次写入先写临时文件再重命名，
/// 读者不会看到写了一半的文件。写操作在进程内串行执行。
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// 创建文件存储，文件不存在时视为空注册表
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 存储文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<StoreDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                CoreError::Storage(format!("无法解析注册表文件 {:?}: {}", self.path, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(CoreError::Storage(format!(
                "无法读取注册表文件 {:?}: {}",
                self.path, e
            ))),
        }
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await.map_err(|e| {
            CoreError::Storage(format!("无法写入临时文件 {:?}: {}", tmp_path, e))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            CoreError::Storage(format!("无法替换注册表文件 {:?}: {}", self.path, e))
        })?;

        tracing::trace!(path = ?self.path, modules = document.modules.len(), "注册表已写入");
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.read_document().await?.modules.into_values().collect())
    }

    async fn load(&self, name: &str) -> Result<Option<RegistryEntry>> {
        Ok(self.read_document().await?.modules.remove(name))
    }

    async fn save(&self, entry: &RegistryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document
            .modules
            .insert(entry.manifest.name.clone(), entry.clone());
        self.write_document(&document).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        if document.modules.remove(name).is_some() {
            self.write_document(&document).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::manifest::ModuleManifest;
    use crate::module::state::ModuleState;
    use tempfile::TempDir;

    fn entry(name: &str, state: ModuleState) -> RegistryEntry {
        RegistryEntry::new(ModuleManifest::new(name, "1.0.0"), state)
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.save(&entry("a", ModuleState::Installed)).await.unwrap();
        store.save(&entry("b", ModuleState::Enabled)).await.unwrap();

        assert_eq!(store.load_all().await.unwrap().len(), 2);
        assert_eq!(
            store.load("b").await.unwrap().unwrap().state,
            ModuleState::Enabled
        );

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("registry.json");

        let store = JsonFileStore::new(&path);
        assert!(store.load_all().await.unwrap().is_empty());

        store.save(&entry("db", ModuleState::Enabled)).await.unwrap();
        store.save(&entry("app", ModuleState::Installed)).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        // 新实例读取同一文件
        let reopened = JsonFileStore::new(&path);
        let entries = reopened.load_all().await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.manifest.name.as_str()).collect();
        assert_eq!(names, vec!["app", "db"]);

        reopened.remove("db").await.unwrap();
        assert!(store.load("db").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_store_corrupted_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load_all().await,
            Err(CoreError::Storage(_))
        ));
    }
}
