//! 模块发现
//!
//! 发现适配器负责定位模块清单。核心只通过 [`ManifestSource`] 接口读取清单，
//! 清单在这里完成解析和校验，之后在系统内部都是已校验的值。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::module::manifest::ModuleManifest;
use crate::utils::Result;

/// 默认的模块描述文件名
pub const MODULE_MANIFEST_FILENAME: &str = "module.yaml";

/// 模块清单来源
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// 列出所有可发现的模块清单
    async fn list_manifests(&self) -> Result<Vec<ModuleManifest>>;

    /// 按名称查找清单
    async fn find_manifest(&self, name: &str) -> Result<Option<ModuleManifest>> {
        Ok(self
            .list_manifests()
            .await?
            .into_iter()
            .find(|m| m.name == name))
    }
}

/// 内存中的静态清单来源
///
/// 用于内置模块和测试。
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    manifests: BTreeMap<String, ModuleManifest>,
}

impl StaticDiscovery {
    /// 创建空的来源
    pub fn new() -> Self {
        Self::default()
    }

    /// 从清单集合创建
    ///
    /// 校验失败的清单会被跳过并记录警告。同名清单以后出现者为准。
    pub fn from_manifests<I>(manifests: I) -> Self
    where
        I: IntoIterator<Item = ModuleManifest>,
    {
        let mut discovery = Self::new();
        for manifest in manifests {
            discovery.insert(manifest);
        }
        discovery
    }

    /// 添加清单
    pub fn insert(&mut self, manifest: ModuleManifest) -> bool {
        let manifest = manifest.normalized();
        if let Err(e) = manifest.validate() {
            tracing::warn!(module_id = %manifest.name, error = %e, "跳过无效的模块清单");
            return false;
        }
        self.manifests.insert(manifest.name.clone(), manifest);
        true
    }

    /// 清单数量
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

#[async_trait]
impl ManifestSource for StaticDiscovery {
    async fn list_manifests(&self) -> Result<Vec<ModuleManifest>> {
        Ok(self.manifests.values().cloned().collect())
    }

    async fn find_manifest(&self, name: &str) -> Result<Option<ModuleManifest>> {
        Ok(self.manifests.get(name).cloned())
    }
}

/// 目录扫描来源
///
/// 扫描每个模块目录下的子目录，读取其中的 `module.yaml`。
/// 不存在的目录、无法读取的目录和无效的清单都会被跳过（记录日志），不会导致整体失败。
#[derive(Debug, Clone)]
pub struct DirectoryDiscovery {
    module_dirs: Vec<PathBuf>,
}

impl DirectoryDiscovery {
    /// 创建目录扫描来源
    ///
    /// # Arguments
    ///
    /// * `module_dirs` - 模块目录路径列表
    pub fn new(module_dirs: Vec<PathBuf>) -> Self {
        Self { module_dirs }
    }

    /// 获取模块目录列表
    pub fn module_dirs(&self) -> &[PathBuf] {
        &self.module_dirs
    }

    async fn scan_dir(dir: &Path, found: &mut BTreeMap<String, ModuleManifest>) {
        if !dir.exists() {
            tracing::debug!("模块目录不存在，跳过: {:?}", dir);
            return;
        }

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("无法读取模块目录 {:?}: {}", dir, e);
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let manifest_path = path.join(MODULE_MANIFEST_FILENAME);
            if !manifest_path.exists() {
                tracing::trace!("目录 {:?} 中未找到 module.yaml，跳过", path);
                continue;
            }

            match ModuleManifest::parse_file(&manifest_path).await {
                Ok(manifest) => {
                    if found.contains_key(&manifest.name) {
                        tracing::warn!(
                            module_id = %manifest.name,
                            path = ?manifest_path,
                            "模块名称重复，保留先发现的清单"
                        );
                        continue;
                    }
                    tracing::debug!(module_id = %manifest.name, path = ?path, "发现模块");
                    found.insert(manifest.name.clone(), manifest);
                }
                Err(e) => {
                    tracing::warn!("解析模块清单失败 {:?}: {}", manifest_path, e);
                }
            }
        }
    }
}

#[async_trait]
impl ManifestSource for DirectoryDiscovery {
    async fn list_manifests(&self) -> Result<Vec<ModuleManifest>> {
        let mut found = BTreeMap::new();
        for dir in &self.module_dirs {
            Self::scan_dir(dir, &mut found).await;
        }
        Ok(found.into_values().collect())
    }
}
