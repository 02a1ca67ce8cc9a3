//! 模块清单定义
//!
//! 定义模块描述文件 (module.yaml) 中声明的元数据，并在发现边界处做一次性校验。
//!
//! # 示例
//!
//! ```rust
//! use chips_modules::module::manifest::ModuleManifest;
//!
//! let manifest = ModuleManifest::parse_yaml(r#"
//! name: editor
//! version: "2.1"
//! requires: [storage, renderer]
//! optional: [spellcheck]
//! conflicts: [legacy-editor]
//! provides: [text.edit]
//! "#).unwrap();
//!
//! assert_eq!(manifest.required_dependencies, vec!["storage", "renderer"]);
//! assert!(manifest.conflicts_with("legacy-editor"));
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::{CoreError, Result};

/// 模块清单
///
/// 不可变的值类型。依赖列表是有序集合：保留声明顺序，去除重复项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// 模块唯一名称（区分大小写，跨版本稳定）
    pub name: String,

    /// 模块版本（自由格式，不做解析）
    pub version: String,

    /// 模块描述
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// 作者信息
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,

    /// 必需依赖：启用前必须全部处于启用状态
    #[serde(default, alias = "requires")]
    pub required_dependencies: Vec<String>,

    /// 可选依赖：存在时尽力启用
    #[serde(default, alias = "optional")]
    pub optional_dependencies: Vec<String>,

    /// 冲突模块：不能同时启用
    #[serde(default)]
    pub conflicts: BTreeSet<String>,

    /// 提供的能力（仅作说明，不参与依赖解析）
    #[serde(default)]
    pub provides: BTreeSet<String>,
}

impl ModuleManifest {
    /// 创建新的模块清单
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            required_dependencies: vec![],
            optional_dependencies: vec![],
            conflicts: BTreeSet::new(),
            provides: BTreeSet::new(),
        }
    }

    /// 添加必需依赖
    pub fn requires<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            push_unique(&mut self.required_dependencies, dep.into());
        }
        self
    }

    /// 添加可选依赖
    pub fn optional<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            push_unique(&mut self.optional_dependencies, dep.into());
        }
        self
    }

    /// 添加冲突模块
    pub fn conflicts<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflicts.extend(names.into_iter().map(Into::into));
        self
    }

    /// 添加提供的能力
    pub fn provides<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 是否声明与指定模块冲突
    pub fn conflicts_with(&self, name: &str) -> bool {
        self.conflicts.contains(name)
    }

    /// 是否必需依赖指定模块
    pub fn requires_module(&self, name: &str) -> bool {
        self.required_dependencies.iter().any(|d| d == name)
    }

    /// 是否（必需或可选地）依赖指定模块
    pub fn depends_on(&self, name: &str) -> bool {
        self.requires_module(name) || self.optional_dependencies.iter().any(|d| d == name)
    }

    /// 从 YAML 字符串解析并校验清单
    pub fn parse_yaml(content: &str) -> Result<Self> {
        let manifest: ModuleManifest = serde_yaml::from_str(content)?;
        let manifest = manifest.normalized();
        manifest.validate()?;
        Ok(manifest)
    }

    /// 从文件解析并校验清单
    pub async fn parse_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_yaml(&content)
    }

    /// 去除依赖列表中的重复项，保留首次出现的顺序
    pub fn normalized(mut self) -> Self {
        self.required_dependencies = dedup_ordered(self.required_dependencies);
        self.optional_dependencies = dedup_ordered(self.optional_dependencies);
        self
    }

    /// 校验清单
    ///
    /// 执行以下检查：
    /// - 名称非空且只包含字母、数字、下划线、连字符和点
    /// - 版本号非空
    /// - 依赖/冲突名称非空
    /// - 不引用自身
    ///
    /// 所有问题会被汇总到一个 `InvalidManifest` 错误中。
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.name.is_empty() {
            errors.push("模块名称不能为空".to_string());
        } else if !is_valid_module_name(&self.name) {
            errors.push(format!(
                "模块名称 '{}' 格式无效，只允许字母、数字、下划线、连字符和点",
                self.name
            ));
        }

        if self.version.trim().is_empty() {
            errors.push(format!("模块 '{}' 的版本号不能为空", self.name));
        }

        let lists: [(&str, Vec<&String>); 3] = [
            ("必需依赖", self.required_dependencies.iter().collect()),
            ("可选依赖", self.optional_dependencies.iter().collect()),
            ("冲突", self.conflicts.iter().collect()),
        ];
        for (label, names) in lists.iter() {
            for name in names {
                if name.is_empty() {
                    errors.push(format!("模块 '{}' 的{}名称不能为空", self.name, label));
                } else if **name == self.name {
                    errors.push(format!("模块 '{}' 的{}不能引用自身", self.name, label));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidManifest(errors.join("; ")))
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn dedup_ordered(list: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(list.len());
    for item in list {
        push_unique(&mut result, item);
    }
    result
}

fn is_valid_module_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_builder_keeps_order_and_dedups() {
        let manifest = ModuleManifest::new("app", "1.0")
            .requires(["b", "a", "b"])
            .optional(["x"])
            .conflicts(["legacy"]);

        assert_eq!(manifest.required_dependencies, vec!["b", "a"]);
        assert!(manifest.requires_module("a"));
        assert!(manifest.depends_on("x"));
        assert!(!manifest.requires_module("x"));
        assert!(manifest.conflicts_with("legacy"));
    }

    #[test]
    fn test_parse_yaml_with_aliases() {
        let manifest = ModuleManifest::parse_yaml(
            r#"
name: reports
version: "0.3-beta"
requires: [db, db, auth]
optional: [mailer]
conflicts: [old-reports]
provides: [report.render]
"#,
        )
        .unwrap();

        assert_eq!(manifest.required_dependencies, vec!["db", "auth"]);
        assert_eq!(manifest.optional_dependencies, vec!["mailer"]);
        assert!(manifest.provides.contains("report.render"));
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let manifest = ModuleManifest::parse_yaml("name: core\nversion: \"1\"\n").unwrap();
        assert!(manifest.required_dependencies.is_empty());
        assert!(manifest.conflicts.is_empty());
    }

    #[test]
    fn test_validate_self_reference() {
        let manifest = ModuleManifest::new("loop", "1.0").requires(["loop"]);
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidManifest(_)));
        assert!(err.to_string().contains("loop"));

        let manifest = ModuleManifest::new("x", "1.0").conflicts(["x"]);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let manifest = ModuleManifest::new("bad name!", "").optional([""]);
        let err = manifest.validate().unwrap_err().to_string();
        assert!(err.contains("格式无效"));
        assert!(err.contains("版本号不能为空"));
        assert!(err.contains("名称不能为空"));
    }

    #[test]
    fn test_parse_invalid_yaml_syntax() {
        let result = ModuleManifest::parse_yaml("name: [unclosed");
        assert!(matches!(result, Err(CoreError::Yaml(_))));
    }

    #[test]
    fn test_manifest_serialization() {
        let manifest = ModuleManifest::new("svc", "1.2.3").requires(["db"]);
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: ModuleManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }
}
