//! 配置加载集成测试
//!
//! 测试从文件加载配置并据此构建注册表和生命周期管理器的完整流程

use std::time::Duration;

use chips_modules::{CoreConfig, CoreError, LifecycleManager, ModuleRegistry, ModuleState};
use tempfile::TempDir;

/// 从 YAML 文件加载完整配置
#[tokio::test]
async fn test_load_yaml_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("chips-modules.yaml");
    tokio::fs::write(
        &path,
        r#"
logging:
  level: debug
  json_format: true
modules:
  module_dirs:
    - ./modules
    - /opt/modules
  manifest_cache_capacity: 32
lifecycle:
  lock_timeout_ms: 250
  max_commit_retries: 5
analysis:
  direct_dependent_weight: 2.0
  impact_radius_weight: 0.25
  hub_threshold: 4
"#,
    )
    .await
    .unwrap();

    let config = CoreConfig::from_file(&path).await.unwrap();

    assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    assert_eq!(config.modules.module_dirs.len(), 2);
    assert_eq!(config.modules.manifest_cache_capacity, 32);
    assert!(config.modules.registry_path.is_none());
    assert_eq!(config.lifecycle.lock_timeout_ms, 250);
    assert_eq!(config.lifecycle.max_commit_retries, 5);
    assert_eq!(config.analysis.hub_threshold, 4);

    let weights = config.analysis.weights();
    assert_eq!(weights.direct_dependent_weight, 2.0);
    assert_eq!(weights.impact_radius_weight, 0.25);
}

/// 从 JSON 文件加载部分配置，其余使用默认值
#[tokio::test]
async fn test_load_partial_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    tokio::fs::write(&path, r#"{ "lifecycle": { "lock_timeout_ms": 100 } }"#)
        .await
        .unwrap();

    let config = CoreConfig::from_file(&path).await.unwrap();

    assert_eq!(config.lifecycle.lock_timeout_ms, 100);
    assert_eq!(config.lifecycle.max_commit_retries, 3);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.analysis.hub_threshold, 3);
}

/// 配置文件不存在
#[tokio::test]
async fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = CoreConfig::from_file(temp_dir.path().join("missing.yaml")).await;

    assert!(matches!(result, Err(CoreError::ConfigLoadFailed(_))));
}

/// 配置值无效时加载失败
#[tokio::test]
async fn test_invalid_config_values() {
    let temp_dir = TempDir::new().unwrap();

    let cases = [
        ("level.yaml", "logging:\n  level: verbose\n", "logging.level"),
        ("timeout.yaml", "lifecycle:\n  lock_timeout_ms: 0\n", "lifecycle.lock_timeout_ms"),
        (
            "weight.yaml",
            "analysis:\n  impact_radius_weight: -1.0\n",
            "analysis.impact_radius_weight",
        ),
        ("file.yaml", "logging:\n  file_output: true\n", "logging.log_dir"),
    ];

    for (file, content, expected_key) in cases {
        let path = temp_dir.path().join(file);
        tokio::fs::write(&path, content).await.unwrap();

        match CoreConfig::from_file(&path).await {
            Err(CoreError::InvalidConfigValue { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("{} 应该校验失败，实际为 {:?}", file, other),
        }
    }
}

/// 语法错误的 YAML
#[tokio::test]
async fn test_malformed_yaml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.yaml");
    tokio::fs::write(&path, "logging: [unclosed").await.unwrap();

    let result = CoreConfig::from_file(&path).await;
    assert!(matches!(result, Err(CoreError::Yaml(_))));
}

/// 文件配置覆盖默认配置
#[tokio::test]
async fn test_merge_file_over_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("override.yaml");
    tokio::fs::write(
        &path,
        "logging:\n  level: warn\nmodules:\n  module_dirs: [extra]\n",
    )
    .await
    .unwrap();

    let mut config = CoreConfig::builder().module_dir("base").build();
    config.merge(CoreConfig::from_file(&path).await.unwrap());

    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.modules.module_dirs.len(), 2);
    assert_eq!(config.lifecycle.lock_timeout_ms, 5000);
}

/// 配置驱动的注册表：目录发现 + JSON 文件存储 + 锁超时
#[tokio::test]
async fn test_config_driven_registry() {
    let temp_dir = TempDir::new().unwrap();
    let modules_dir = temp_dir.path().join("modules");

    for (name, manifest) in [
        ("core", "name: core\nversion: 1.0.0\n"),
        ("auth", "name: auth\nversion: 1.0.0\nrequires: [core]\n"),
    ] {
        let dir = modules_dir.join(name);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("module.yaml"), manifest).await.unwrap();
    }

    let config = CoreConfig::builder()
        .module_dir(&modules_dir)
        .registry_path(temp_dir.path().join("registry.json"))
        .lock_timeout_ms(300)
        .hub_threshold(1)
        .build();

    let registry = ModuleRegistry::from_config(&config);
    assert_eq!(registry.lock_timeout(), Duration::from_millis(300));
    assert_eq!(registry.load().await.unwrap(), 0);

    let manager = LifecycleManager::from_config(registry, &config);
    manager.install("core", false).await.unwrap();
    manager.install("auth", false).await.unwrap();

    assert_eq!(manager.install_order().await.unwrap(), vec!["core", "auth"]);

    let hubs = manager.hubs(None).await.unwrap();
    assert_eq!(hubs.len(), 1);
    assert_eq!(hubs[0].name, "core");

    // 新的注册表实例从文件恢复状态
    let reloaded = ModuleRegistry::from_config(&config);
    assert_eq!(reloaded.load().await.unwrap(), 2);
    assert_eq!(
        reloaded.get_state("auth").await.unwrap(),
        Some(ModuleState::Installed)
    );
}
