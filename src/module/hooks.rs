//! 生命周期钩子
//!
//! 宿主应用可以在状态转换时执行自己的逻辑（例如数据库迁移）。
//! 核心本身从不执行模块代码，只在转换提交前调用这些钩子。

use async_trait::async_trait;

use crate::module::manifest::ModuleManifest;

/// 生命周期钩子
///
/// 所有方法默认什么都不做。钩子返回错误时，转换不会提交：
/// 模块进入 `Failed` 状态（更新操作则回滚到更新前的条目），调用方收到 `HookFailed`。
#[async_trait]
pub trait ModuleHooks: Send + Sync {
    /// 安装前调用
    async fn on_install(&self, _manifest: &ModuleManifest) -> anyhow::Result<()> {
        Ok(())
    }

    /// 启用前调用
    async fn on_enable(&self, _manifest: &ModuleManifest) -> anyhow::Result<()> {
        Ok(())
    }

    /// 禁用前调用
    async fn on_disable(&self, _manifest: &ModuleManifest) -> anyhow::Result<()> {
        Ok(())
    }

    /// 移除前调用
    async fn on_remove(&self, _manifest: &ModuleManifest) -> anyhow::Result<()> {
        Ok(())
    }

    /// 更新前调用
    async fn on_update(
        &self,
        _old: &ModuleManifest,
        _new: &ModuleManifest,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 不做任何事情的钩子
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl ModuleHooks for NoopHooks {}
