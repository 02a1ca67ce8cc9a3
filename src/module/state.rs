//! 模块状态定义
//!
//! 定义模块生命周期的状态集合以及状态转换的前置条件判断。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 模块状态
///
/// 状态只能由 [`LifecycleManager`](crate::module::lifecycle::LifecycleManager) 修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// 未安装（仅被发现）
    NotInstalled,
    /// 已安装
    Installed,
    /// 已启用
    Enabled,
    /// 已禁用
    Disabled,
    /// 转换过程中失败
    Failed,
    /// 正在更新（仅在更新操作期间短暂存在）
    Updating,
}

impl Default for ModuleState {
    fn default() -> Self {
        ModuleState::NotInstalled
    }
}

impl ModuleState {
    /// 是否可以启用
    pub fn can_enable(&self) -> bool {
        matches!(self, ModuleState::Installed | ModuleState::Disabled)
    }

    /// 是否可以禁用
    pub fn can_disable(&self) -> bool {
        matches!(self, ModuleState::Enabled)
    }

    /// 是否可以移除
    pub fn can_remove(&self) -> bool {
        matches!(
            self,
            ModuleState::Installed | ModuleState::Disabled | ModuleState::Failed
        )
    }

    /// 是否可以更新
    pub fn can_update(&self) -> bool {
        matches!(
            self,
            ModuleState::Installed | ModuleState::Enabled | ModuleState::Disabled
        )
    }

    /// 是否处于已安装的某个状态
    pub fn is_installed(&self) -> bool {
        !matches!(self, ModuleState::NotInstalled)
    }

    /// 状态名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::NotInstalled => "not_installed",
            ModuleState::Installed => "installed",
            ModuleState::Enabled => "enabled",
            ModuleState::Disabled => "disabled",
            ModuleState::Failed => "failed",
            ModuleState::Updating => "updating",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
