//! 生命周期事件
//!
//! 生命周期管理器在每次成功的状态转换后发布事件。发布失败只记录日志，不影响转换结果。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::utils::{CoreError, Result};

/// 事件类型常量
pub mod event_types {
    /// 模块已安装
    pub const MODULE_INSTALLED: &str = "module.installed";
    /// 模块已启用
    pub const MODULE_ENABLED: &str = "module.enabled";
    /// 模块已禁用
    pub const MODULE_DISABLED: &str = "module.disabled";
    /// 模块已移除
    pub const MODULE_REMOVED: &str = "module.removed";
    /// 模块已更新
    pub const MODULE_UPDATED: &str = "module.updated";
    /// 模块更新失败（已回滚）
    pub const MODULE_UPDATE_FAILED: &str = "module.update_failed";
}

/// 事件发布者
///
/// 由宿主应用提供实现，例如转发到消息总线。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// `payload` 是一个 JSON 对象，至少包含 `module` 字段。
    async fn publish(&self, event_name: &str, payload: Map<String, Value>) -> Result<()>;
}

/// 丢弃所有事件的发布者
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event_name: &str, _payload: Map<String, Value>) -> Result<()> {
        tracing::trace!(event_type = event_name, "事件已丢弃");
        Ok(())
    }
}

/// 生命周期事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// 事件唯一标识
    pub event_id: String,

    /// 事件类型（如 module.enabled）
    pub event_type: String,

    /// 相关模块名
    pub module: String,

    /// 事件数据
    #[serde(default)]
    pub data: Value,

    /// 事件时间戳
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    /// 创建新事件
    pub fn new(event_type: impl Into<String>, module: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            module: module.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// 基于 tokio 广播通道的事件发布者
///
/// 没有订阅者时发布不会失败，事件被直接丢弃。
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastPublisher {
    /// 创建指定缓冲容量的发布者
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event_name: &str, payload: Map<String, Value>) -> Result<()> {
        let module = payload
            .get("module")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Internal(format!("事件 {} 缺少 module 字段", event_name)))?
            .to_string();

        let event = LifecycleEvent::new(event_name, module, Value::Object(payload));
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|e| CoreError::Internal(format!("事件发送失败: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(module: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("module".to_string(), json!(module));
        map
    }

    #[tokio::test]
    async fn test_broadcast_publisher_delivers_event() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();

        publisher
            .publish(event_types::MODULE_ENABLED, payload("auth"))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "module.enabled");
        assert_eq!(event.module, "auth");
        assert_eq!(event.data["module"], "auth");
        assert!(!event.event_id.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let publisher = BroadcastPublisher::default();
        assert_eq!(publisher.subscriber_count(), 0);
        assert!(publisher
            .publish(event_types::MODULE_REMOVED, payload("x"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_requires_module_field() {
        let publisher = BroadcastPublisher::default();
        let _rx = publisher.subscribe();
        let result = publisher.publish("module.installed", Map::new()).await;
        assert!(matches!(result, Err(CoreError::Internal(_))));
    }

    #[tokio::test]
    async fn test_noop_publisher() {
        assert!(NoopPublisher
            .publish(event_types::MODULE_INSTALLED, payload("a"))
            .await
            .is_ok());
    }

    #[test]
    fn test_event_serialization() {
        let event = LifecycleEvent::new("module.updated", "db", json!({"version": "2"}));
        let json = serde_json::to_string(&event).unwrap();
        let parsed: LifecycleEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_id, event.event_id);
        assert_eq!(parsed.data["version"], "2");
    }
}
