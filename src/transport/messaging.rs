//! 消息服务边界 - 远程推送 SDK 的调用面和回调

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::listener::Subscription;
use crate::notification::RemoteMessage;

/// 授权状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
    /// iOS 临时授权（静默投递）
    Provisional,
}

impl AuthorizationStatus {
    /// 是否可以接收通知
    pub fn is_enabled(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Authorized | AuthorizationStatus::Provisional
        )
    }
}

/// 请求的通知权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionOptions {
    pub alert: bool,
    pub badge: bool,
    pub sound: bool,
    pub critical: bool,
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self {
            alert: true,
            badge: true,
            sound: true,
            critical: false,
        }
    }
}

/// 消息服务推送给 App 的事件
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingEvent {
    /// 前台收到消息
    Message(RemoteMessage),
    /// token 刷新
    TokenRefresh(String),
    /// 用户点击通知把 App 从后台打开
    NotificationOpenedApp(RemoteMessage),
    /// 上行消息已送达服务端
    MessageSent { message_id: String },
    /// 上行消息发送失败
    SendError { message_id: String, error: String },
    /// 服务端删除了待投递消息
    DeletedMessages,
}

/// 后台消息处理器返回的 future
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// 后台消息处理器：future 完成即表示后台处理结束
pub type BackgroundMessageHandler = Arc<dyn Fn(RemoteMessage) -> HandlerFuture + Send + Sync>;

/// 远程消息服务
pub trait MessagingTransport: Send + Sync + 'static {
    fn request_permission(
        &self,
        options: PermissionOptions,
    ) -> impl Future<Output = Result<AuthorizationStatus>> + Send;

    fn has_permission(&self) -> impl Future<Output = Result<AuthorizationStatus>> + Send;

    fn get_token(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    fn delete_token(&self) -> impl Future<Output = Result<()>> + Send;

    /// iOS 的 APNs token（Android 上为 None）
    fn get_apns_token(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    fn subscribe_to_topic(&self, topic: &str) -> impl Future<Output = Result<()>> + Send;

    fn unsubscribe_from_topic(&self, topic: &str) -> impl Future<Output = Result<()>> + Send;

    fn is_device_registered_for_remote_messages(&self) -> bool;

    fn register_device_for_remote_messages(&self) -> impl Future<Output = Result<()>> + Send;

    fn unregister_device_for_remote_messages(&self) -> impl Future<Output = Result<()>> + Send;

    fn is_auto_init_enabled(&self) -> bool;

    fn set_auto_init_enabled(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send;

    /// 发送上行消息
    fn send_message(&self, message: RemoteMessage) -> impl Future<Output = Result<()>> + Send;

    /// App 是否由后台消息无界面启动
    fn get_is_headless(&self) -> impl Future<Output = Result<bool>> + Send;

    /// 导致 App 从退出状态启动的通知
    fn get_initial_notification(
        &self,
    ) -> impl Future<Output = Result<Option<RemoteMessage>>> + Send;

    /// 订阅消息服务事件
    fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(MessagingEvent) + Send + Sync + 'static;

    /// 设置后台消息处理器（同一时间只有一个）
    fn set_background_message_handler(&self, handler: BackgroundMessageHandler) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_enabled() {
        assert!(AuthorizationStatus::Authorized.is_enabled());
        assert!(AuthorizationStatus::Provisional.is_enabled());
        assert!(!AuthorizationStatus::Denied.is_enabled());
        assert!(!AuthorizationStatus::NotDetermined.is_enabled());
    }

    #[test]
    fn test_permission_options_defaults() {
        let options: PermissionOptions = serde_json::from_str(r#"{"critical":true}"#).unwrap();
        assert!(options.alert && options.badge && options.sound && options.critical);
    }
}
