//! 本地通知调度边界 - 渠道、角标、权限、分类和本地通知请求

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::listener::Subscription;
use super::messaging::PermissionOptions;
use crate::notification::LocalNotification;

/// 通知渠道（Android）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelConfig {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_description: Option<String>,
    pub sound_name: Option<String>,
    /// 0-5，4 为 high
    pub importance: u8,
    pub vibrate: bool,
}

impl ChannelConfig {
    pub fn new(channel_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            ..Default::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_id: "test-channel".to_string(),
            channel_name: "Test channel".to_string(),
            channel_description: None,
            sound_name: None,
            importance: 4,
            vibrate: true,
        }
    }
}

/// 调度器初始化选项
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigureOptions {
    /// 初始化时就请求权限（iOS）
    pub request_permissions: bool,
    pub permissions: PermissionOptions,
    pub pop_initial_notification: bool,
}

/// 通知分类里的动作按钮（iOS）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAction {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub foreground: bool,
    #[serde(default)]
    pub destructive: bool,
    /// 带输入框时的按钮文字
    #[serde(default)]
    pub text_input: Option<String>,
}

/// 通知分类（iOS）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCategory {
    pub id: String,
    pub actions: Vec<CategoryAction>,
}

impl NotificationCategory {
    /// 演示用分类：打开 / 破坏性动作 / 文本输入
    pub fn sample() -> Self {
        Self {
            id: "test-repeat".to_string(),
            actions: vec![
                CategoryAction {
                    id: "open".to_string(),
                    title: "ABRIR".to_string(),
                    foreground: true,
                    destructive: false,
                    text_input: None,
                },
                CategoryAction {
                    id: "ignore".to_string(),
                    title: "Desruptive".to_string(),
                    foreground: true,
                    destructive: true,
                    text_input: None,
                },
                CategoryAction {
                    id: "text".to_string(),
                    title: "Text Input".to_string(),
                    foreground: true,
                    destructive: false,
                    text_input: Some("Send".to_string()),
                },
            ],
        }
    }
}

/// 本地通知调度器
pub trait LocalNotificationScheduler: Send + Sync + 'static {
    fn configure(&self, options: ConfigureOptions) -> Result<()>;

    /// 创建渠道，已存在时返回 false
    fn create_channel(&self, channel: ChannelConfig) -> Result<bool>;

    fn get_channels(&self) -> Result<Vec<String>>;

    fn delete_channel(&self, channel_id: &str) -> Result<()>;

    /// 添加通知请求，`fire_date` 为空时立即触发；返回通知 id
    ///
    /// 同 id 的待触发请求会被替换；`repeats` 的请求每次触发后重新排期。
    fn add_notification_request(&self, notification: LocalNotification) -> Result<String>;

    fn pending_notification_requests(&self) -> Result<Vec<LocalNotification>>;

    fn remove_pending_notification_requests(&self, ids: &[&str]) -> Result<()>;

    fn remove_all_pending_notification_requests(&self) -> Result<()>;

    fn delivered_notifications(&self) -> Result<Vec<LocalNotification>>;

    fn remove_delivered_notifications(&self, ids: &[&str]) -> Result<()>;

    fn remove_all_delivered_notifications(&self) -> Result<()>;

    fn set_application_icon_badge_number(&self, number: u32) -> Result<()>;

    fn application_icon_badge_number(&self) -> Result<u32>;

    fn request_permissions(&self, options: PermissionOptions) -> Result<PermissionOptions>;

    fn check_permissions(&self) -> Result<PermissionOptions>;

    /// 注销远程通知并清除已授予的权限（iOS）
    fn abandon_permissions(&self) -> Result<()>;

    fn set_notification_categories(&self, categories: Vec<NotificationCategory>) -> Result<()>;

    /// 订阅本地通知触发事件
    fn on_notification<F>(&self, listener: F) -> Subscription
    where
        F: Fn(LocalNotification) + Send + Sync + 'static;
}
