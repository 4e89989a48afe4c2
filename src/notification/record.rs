//! 通知记录 - 日志中保存的统一结构

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 通知来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSource {
    /// App 在前台时收到的远程消息
    ForegroundPush,
    /// App 在后台 / 未启动时收到的远程消息
    BackgroundPush,
    /// 用户点击通知打开了 App
    OpenedFromPush,
    /// 本地通知触发
    LocalDelivery,
}

impl NotificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSource::ForegroundPush => "foreground",
            NotificationSource::BackgroundPush => "background",
            NotificationSource::OpenedFromPush => "opened",
            NotificationSource::LocalDelivery => "local",
        }
    }
}

impl fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationSource {
    type Err = String;

    /// Accepts the short CLI names as well as the serialized snake_case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "foreground" | "foreground_push" => Ok(NotificationSource::ForegroundPush),
            "background" | "background_push" => Ok(NotificationSource::BackgroundPush),
            "opened" | "opened_from_push" => Ok(NotificationSource::OpenedFromPush),
            "local" | "local_delivery" => Ok(NotificationSource::LocalDelivery),
            other => Err(format!("unknown notification source: {}", other)),
        }
    }
}

/// 通知记录
///
/// `source` 缺失表示旧格式记录（只有 title/body）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// 来源
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<NotificationSource>,
    /// 标题（静默推送没有）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// 正文
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl NotificationRecord {
    pub fn new(source: NotificationSource) -> Self {
        Self {
            source: Some(source),
            title: None,
            body: None,
        }
    }

    /// 不带来源标签的记录
    pub fn untagged(title: Option<String>, body: Option<String>) -> Self {
        Self {
            source: None,
            title,
            body,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 静默（data-only）推送：没有任何可显示内容
    pub fn is_silent(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }
}
