//! 触发适配器 - 把各来源的通知归一化后追加到日志

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::log::NotificationLog;
use super::payload::{LocalNotification, RemoteMessage};
use super::record::NotificationSource;
use crate::storage::KeyValueStore;

/// 通知摄入器
///
/// 每个入口各自做一次完整的 `append`，彼此之间不协调。
pub struct NotificationIngestor<S> {
    log: Arc<NotificationLog<S>>,
}

impl<S> Clone for NotificationIngestor<S> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
        }
    }
}

impl<S: KeyValueStore> NotificationIngestor<S> {
    pub fn new(log: Arc<NotificationLog<S>>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<NotificationLog<S>> {
        &self.log
    }

    /// App 在前台时收到远程消息
    pub async fn on_foreground_message(&self, message: &RemoteMessage) -> Result<()> {
        self.ingest_remote(message, NotificationSource::ForegroundPush)
            .await
    }

    /// App 在后台时收到远程消息
    ///
    /// 返回即表示处理完成；调用方（消息服务）据此判断后台任务结束。
    pub async fn on_background_message(&self, message: &RemoteMessage) -> Result<()> {
        self.ingest_remote(message, NotificationSource::BackgroundPush)
            .await
    }

    /// 用户点击通知打开了 App
    pub async fn on_notification_opened_app(&self, message: &RemoteMessage) -> Result<()> {
        self.ingest_remote(message, NotificationSource::OpenedFromPush)
            .await
    }

    /// 本地通知触发
    pub async fn on_local_notification(&self, notification: &LocalNotification) -> Result<()> {
        info!(
            source = %NotificationSource::LocalDelivery,
            id = ?notification.id,
            "Local notification delivered"
        );
        self.log.append(notification.to_record()).await
    }

    async fn ingest_remote(&self, message: &RemoteMessage, source: NotificationSource) -> Result<()> {
        info!(
            source = %source,
            message_id = ?message.message_id,
            silent = message.notification.is_none(),
            "Remote message received"
        );
        self.log.append(message.to_record(source)).await
    }
}
