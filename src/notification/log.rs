//! 通知日志 - 存在单个 key 下的有序记录序列
//!
//! 每次追加都是完整的读-改-写：读出整个数组、追加一条、整体写回。
//! `AppendMode::Unsynchronized` 不做任何互斥，两个并发追加可能互相覆盖
//! （后写入者胜出，另一条丢失）；`AppendMode::Serialized` 让所有追加
//! 排队经过同一把异步锁。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::record::NotificationRecord;
use crate::storage::{non_empty, KeyValueStore, MESSAGES_KEY};

/// 追加模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendMode {
    /// 无互斥的读-改-写，并发追加可能丢失
    #[default]
    Unsynchronized,
    /// 所有追加串行执行
    Serialized,
}

impl std::str::FromStr for AppendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unsynchronized" | "unsync" => Ok(AppendMode::Unsynchronized),
            "serialized" | "serial" => Ok(AppendMode::Serialized),
            other => Err(format!("unknown append mode: {}", other)),
        }
    }
}

/// 持久化的通知日志
pub struct NotificationLog<S> {
    store: Arc<S>,
    key: String,
    mode: AppendMode,
    append_lock: Mutex<()>,
}

impl<S: KeyValueStore> NotificationLog<S> {
    /// 使用默认 key（`messages`）
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, MESSAGES_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            mode: AppendMode::default(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn with_mode(mut self, mode: AppendMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> AppendMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// 追加一条记录
    ///
    /// 读取时缺失或无法解析的旧值都按空序列处理（无法解析的旧值会被覆盖）。
    pub async fn append(&self, record: NotificationRecord) -> Result<()> {
        let _guard = match self.mode {
            AppendMode::Serialized => Some(self.append_lock.lock().await),
            AppendMode::Unsynchronized => None,
        };

        let mut records = match self.load().await? {
            Some(raw) => parse_records(&raw).unwrap_or_else(|e| {
                warn!(key = %self.key, error = %e, "Stored log is unreadable, starting a new one");
                Vec::new()
            }),
            None => Vec::new(),
        };

        records.push(record);
        let content = serde_json::to_string(&records)?;
        self.store.set_item(&self.key, &content).await?;

        debug!(key = %self.key, count = records.len(), "Notification appended");
        Ok(())
    }

    /// 读取完整日志（按追加顺序）
    ///
    /// key 不存在时返回空序列；内容无法解析时返回错误。
    pub async fn read(&self) -> Result<Vec<NotificationRecord>> {
        match self.load().await? {
            Some(raw) => parse_records(&raw)
                .with_context(|| format!("failed to parse notification log '{}'", self.key)),
            None => Ok(Vec::new()),
        }
    }

    /// 读取最近 N 条
    pub async fn read_recent(&self, n: usize) -> Result<Vec<NotificationRecord>> {
        let mut records = self.read().await?;
        let start = records.len().saturating_sub(n);
        Ok(records.split_off(start))
    }

    /// 删除整个日志
    pub async fn clear(&self) -> Result<()> {
        self.store.remove_item(&self.key).await?;
        info!(key = %self.key, "Notification log cleared");
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        Ok(non_empty(self.store.get_item(&self.key).await?))
    }
}

/// `null` 条目（data-only 消息在旧格式中的写法）读作空记录
fn parse_records(raw: &str) -> serde_json::Result<Vec<NotificationRecord>> {
    let entries: Vec<Option<NotificationRecord>> = serde_json::from_str(raw)?;
    Ok(entries.into_iter().map(Option::unwrap_or_default).collect())
}
