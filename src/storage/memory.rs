//! 内存存储 - 测试和 simulate 使用

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use super::KeyValueStore;

/// 进程内键值存储
///
/// 每个操作在完成读/写之后都会让出一次执行权（可选再加上固定延迟），
/// 这样并发的读-改-写周期会稳定地交错。
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
    latency: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次操作额外等待的时间（模拟慢速存储）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 预置一个值
    pub fn with_item(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
        self
    }

    /// 当前 key 数量
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn suspend(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        tokio::task::yield_now().await;
    }
}

impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        self.suspend().await;
        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        self.suspend().await;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        self.suspend().await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.items.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.suspend().await;
        Ok(())
    }
}
