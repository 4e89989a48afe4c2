//! 设备 token 存储

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::storage::{non_empty, KeyValueStore, FCM_TOKEN_KEY};

/// 当前消息注册 token 的持久化
pub struct TokenStore<S> {
    store: Arc<S>,
}

impl<S> Clone for TokenStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: KeyValueStore> TokenStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 保存 token（总是覆盖旧值）
    pub async fn save(&self, token: &str) -> Result<()> {
        let previous = self.current().await?;
        if previous.as_deref() == Some(token) {
            debug!("Device token unchanged, rewriting");
        }
        self.store.set_item(FCM_TOKEN_KEY, token).await?;
        info!(replaced = previous.is_some(), "Device token saved");
        Ok(())
    }

    /// 当前保存的 token
    pub async fn current(&self) -> Result<Option<String>> {
        Ok(non_empty(self.store.get_item(FCM_TOKEN_KEY).await?))
    }

    pub async fn remove(&self) -> Result<()> {
        self.store.remove_item(FCM_TOKEN_KEY).await?;
        info!("Device token removed");
        Ok(())
    }
}
