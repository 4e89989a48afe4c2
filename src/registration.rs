//! 注册与 token 生命周期 - 权限请求、token 获取/刷新/删除、topic、设备注册

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Platform;
use crate::notification::TokenStore;
use crate::storage::KeyValueStore;
use crate::transport::{AuthorizationStatus, MessagingTransport, PermissionOptions};

/// token 服务
pub struct TokenService<T, S> {
    transport: Arc<T>,
    tokens: TokenStore<S>,
    platform: Platform,
}

impl<T, S> Clone for TokenService<T, S> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            tokens: self.tokens.clone(),
            platform: self.platform,
        }
    }
}

impl<T: MessagingTransport, S: KeyValueStore> TokenService<T, S> {
    pub fn new(transport: Arc<T>, store: Arc<S>, platform: Platform) -> Self {
        Self {
            transport,
            tokens: TokenStore::new(store),
            platform,
        }
    }

    pub fn tokens(&self) -> &TokenStore<S> {
        &self.tokens
    }

    /// 请求通知权限；授权（含临时授权）后获取并保存 token
    ///
    /// 返回保存的 token，未授权时返回 None。
    pub async fn request_user_permission(
        &self,
        options: PermissionOptions,
    ) -> Result<Option<String>> {
        let status = self
            .transport
            .request_permission(options)
            .await
            .map_err(|e| anyhow!("failed to request notification permission: {}", e))?;

        if !status.is_enabled() {
            warn!(?status, "Notification permission not granted");
            return Ok(None);
        }

        self.fetch_token().await
    }

    pub async fn get_permissions(&self) -> Result<AuthorizationStatus> {
        self.transport.has_permission().await
    }

    /// 获取 token 并保存
    pub async fn fetch_token(&self) -> Result<Option<String>> {
        let token = self
            .transport
            .get_token()
            .await
            .map_err(|e| anyhow!("failed to obtain FCM token: {}", e))?;

        if let Some(token) = &token {
            self.tokens.save(token).await?;
        }
        Ok(token)
    }

    /// iOS 上获取 APNs token 并保存
    pub async fn save_apns_token(&self) -> Result<Option<String>> {
        let token = self
            .transport
            .get_apns_token()
            .await
            .map_err(|e| anyhow!("failed to obtain APNs token: {}", e))?;

        if let Some(token) = &token {
            self.tokens.save(token).await?;
        }
        Ok(token)
    }

    /// token 刷新回调
    pub async fn refresh(&self, token: &str) -> Result<()> {
        info!("Messaging token refreshed");
        self.tokens.save(token).await
    }

    /// 删除 token：先让消息服务失效，再删本地保存的值
    pub async fn delete_token(&self) -> Result<()> {
        self.transport.delete_token().await?;
        self.tokens.remove().await
    }

    pub async fn subscribe_to_topic(&self, topic: &str) -> Result<()> {
        self.transport.subscribe_to_topic(topic).await?;
        info!(topic, "Subscribed to topic");
        Ok(())
    }

    pub async fn unsubscribe_from_topic(&self, topic: &str) -> Result<()> {
        self.transport.unsubscribe_from_topic(topic).await?;
        info!(topic, "Unsubscribed from topic");
        Ok(())
    }

    /// iOS 显式注册远程消息；已注册或 Android 上直接返回
    pub async fn register_device(&self) -> Result<()> {
        if self.platform != Platform::Ios {
            return Ok(());
        }
        if self.transport.is_device_registered_for_remote_messages() {
            debug!("Device already registered for remote messages");
            return Ok(());
        }
        self.transport.register_device_for_remote_messages().await?;
        info!("Device registered for remote messages");
        Ok(())
    }

    /// iOS 注销远程消息；未注册时直接返回
    pub async fn unregister_device(&self) -> Result<()> {
        if !self.transport.is_device_registered_for_remote_messages() {
            return Ok(());
        }
        self.transport.unregister_device_for_remote_messages().await?;
        info!("Device unregistered from remote messages");
        Ok(())
    }

    pub async fn set_auto_init_enabled(&self, enabled: bool) -> Result<()> {
        self.transport.set_auto_init_enabled(enabled).await
    }

    pub async fn is_headless(&self) -> Result<bool> {
        self.transport.get_is_headless().await
    }
}
