//! 回环消息服务 - 进程内模拟推送 SDK
//!
//! 模拟 App 前台/后台/退出三种状态、token 签发与刷新、后台处理的完成时限、
//! 点击通知打开 App，以及上行消息（发送成功后回环投递给自己）。
//!
//! 超过后台时限时只丢弃处理器的 future。已经交给阻塞线程的存储写入
//! （例如 `FileStore`）仍会完成，所以 deliver 报告超时的那条记录可能已经落盘。

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::listener::{ListenerRegistry, Subscription};
use super::messaging::{
    AuthorizationStatus, BackgroundMessageHandler, MessagingEvent, MessagingTransport,
    PermissionOptions,
};
use crate::config::Platform;
use crate::notification::RemoteMessage;

/// 默认后台处理时限
pub const DEFAULT_BACKGROUND_DEADLINE: Duration = Duration::from_secs(30);

/// App 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Foreground,
    Background,
    /// 进程未运行，消息会以 headless 方式启动
    Quit,
}

struct LoopbackState {
    app_state: AppState,
    authorization: AuthorizationStatus,
    grant: AuthorizationStatus,
    token: Option<String>,
    registered: bool,
    auto_init: bool,
    topics: BTreeSet<String>,
    initial_notification: Option<RemoteMessage>,
    headless: bool,
    token_failure: Option<String>,
    send_failure: Option<String>,
}

/// 进程内消息服务
pub struct LoopbackMessaging {
    platform: Platform,
    background_deadline: Duration,
    state: Mutex<LoopbackState>,
    events: ListenerRegistry<MessagingEvent>,
    background_handler: Arc<Mutex<Option<(u64, BackgroundMessageHandler)>>>,
    sequence: AtomicU64,
}

impl LoopbackMessaging {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            background_deadline: DEFAULT_BACKGROUND_DEADLINE,
            state: Mutex::new(LoopbackState {
                app_state: AppState::Foreground,
                authorization: AuthorizationStatus::NotDetermined,
                grant: AuthorizationStatus::Authorized,
                token: None,
                // Android 不需要显式注册
                registered: platform == Platform::Android,
                auto_init: true,
                topics: BTreeSet::new(),
                initial_notification: None,
                headless: false,
                token_failure: None,
                send_failure: None,
            }),
            events: ListenerRegistry::new(),
            background_handler: Arc::new(Mutex::new(None)),
            sequence: AtomicU64::new(0),
        }
    }

    /// 后台处理器必须在该时限内完成，否则进程被“杀掉”（future 被丢弃）
    pub fn with_background_deadline(mut self, deadline: Duration) -> Self {
        self.background_deadline = deadline;
        self
    }

    /// 用户对权限弹窗的选择
    pub fn with_grant(self, grant: AuthorizationStatus) -> Self {
        self.lock_state().grant = grant;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn app_state(&self) -> AppState {
        self.lock_state().app_state
    }

    pub fn set_app_state(&self, app_state: AppState) {
        let mut state = self.lock_state();
        if app_state != AppState::Quit {
            state.headless = false;
        }
        state.app_state = app_state;
        debug!(?app_state, "App state changed");
    }

    /// 之后的 token 请求都失败
    pub fn fail_token_requests(&self, error: impl Into<String>) {
        self.lock_state().token_failure = Some(error.into());
    }

    /// 下一次上行发送失败
    pub fn fail_next_send(&self, error: impl Into<String>) {
        self.lock_state().send_failure = Some(error.into());
    }

    /// 当前已订阅的 topic
    pub fn topics(&self) -> Vec<String> {
        self.lock_state().topics.iter().cloned().collect()
    }

    pub fn current_token(&self) -> Option<String> {
        self.lock_state().token.clone()
    }

    /// 签发新 token 并广播 TokenRefresh
    pub fn refresh_token(&self) -> String {
        let token = self.issue_token();
        self.lock_state().token = Some(token.clone());
        info!("Messaging token rotated");
        self.events.emit(MessagingEvent::TokenRefresh(token.clone()));
        token
    }

    /// 服务端投递一条消息
    ///
    /// 前台：广播 `Message`；后台/退出：在时限内等待后台处理器完成。
    pub async fn deliver(&self, message: RemoteMessage) -> Result<()> {
        let message = self.ensure_message_id(message);
        let app_state = {
            let mut state = self.lock_state();
            if state.app_state == AppState::Quit {
                state.headless = true;
            }
            state.app_state
        };

        match app_state {
            AppState::Foreground => {
                let notified = self.events.emit(MessagingEvent::Message(message));
                debug!(listeners = notified, "Foreground message dispatched");
                Ok(())
            }
            AppState::Background | AppState::Quit => self.run_background_handler(message).await,
        }
    }

    /// 用户点击了系统托盘里的通知
    pub fn open_notification(&self, message: RemoteMessage) {
        let message = self.ensure_message_id(message);
        let previous = {
            let mut state = self.lock_state();
            let previous = state.app_state;
            if previous == AppState::Quit {
                state.initial_notification = Some(message.clone());
            }
            state.app_state = AppState::Foreground;
            state.headless = false;
            previous
        };

        match previous {
            AppState::Background => {
                self.events
                    .emit(MessagingEvent::NotificationOpenedApp(message));
            }
            AppState::Quit => {
                info!("App launched from quit state by notification");
            }
            AppState::Foreground => {
                debug!("Notification opened while already in foreground");
            }
        }
    }

    /// 服务端丢弃了待投递消息，返回收到事件的监听器数量
    pub fn delete_messages(&self) -> usize {
        self.events.emit(MessagingEvent::DeletedMessages)
    }

    async fn run_background_handler(&self, message: RemoteMessage) -> Result<()> {
        let handler = self
            .background_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, handler)| handler.clone());

        let Some(handler) = handler else {
            warn!(message_id = ?message.message_id, "No background message handler registered");
            return Ok(());
        };

        let deadline = self.background_deadline;
        match tokio::time::timeout(deadline, handler(message)).await {
            Ok(result) => result.context("background message handler failed"),
            Err(_) => {
                warn!(?deadline, "Background handler missed its deadline, work discarded");
                bail!("background message handler did not complete within {:?}", deadline)
            }
        }
    }

    fn ensure_message_id(&self, mut message: RemoteMessage) -> RemoteMessage {
        if message.message_id.is_none() {
            let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            message.message_id = Some(format!("0:{}%loopback-{}", Utc::now().timestamp_millis(), seq));
        }
        if message.sent_time.is_none() {
            message.sent_time = Some(Utc::now().timestamp_millis());
        }
        message
    }

    fn issue_token(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("loopback:{:x}-{}", Utc::now().timestamp_millis(), seq)
    }

    fn lock_state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MessagingTransport for LoopbackMessaging {
    async fn request_permission(&self, options: PermissionOptions) -> Result<AuthorizationStatus> {
        let mut state = self.lock_state();
        state.authorization = state.grant;
        info!(?options, status = ?state.authorization, "Notification permission requested");
        Ok(state.authorization)
    }

    async fn has_permission(&self) -> Result<AuthorizationStatus> {
        Ok(self.lock_state().authorization)
    }

    async fn get_token(&self) -> Result<Option<String>> {
        {
            let state = self.lock_state();
            if let Some(error) = &state.token_failure {
                return Err(anyhow!("{}", error));
            }
            if !state.registered {
                bail!("device is not registered for remote messages");
            }
            if let Some(token) = &state.token {
                return Ok(Some(token.clone()));
            }
        }

        let token = self.issue_token();
        self.lock_state().token = Some(token.clone());
        Ok(Some(token))
    }

    async fn delete_token(&self) -> Result<()> {
        self.lock_state().token = None;
        Ok(())
    }

    async fn get_apns_token(&self) -> Result<Option<String>> {
        if self.platform != Platform::Ios {
            return Ok(None);
        }
        let state = self.lock_state();
        Ok(state
            .registered
            .then(|| format!("apns-{:016x}", self.sequence.load(Ordering::SeqCst))))
    }

    async fn subscribe_to_topic(&self, topic: &str) -> Result<()> {
        validate_topic(topic)?;
        self.lock_state().topics.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe_from_topic(&self, topic: &str) -> Result<()> {
        validate_topic(topic)?;
        self.lock_state().topics.remove(topic);
        Ok(())
    }

    fn is_device_registered_for_remote_messages(&self) -> bool {
        self.lock_state().registered
    }

    async fn register_device_for_remote_messages(&self) -> Result<()> {
        self.lock_state().registered = true;
        Ok(())
    }

    async fn unregister_device_for_remote_messages(&self) -> Result<()> {
        if self.platform == Platform::Ios {
            self.lock_state().registered = false;
        }
        Ok(())
    }

    fn is_auto_init_enabled(&self) -> bool {
        self.lock_state().auto_init
    }

    async fn set_auto_init_enabled(&self, enabled: bool) -> Result<()> {
        self.lock_state().auto_init = enabled;
        Ok(())
    }

    async fn send_message(&self, message: RemoteMessage) -> Result<()> {
        let message = self.ensure_message_id(message);
        let message_id = message.message_id.clone().unwrap_or_default();

        let failure = self.lock_state().send_failure.take();
        if let Some(error) = failure {
            self.events
                .emit(MessagingEvent::SendError { message_id, error });
            return Ok(());
        }

        self.events.emit(MessagingEvent::MessageSent {
            message_id: message_id.clone(),
        });
        self.deliver(message).await
    }

    async fn get_is_headless(&self) -> Result<bool> {
        Ok(self.lock_state().headless)
    }

    async fn get_initial_notification(&self) -> Result<Option<RemoteMessage>> {
        Ok(self.lock_state().initial_notification.clone())
    }

    fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(MessagingEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    fn set_background_message_handler(&self, handler: BackgroundMessageHandler) -> Subscription {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        *self
            .background_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some((id, handler));

        let slot = Arc::downgrade(&self.background_handler);
        Subscription::new(move || {
            if let Some(slot) = slot.upgrade() {
                let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
                // 只清除自己注册的处理器
                if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                    *slot = None;
                }
            }
        })
    }
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() || topic.contains('/') {
        bail!("invalid topic name: '{}'", topic);
    }
    Ok(())
}
