//! 内存调度器 - 用 tokio 定时器触发本地通知

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::listener::{ListenerRegistry, Subscription};
use super::messaging::PermissionOptions;
use super::scheduler::{
    ChannelConfig, ConfigureOptions, LocalNotificationScheduler, NotificationCategory,
};
use crate::notification::LocalNotification;

type SharedState = Arc<Mutex<SchedulerState>>;
type Events = Arc<ListenerRegistry<LocalNotification>>;

struct PendingRequest {
    notification: LocalNotification,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    configured: Option<ConfigureOptions>,
    channels: BTreeMap<String, ChannelConfig>,
    pending: BTreeMap<String, PendingRequest>,
    delivered: Vec<LocalNotification>,
    badge: u32,
    permissions: Option<PermissionOptions>,
    categories: Vec<NotificationCategory>,
    next_id: u64,
}

impl SchedulerState {
    fn assign_id(&mut self, requested: Option<String>) -> String {
        if let Some(id) = requested {
            return id;
        }
        loop {
            self.next_id += 1;
            let candidate = self.next_id.to_string();
            if !self.pending.contains_key(&candidate)
                && !self
                    .delivered
                    .iter()
                    .any(|n| n.id.as_deref() == Some(candidate.as_str()))
            {
                return candidate;
            }
        }
    }
}

/// 进程内本地通知调度器
pub struct InMemoryScheduler {
    state: SharedState,
    events: Events,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
            events: Arc::new(ListenerRegistry::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        lock(&self.state).configured.is_some()
    }

    pub fn categories(&self) -> Vec<NotificationCategory> {
        lock(&self.state).categories.clone()
    }
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryScheduler {
    fn drop(&mut self) {
        for (_, request) in std::mem::take(&mut lock(&self.state).pending) {
            request.task.abort();
        }
    }
}

fn lock(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// 记为已送达并通知监听器（不持有锁时调用监听器）
fn deliver(
    state: &Mutex<SchedulerState>,
    events: &ListenerRegistry<LocalNotification>,
    notification: LocalNotification,
) {
    lock(state).delivered.push(notification.clone());
    let notified = events.emit(notification);
    debug!(listeners = notified, "Local notification fired");
}

/// 重复请求在 `fired_at` 触发后的下一次时间（总是晚于 `now`）
fn next_fire(
    notification: &LocalNotification,
    fired_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let rule = notification.repeat_rule()?;
    let mut next = rule.next_after(fired_at)?;
    while next <= now {
        next = rule.next_after(next)?;
    }
    Some(next)
}

fn delay_until(date: DateTime<Utc>) -> Duration {
    (date - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// 为 `notification.fire_date` 排一个定时任务并记为待触发
///
/// 任务在每次触发后检查重复规则，有下一次就更新待触发请求并继续等待。
fn arm(
    shared: &SharedState,
    events: &Events,
    state: &mut SchedulerState,
    runtime: &Handle,
    notification: LocalNotification,
    fire_date: DateTime<Utc>,
) {
    let id = notification.id.clone().unwrap_or_default();
    let first_delay = delay_until(fire_date);
    let task_state = shared.clone();
    let task_events = events.clone();
    let task_id = id.clone();

    let task = runtime.spawn(async move {
        let mut delay = first_delay;
        loop {
            tokio::time::sleep(delay).await;

            let (fired, rearmed) = {
                let mut state = lock(&task_state);
                let Some(request) = state.pending.get_mut(&task_id) else {
                    return;
                };
                let fired = request.notification.clone();
                let fired_at = fired.fire_date.unwrap_or_else(Utc::now);
                match next_fire(&fired, fired_at, Utc::now()) {
                    Some(next) => {
                        request.notification.fire_date = Some(next);
                        delay = delay_until(next);
                        (fired, true)
                    }
                    None => {
                        state.pending.remove(&task_id);
                        (fired, false)
                    }
                }
            };

            deliver(&task_state, &task_events, fired);
            if !rearmed {
                return;
            }
            debug!(id = %task_id, ?delay, "Repeating notification re-armed");
        }
    });

    debug!(id = %id, delay = ?first_delay, "Local notification scheduled");
    let mut notification = notification;
    notification.fire_date = Some(fire_date);
    state
        .pending
        .insert(id, PendingRequest { notification, task });
}

impl LocalNotificationScheduler for InMemoryScheduler {
    fn configure(&self, options: ConfigureOptions) -> Result<()> {
        let mut state = lock(&self.state);
        if options.request_permissions {
            state.permissions = Some(options.permissions);
        }
        info!(
            request_permissions = options.request_permissions,
            "Local notification scheduler configured"
        );
        state.configured = Some(options);
        Ok(())
    }

    fn create_channel(&self, channel: ChannelConfig) -> Result<bool> {
        let mut state = lock(&self.state);
        if state.channels.contains_key(&channel.channel_id) {
            debug!(channel = %channel.channel_id, "Channel already exists");
            return Ok(false);
        }
        info!(channel = %channel.channel_id, "Channel created");
        state.channels.insert(channel.channel_id.clone(), channel);
        Ok(true)
    }

    fn get_channels(&self) -> Result<Vec<String>> {
        Ok(lock(&self.state).channels.keys().cloned().collect())
    }

    fn delete_channel(&self, channel_id: &str) -> Result<()> {
        lock(&self.state).channels.remove(channel_id);
        Ok(())
    }

    fn add_notification_request(&self, mut notification: LocalNotification) -> Result<String> {
        let mut state = lock(&self.state);
        let id = state.assign_id(notification.id.take());
        notification.id = Some(id.clone());

        if let Some(channel) = &notification.channel_id {
            if !state.channels.contains_key(channel) {
                warn!(channel = %channel, id = %id, "Notification targets an unknown channel");
            }
        }

        if let Some(previous) = state.pending.remove(&id) {
            previous.task.abort();
        }

        let now = Utc::now();
        let fire_date = notification.fire_date.unwrap_or(now);
        if fire_date > now {
            let runtime = Handle::try_current()
                .context("scheduling a future notification requires a tokio runtime")?;
            arm(&self.state, &self.events, &mut state, &runtime, notification, fire_date);
            return Ok(id);
        }

        drop(state);
        deliver(&self.state, &self.events, notification.clone());

        if let Some(next) = next_fire(&notification, fire_date, Utc::now()) {
            let runtime = Handle::try_current()
                .context("repeating a notification requires a tokio runtime")?;
            let mut state = lock(&self.state);
            arm(&self.state, &self.events, &mut state, &runtime, notification, next);
        }
        Ok(id)
    }

    fn pending_notification_requests(&self) -> Result<Vec<LocalNotification>> {
        Ok(lock(&self.state)
            .pending
            .values()
            .map(|r| r.notification.clone())
            .collect())
    }

    fn remove_pending_notification_requests(&self, ids: &[&str]) -> Result<()> {
        let mut state = lock(&self.state);
        for id in ids {
            if let Some(request) = state.pending.remove(*id) {
                request.task.abort();
            }
        }
        Ok(())
    }

    fn remove_all_pending_notification_requests(&self) -> Result<()> {
        for (_, request) in std::mem::take(&mut lock(&self.state).pending) {
            request.task.abort();
        }
        Ok(())
    }

    fn delivered_notifications(&self) -> Result<Vec<LocalNotification>> {
        Ok(lock(&self.state).delivered.clone())
    }

    fn remove_delivered_notifications(&self, ids: &[&str]) -> Result<()> {
        lock(&self.state)
            .delivered
            .retain(|n| n.id.as_deref().map_or(true, |id| !ids.contains(&id)));
        Ok(())
    }

    fn remove_all_delivered_notifications(&self) -> Result<()> {
        lock(&self.state).delivered.clear();
        Ok(())
    }

    fn set_application_icon_badge_number(&self, number: u32) -> Result<()> {
        lock(&self.state).badge = number;
        Ok(())
    }

    fn application_icon_badge_number(&self) -> Result<u32> {
        Ok(lock(&self.state).badge)
    }

    fn request_permissions(&self, options: PermissionOptions) -> Result<PermissionOptions> {
        lock(&self.state).permissions = Some(options);
        Ok(options)
    }

    fn check_permissions(&self) -> Result<PermissionOptions> {
        Ok(lock(&self.state).permissions.unwrap_or(PermissionOptions {
            alert: false,
            badge: false,
            sound: false,
            critical: false,
        }))
    }

    fn abandon_permissions(&self) -> Result<()> {
        lock(&self.state).permissions = None;
        info!("Notification permissions abandoned");
        Ok(())
    }

    fn set_notification_categories(&self, categories: Vec<NotificationCategory>) -> Result<()> {
        lock(&self.state).categories = categories;
        Ok(())
    }

    fn on_notification<F>(&self, listener: F) -> Subscription
    where
        F: Fn(LocalNotification) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }
}
