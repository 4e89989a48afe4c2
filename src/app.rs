//! 应用装配 - 启动时注册所有监听器，关闭时统一注销
//!
//! 每个回调只负责把事件交给一个新的摄入任务，任务之间互不等待。
//! 在 `AppendMode::Unsynchronized` 下，同时到达的事件可能互相覆盖日志。

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Platform, PushLogConfig};
use crate::notification::{NotificationIngestor, NotificationLog};
use crate::registration::TokenService;
use crate::storage::KeyValueStore;
use crate::transport::{
    ConfigureOptions, HandlerFuture, LocalNotificationScheduler, MessagingEvent,
    MessagingTransport, Subscription,
};

/// 正在执行的摄入任务
#[derive(Clone)]
struct InFlight {
    runtime: Handle,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl InFlight {
    fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn spawn<F>(&self, task: &'static str, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.runtime.spawn(async move {
            if let Err(e) = work.await {
                error!(task, error = %e, "Notification task failed");
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// 等待所有任务完成（包括等待期间新产生的任务）
    async fn drain(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Notification task aborted");
                }
            }
        }
    }
}

/// 运行中的通知应用
pub struct NotificationApp<T, L, S> {
    scheduler: Arc<L>,
    log: Arc<NotificationLog<S>>,
    tokens: TokenService<T, S>,
    subscriptions: Vec<Subscription>,
    in_flight: InFlight,
}

impl<T, L, S> NotificationApp<T, L, S>
where
    T: MessagingTransport,
    L: LocalNotificationScheduler,
    S: KeyValueStore,
{
    /// 启动：设备注册、权限与 token、事件监听、后台处理器、本地调度器
    pub async fn start(
        transport: Arc<T>,
        scheduler: Arc<L>,
        store: Arc<S>,
        config: &PushLogConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("notification app requires a tokio runtime")?;
        let log = Arc::new(NotificationLog::new(store.clone()).with_mode(config.append_mode));
        let ingestor = NotificationIngestor::new(log.clone());
        let tokens = TokenService::new(transport.clone(), store, config.platform);
        let in_flight = InFlight::new(runtime);

        if let Err(e) = tokens.register_device().await {
            warn!(error = %e, "Remote message registration failed");
        }

        match tokens.request_user_permission(config.permissions).await {
            Ok(Some(_)) => info!("Device token registered"),
            Ok(None) => info!("Running without a device token"),
            Err(e) => error!(error = %e, "Token registration failed"),
        }

        let mut subscriptions = vec![
            Self::listen_foreground(&transport, &ingestor, &in_flight),
            Self::listen_opened(&transport, &ingestor, &in_flight),
            Self::listen_token_refresh(&transport, &tokens, &in_flight),
            Self::listen_delivery_reports(&transport),
            Self::register_background_handler(&transport, &ingestor),
        ];

        subscriptions.push(scheduler.on_notification({
            let ingestor = ingestor.clone();
            let in_flight = in_flight.clone();
            move |notification| {
                let ingestor = ingestor.clone();
                in_flight.spawn("local", async move {
                    ingestor.on_local_notification(&notification).await
                });
            }
        }));

        scheduler.configure(ConfigureOptions {
            request_permissions: config.platform == Platform::Ios,
            permissions: config.permissions,
            pop_initial_notification: true,
        })?;
        scheduler.create_channel(config.default_channel.clone())?;

        let initial = transport
            .get_initial_notification()
            .await
            .context("failed to query the initial notification")?;
        if let Some(message) = initial {
            info!(
                message_id = ?message.message_id,
                "Notification caused app to open from quit state"
            );
        }

        info!(
            listeners = subscriptions.len(),
            mode = ?config.append_mode,
            "Notification app started"
        );

        Ok(Self {
            scheduler,
            log,
            tokens,
            subscriptions,
            in_flight,
        })
    }

    fn listen_foreground(
        transport: &Arc<T>,
        ingestor: &NotificationIngestor<S>,
        in_flight: &InFlight,
    ) -> Subscription {
        let ingestor = ingestor.clone();
        let in_flight = in_flight.clone();
        transport.on_event(move |event| {
            if let MessagingEvent::Message(message) = event {
                let ingestor = ingestor.clone();
                in_flight.spawn("foreground", async move {
                    ingestor.on_foreground_message(&message).await
                });
            }
        })
    }

    fn listen_opened(
        transport: &Arc<T>,
        ingestor: &NotificationIngestor<S>,
        in_flight: &InFlight,
    ) -> Subscription {
        let ingestor = ingestor.clone();
        let in_flight = in_flight.clone();
        transport.on_event(move |event| {
            if let MessagingEvent::NotificationOpenedApp(message) = event {
                let ingestor = ingestor.clone();
                in_flight.spawn("opened", async move {
                    ingestor.on_notification_opened_app(&message).await
                });
            }
        })
    }

    fn listen_token_refresh(
        transport: &Arc<T>,
        tokens: &TokenService<T, S>,
        in_flight: &InFlight,
    ) -> Subscription {
        let tokens = tokens.clone();
        let in_flight = in_flight.clone();
        transport.on_event(move |event| {
            if let MessagingEvent::TokenRefresh(token) = event {
                let tokens = tokens.clone();
                in_flight.spawn("token_refresh", async move { tokens.refresh(&token).await });
            }
        })
    }

    fn listen_delivery_reports(transport: &Arc<T>) -> Subscription {
        transport.on_event(|event| match event {
            MessagingEvent::MessageSent { message_id } => {
                info!(message_id = %message_id, "Message has been sent to the messaging server");
            }
            MessagingEvent::SendError { message_id, error } => {
                warn!(message_id = %message_id, error = %error, "Failed to send message");
            }
            MessagingEvent::DeletedMessages => {
                info!("Pending messages were deleted by the server");
            }
            _ => {}
        })
    }

    /// 后台处理器直接返回摄入 future，完成时限由消息服务强制
    fn register_background_handler(
        transport: &Arc<T>,
        ingestor: &NotificationIngestor<S>,
    ) -> Subscription {
        let ingestor = ingestor.clone();
        transport.set_background_message_handler(Arc::new(move |message| {
            let ingestor = ingestor.clone();
            let work: HandlerFuture =
                Box::pin(async move { ingestor.on_background_message(&message).await });
            work
        }))
    }

    pub fn log(&self) -> &Arc<NotificationLog<S>> {
        &self.log
    }

    pub fn tokens(&self) -> &TokenService<T, S> {
        &self.tokens
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// 等待当前所有摄入任务完成
    pub async fn flush(&self) {
        self.in_flight.drain().await;
    }

    /// 注销所有监听器，再等待已经开始的任务完成
    pub async fn shutdown(mut self) {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        debug!(count, "Listeners removed");

        self.in_flight.drain().await;

        // 之后触发的本地通知不会再写入日志
        let pending = self
            .scheduler
            .pending_notification_requests()
            .map(|requests| requests.len())
            .unwrap_or_default();
        info!(pending, "Notification app stopped");
    }
}
