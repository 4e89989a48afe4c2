//! 外部协作方边界 - 远程消息服务和本地通知调度器
//!
//! 两者都通过监听器注册表回调 App，注册返回 `Subscription`，
//! 句柄释放即注销。`LoopbackMessaging` 和 `InMemoryScheduler` 是进程内实现。

pub mod listener;
pub mod local;
pub mod loopback;
pub mod messaging;
pub mod scheduler;

pub use listener::{ListenerRegistry, Subscription};
pub use local::InMemoryScheduler;
pub use loopback::{AppState, LoopbackMessaging, DEFAULT_BACKGROUND_DEADLINE};
pub use messaging::{
    AuthorizationStatus, BackgroundMessageHandler, HandlerFuture, MessagingEvent,
    MessagingTransport, PermissionOptions,
};
pub use scheduler::{
    CategoryAction, ChannelConfig, ConfigureOptions, LocalNotificationScheduler,
    NotificationCategory,
};
