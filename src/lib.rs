//! pushlog - 把推送通知和本地通知记录到持久化的消息日志

pub mod app;
pub mod cli;
pub mod config;
pub mod notification;
pub mod registration;
pub mod storage;
pub mod transport;

pub use app::NotificationApp;
pub use config::{Platform, PushLogConfig};
pub use notification::{
    AppendMode, LocalNotification, NotificationIngestor, NotificationLog, NotificationRecord,
    NotificationSource, RemoteMessage, TokenStore,
};
pub use registration::TokenService;
pub use storage::{FileStore, KeyValueStore, MemoryStore, FCM_TOKEN_KEY, MESSAGES_KEY};
pub use transport::{
    AppState, InMemoryScheduler, LocalNotificationScheduler, LoopbackMessaging, MessagingEvent,
    MessagingTransport, Subscription,
};
