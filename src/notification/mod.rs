//! 通知日志服务 - 接收各来源的通知事件，归一化后追加到持久化日志
//!
//! # 组成
//! 1. `NotificationRecord`：带来源标签的统一记录
//! 2. `NotificationLog`：存在单个 key 下的有序日志（append / read / clear）
//! 3. `NotificationIngestor`：前台、后台、点击打开、本地通知四个入口
//! 4. `TokenStore`：设备 token 的持久化
//!
//! # 使用示例
//! ```ignore
//! use pushlog::notification::{NotificationLog, NotificationRecord, NotificationSource};
//! use pushlog::storage::MemoryStore;
//!
//! let log = NotificationLog::new(Arc::new(MemoryStore::new()));
//! log.append(NotificationRecord::new(NotificationSource::ForegroundPush).with_title("Hi")).await?;
//! let records = log.read().await?;
//! ```

pub mod formatter;
pub mod ingest;
pub mod log;
pub mod payload;
pub mod record;
pub mod token;

pub use formatter::{msg, LogFormatter};
pub use ingest::NotificationIngestor;
pub use log::{AppendMode, NotificationLog};
pub use payload::{LocalNotification, RemoteMessage, RemoteNotification, RepeatsComponent};
pub use record::{NotificationRecord, NotificationSource};
pub use token::TokenStore;
