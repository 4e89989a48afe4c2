//! 持久化键值存储 - 字符串键、字符串值的异步存储抽象
//!
//! 通知日志和设备 token 都以整块字符串的形式保存在这里，
//! 没有局部更新，也没有版本号或 CAS。

pub mod file;
pub mod memory;

use anyhow::Result;
use std::future::Future;

pub use file::FileStore;
pub use memory::MemoryStore;

/// 通知日志使用的 key（JSON 数组）
pub const MESSAGES_KEY: &str = "messages";
/// 设备 token 使用的 key（原始字符串）
pub const FCM_TOKEN_KEY: &str = "fcmToken";

/// 异步键值存储
///
/// 每次调用都是一个挂起点：等待期间其他回调可以插入执行。
pub trait KeyValueStore: Send + Sync + 'static {
    /// 读取 key 对应的值，不存在时返回 `None`
    fn get_item(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// 覆盖写入 key
    fn set_item(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// 删除 key（不存在时不报错）
    fn remove_item(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// 清空所有 key
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

/// 空字符串和缺失等价
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
