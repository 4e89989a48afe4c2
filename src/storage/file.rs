//! 文件存储 - 所有 key 保存在同一个 JSON 对象文件中

use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;

use super::KeyValueStore;

type Items = BTreeMap<String, String>;

/// JSON 文件存储（带文件锁）
///
/// 每次写入都会重写整个文件：先写临时文件，再原子替换。
/// 文件操作跑在阻塞线程上，调用方丢弃 future 并不会撤销已经开始的写入。
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 在阻塞线程上持有排他锁执行 `op`
    async fn with_exclusive_lock<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<()> + Send + 'static,
    {
        let path = self.path.clone();
        let result = task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let lock = open_lock_file(&path)?;
            lock.lock_exclusive()?;
            let outcome = op(&path);
            lock.unlock()?;
            outcome
        })
        .await
        .context("storage task aborted")?;

        debug!(path = %self.path.display(), "Storage file updated");
        result
    }

    /// 加锁的读-改-写；文件损坏时报错且不改动文件
    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Items) + Send + 'static,
    {
        self.with_exclusive_lock(move |path| {
            let mut items = read_items(path)
                .context("refusing to rewrite it; clear the store to reset")?;
            mutate(&mut items);
            write_items(path, &items)
        })
        .await
    }
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("lock")
}

fn open_lock_file(path: &Path) -> Result<File> {
    let lock_path = lock_path(path);
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file {}", lock_path.display()))
}

fn read_items(path: &Path) -> Result<Items> {
    if !path.exists() {
        return Ok(Items::new());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Items::new());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("storage file {} is corrupt", path.display()))
}

fn write_items(path: &Path, items: &Items) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, serde_json::to_string_pretty(items)?)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path.clone();
        let key = key.to_string();
        let result = task::spawn_blocking(move || -> Result<Option<String>> {
            if !path.exists() {
                return Ok(None);
            }
            let lock = open_lock_file(&path)?;
            lock.lock_shared()?;
            let items = read_items(&path);
            lock.unlock()?;
            Ok(items?.remove(&key))
        })
        .await
        .context("storage task aborted")?;
        result
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.update(move |items| {
            items.insert(key, value);
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.update(move |items| {
            items.remove(&key);
        })
        .await
    }

    /// 不解析旧内容，直接写入空对象（损坏的文件也能清掉）
    async fn clear(&self) -> Result<()> {
        self.with_exclusive_lock(|path| write_items(path, &Items::new()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (FileStore, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path().join("nested").join("storage.json"));
        (store, temp)
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_absent() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.get_item("messages").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let (store, _temp) = create_test_store();
        store.set_item("fcmToken", "token-1").await.unwrap();
        store.set_item("messages", "[]").await.unwrap();

        let reopened = FileStore::new(store.path());
        assert_eq!(
            reopened.get_item("fcmToken").await.unwrap(),
            Some("token-1".to_string())
        );
        assert_eq!(
            reopened.get_item("messages").await.unwrap(),
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_keeps_other_keys() {
        let (store, _temp) = create_test_store();
        store.set_item("fcmToken", "token-1").await.unwrap();
        store.set_item("messages", "[]").await.unwrap();

        store.remove_item("messages").await.unwrap();

        assert_eq!(store.get_item("messages").await.unwrap(), None);
        assert!(store.get_item("fcmToken").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (store, _temp) = create_test_store();
        store.set_item("a", "1").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (store, _temp) = create_test_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.get_item("messages").await.is_err());
        assert!(store.set_item("messages", "[]").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_resets_corrupt_file() {
        // Given: 损坏的存储文件
        let (store, _temp) = create_test_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        // When: 删除单个 key 报告损坏，文件保持原样
        let err = store.remove_item("messages").await.unwrap_err();
        assert!(format!("{:#}", err).contains("corrupt"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{not json");

        // Then: clear 不解析旧内容，之后可以正常读写
        store.clear().await.unwrap();
        assert_eq!(store.get_item("messages").await.unwrap(), None);
        store.set_item("messages", "[]").await.unwrap();
        assert_eq!(
            store.get_item("messages").await.unwrap(),
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    async fn test_started_write_completes_after_caller_gives_up() {
        let (store, _temp) = create_test_store();

        // 写入已经交给阻塞线程后，外层超时丢弃 future
        let _ = tokio::time::timeout(
            std::time::Duration::ZERO,
            store.set_item("messages", "[\"late\"]"),
        )
        .await;

        let mut value = None;
        for _ in 0..100 {
            value = store.get_item("messages").await.unwrap();
            if value.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(value.as_deref(), Some("[\"late\"]"));
    }
}
