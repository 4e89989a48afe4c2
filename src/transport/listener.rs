//! 监听器注册表 - 注册返回取消句柄，句柄 drop 时自动注销

use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;

struct Inner<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// 一组同类事件的监听器
pub struct ListenerRegistry<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<E: Clone + 'static> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Inner<E>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.listeners.retain(|(lid, _)| *lid != id);
                debug!(listener_id = id, "Listener removed");
            }
        })
    }

    /// 依次通知所有监听器，返回被通知的数量
    ///
    /// 调用监听器时不持有锁，监听器里可以再注册/注销。
    pub fn emit(&self, event: E) -> usize {
        let listeners: Vec<Listener<E>> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        for listener in &listeners {
            listener(event.clone());
        }
        listeners.len()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 取消句柄
///
/// 调用 `unsubscribe()` 或 drop 都会注销对应的监听器。
#[must_use = "dropping a Subscription removes the listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_listeners() {
        let registry = ListenerRegistry::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = total.clone();
        let _s1 = registry.subscribe(move |v| {
            t1.fetch_add(v as usize, Ordering::SeqCst);
        });
        let t2 = total.clone();
        let _s2 = registry.subscribe(move |v| {
            t2.fetch_add(v as usize * 10, Ordering::SeqCst);
        });

        assert_eq!(registry.emit(2), 2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ListenerRegistry::<()>::new();
        let sub = registry.subscribe(|_| {});
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert!(registry.is_empty());
        assert_eq!(registry.emit(()), 0);
    }

    #[test]
    fn test_explicit_unsubscribe_only_removes_own_listener() {
        let registry = ListenerRegistry::<()>::new();
        let keep = registry.subscribe(|_| {});
        let remove = registry.subscribe(|_| {});

        remove.unsubscribe();
        assert_eq!(registry.len(), 1);
        drop(keep);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = ListenerRegistry::<()>::new();
        let sub = registry.subscribe(|_| {});
        drop(registry);
        // 注册表已释放，注销时不能 panic
        drop(sub);
    }
}
