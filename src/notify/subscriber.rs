//! Local callbacks invoked after a configuration refresh.

use crate::core::ConfigMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ChangeCallback = Box<dyn Fn(&ConfigMap) + Send + Sync>;

/// Handle for a registered callback that can be dropped to unregister it.
pub struct SubscriptionHandle {
    id: u64,
    registry: Arc<RwLock<RegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let id = self.id;
        let registry = Arc::clone(&self.registry);
        // Removal needs the async lock; outside a runtime the entry simply stays.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                registry.write().await.callbacks.retain(|(cb_id, _)| *cb_id != id);
            });
        }
    }
}

struct RegistryInner {
    callbacks: Vec<(u64, ChangeCallback)>,
    next_id: u64,
}

/// Registry of callbacks that observe every refreshed configuration snapshot.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::notify::SubscriberRegistry;
///
/// # async fn example() {
/// let registry = SubscriberRegistry::new();
///
/// let handle = registry.subscribe(|snapshot| {
///     println!("{} entries after refresh", snapshot.len());
/// }).await;
///
/// // Unregister by dropping the handle
/// drop(handle);
/// # }
/// ```
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                callbacks: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register `callback`, returning the handle that keeps it registered.
    pub async fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ConfigMap) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.callbacks.push((id, Box::new(callback)));

        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Invoke every callback, in registration order, with `snapshot`.
    pub async fn notify_all(&self, snapshot: &ConfigMap) {
        let inner = self.inner.read().await;
        for (_id, callback) in &inner.callbacks {
            callback(snapshot);
        }
    }

    /// Number of registered callbacks.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.callbacks.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
