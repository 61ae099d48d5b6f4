//! Configuration handle that stays in sync with a shared store.

use crate::core::{ConfigMap, ConfigStore};
use crate::error::{ConfigError, Result};
use crate::notify::{ConfigExtension, RefreshSubscriber, SubscriberRegistry, SubscriptionHandle};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct Inner<S> {
    store: S,
    /// Last snapshot loaded from the store
    current: ArcSwap<ConfigMap>,
    extensions: RwLock<Vec<Arc<dyn ConfigExtension>>>,
    subscribers: SubscriberRegistry,
    /// Held across read and swap so an older read never replaces a newer one
    refresh_lock: Mutex<()>,
}

impl<S: ConfigStore> Inner<S> {
    async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let values = self.store.get_all().await?;
        debug!("Refreshed configuration ({} entries)", values.len());

        let snapshot = Arc::new(values);
        self.current.store(Arc::clone(&snapshot));
        self.subscribers.notify_all(&snapshot).await;
        Ok(())
    }
}

/// Subscriber handed to extensions. Holds the configuration weakly so an
/// extension never keeps it alive.
struct Refresher<S> {
    inner: Weak<Inner<S>>,
}

#[async_trait]
impl<S: ConfigStore> RefreshSubscriber for Refresher<S> {
    async fn refresh(&self) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => inner.refresh().await,
            None => Ok(()),
        }
    }
}

/// Configuration handle over a [`ConfigStore`] with pluggable refresh policies
/// and change publishers.
///
/// Reads are served lock-free from the last loaded snapshot. Writes go to the
/// store, are announced through every extension and then reloaded locally,
/// since a publisher never refreshes its own subscriber.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::prelude::*;
/// use redis_config_store::backend::RedisConnection;
///
/// # async fn example() -> Result<()> {
/// let connection = RedisConnection::open("redis://127.0.0.1:6379")?;
/// let store = HashConfigStore::new(connection, "my-config-key")?;
/// let publisher = store.to_extension("my-config-key-channel")?;
///
/// let config = RefreshingConfig::new(store).with_extension(publisher)?;
/// config.refresh().await?;
///
/// // Other processes sharing the channel reload after this
/// config.set("feature.enabled", true).await?;
/// assert_eq!(config.get_as::<bool>("feature.enabled")?, Some(true));
/// # Ok(())
/// # }
/// ```
pub struct RefreshingConfig<S> {
    inner: Arc<Inner<S>>,
}

impl<S: ConfigStore> RefreshingConfig<S> {
    /// Create a handle over `store` with an empty snapshot.
    ///
    /// Call [`refresh`](Self::refresh) to load the current values.
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                current: ArcSwap::from_pointee(ConfigMap::new()),
                extensions: RwLock::new(Vec::new()),
                subscribers: SubscriberRegistry::new(),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// Attach `extension` and bind this configuration as its subscriber.
    ///
    /// # Errors
    ///
    /// Returns whatever the extension reports from binding, e.g.
    /// [`ConfigError::AlreadySubscribed`] if it already serves another configuration.
    pub fn with_extension<E: ConfigExtension + 'static>(self, extension: E) -> Result<Self> {
        self.add_extension(Arc::new(extension))?;
        Ok(self)
    }

    /// Attach a shared extension and bind this configuration as its subscriber.
    pub fn add_extension(&self, extension: Arc<dyn ConfigExtension>) -> Result<()> {
        let refresher = Refresher {
            inner: Arc::downgrade(&self.inner),
        };
        extension.subscribe(Arc::new(refresher))?;
        self.inner.extensions.write().push(extension);
        Ok(())
    }

    /// Number of attached extensions.
    pub fn extension_count(&self) -> usize {
        self.inner.extensions.read().len()
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// The last loaded snapshot.
    pub fn snapshot(&self) -> Arc<ConfigMap> {
        self.inner.current.load_full()
    }

    /// Value of `name` in the last loaded snapshot.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.current.load().get(name).cloned()
    }

    /// Value of `name` in the last loaded snapshot, deserialized as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeserializationError`] if the value has a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.get(name)
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    ConfigError::DeserializationError(format!("Entry '{}': {}", name, e))
                })
            })
            .transpose()
    }

    /// Reload every entry from the store and notify local callbacks.
    ///
    /// Concurrent refreshes run one at a time, so the snapshot always reflects
    /// the most recent read. On failure the previous snapshot is kept.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }

    /// Write `value` under `name`, announce the change and reload.
    ///
    /// Returns the stored value. The local snapshot is reloaded even when the
    /// announcement fails; that failure is reported afterwards.
    pub async fn set<V: Serialize>(&self, name: &str, value: V) -> Result<Value> {
        let value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        let stored = self.inner.store.set(name, value).await?;
        self.announce_and_refresh().await?;
        Ok(stored)
    }

    /// Remove `name`, announce the change and reload.
    ///
    /// Returns the number of entries removed. As with [`set`](Self::set), the
    /// local snapshot is reloaded even when the announcement fails.
    pub async fn delete(&self, name: &str) -> Result<u64> {
        let removed = self.inner.store.delete(name).await?;
        self.announce_and_refresh().await?;
        Ok(removed)
    }

    /// Register a callback invoked with every refreshed snapshot.
    pub async fn on_change<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ConfigMap) + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback).await
    }

    /// Publish on every extension, then reload. The write is already in the
    /// store, so the reload happens whatever the extensions report.
    async fn announce_and_refresh(&self) -> Result<()> {
        let extensions = self.inner.extensions.read().clone();
        let mut announced = Ok(());
        for extension in extensions {
            if let Err(e) = extension.publish().await {
                warn!("Failed to announce configuration change: {}", e);
                if announced.is_ok() {
                    announced = Err(e);
                }
            }
        }

        self.refresh().await?;
        announced
    }
}

impl<S> Clone for RefreshingConfig<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
