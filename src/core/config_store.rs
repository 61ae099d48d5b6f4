//! Field-level access to one shared hash collection.

use crate::backend::StoreConnection;
use crate::error::{ConfigError, Result};
use crate::notify::PubSubChangePublisher;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Deserialized contents of a configuration collection, keyed by field name.
pub type ConfigMap = HashMap<String, Value>;

/// Trait for stores that back a [`RefreshingConfig`](crate::core::RefreshingConfig).
///
/// Stores never announce changes themselves; callers that want "write and
/// notify" sequence the write and the announcement explicitly.
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Read every entry of the collection. A missing collection is empty.
    async fn get_all(&self) -> Result<ConfigMap>;

    /// Write `value` under `name`, overwriting any existing value, and hand it back.
    async fn set(&self, name: &str, value: Value) -> Result<Value>;

    /// Remove `name` if present, returning the number of entries removed.
    async fn delete(&self, name: &str) -> Result<u64>;
}

/// Configuration store over a single hash collection.
///
/// Values are stored as JSON text, one hash field per entry. The store is a
/// thin accessor: it keeps no copy of the data between calls.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::backend::RedisConnection;
/// use redis_config_store::core::HashConfigStore;
///
/// # async fn example() -> redis_config_store::error::Result<()> {
/// let connection = RedisConnection::open("redis://127.0.0.1:6379")?;
/// let store = HashConfigStore::new(connection, "cfg")?;
///
/// store.set("foo", "bar").await?;
/// store.set("n", 23).await?;
/// store.delete("n").await?;
///
/// let values = store.get_all().await?;
/// assert_eq!(values["foo"], "bar");
/// # Ok(())
/// # }
/// ```
pub struct HashConfigStore<C: StoreConnection> {
    connection: C,
    key: String,
}

impl<C: StoreConnection> HashConfigStore<C> {
    /// Create a store over the collection named `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidArgument`] if `key` is empty.
    pub fn new(connection: C, key: impl Into<String>) -> Result<Self> {
        Self::builder()
            .with_connection(connection)
            .with_key(key)
            .build()
    }

    /// Create a builder for a store.
    pub fn builder() -> HashConfigStoreBuilder<C> {
        HashConfigStoreBuilder::new()
    }

    /// Name of the collection this store reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The connection used for hash operations.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Read and deserialize every entry of the collection.
    ///
    /// Returns an empty map when the collection does not exist.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::StoreError`] if the read fails
    /// - [`ConfigError::DeserializationError`] if a field does not hold valid JSON
    pub async fn get_all(&self) -> Result<ConfigMap> {
        let raw = self.connection.hash_get_all(&self.key).await?;

        raw.into_iter()
            .map(|(name, text)| {
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    ConfigError::DeserializationError(format!(
                        "Field '{}' of '{}' is not valid JSON: {}",
                        name, self.key, e
                    ))
                })?;
                Ok((name, value))
            })
            .collect()
    }

    /// Serialize `value` and store it under `name`, returning the original value.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::SerializationError`] if `value` cannot be serialized
    /// - [`ConfigError::StoreError`] if the write fails
    pub async fn set<V: Serialize>(&self, name: &str, value: V) -> Result<V> {
        let text = serde_json::to_string(&value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.connection.hash_set(&self.key, name, &text).await?;
        debug!("Set '{}' in '{}'", name, self.key);
        Ok(value)
    }

    /// Remove `name` from the collection. Removing an absent entry is not an error.
    ///
    /// Returns the number of entries removed (0 or 1).
    pub async fn delete(&self, name: &str) -> Result<u64> {
        let removed = self.connection.hash_delete(&self.key, name).await?;
        debug!("Deleted '{}' from '{}' ({} removed)", name, self.key, removed);
        Ok(removed)
    }

    /// Create a change publisher on `channel` over a duplicate of this store's connection.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidArgument`] if `channel` is empty
    /// - any error from [`PubSubChangePublisher::new`]
    pub fn to_extension(&self, channel: impl Into<String>) -> Result<PubSubChangePublisher<C>> {
        let channel = channel.into();
        if channel.is_empty() {
            return Err(ConfigError::missing("channel"));
        }
        PubSubChangePublisher::new(self.connection.duplicate()?, channel)
    }
}

#[async_trait]
impl<C: StoreConnection> ConfigStore for HashConfigStore<C> {
    async fn get_all(&self) -> Result<ConfigMap> {
        HashConfigStore::get_all(self).await
    }

    async fn set(&self, name: &str, value: Value) -> Result<Value> {
        HashConfigStore::set(self, name, value).await
    }

    async fn delete(&self, name: &str) -> Result<u64> {
        HashConfigStore::delete(self, name).await
    }
}

/// Builder for constructing a [`HashConfigStore`].
pub struct HashConfigStoreBuilder<C> {
    connection: Option<C>,
    key: Option<String>,
}

impl<C: StoreConnection> HashConfigStoreBuilder<C> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            connection: None,
            key: None,
        }
    }

    /// Set the store connection.
    pub fn with_connection(mut self, connection: C) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Set the collection name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Build the store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidArgument`] if the connection or key is missing.
    pub fn build(self) -> Result<HashConfigStore<C>> {
        let connection = self
            .connection
            .ok_or_else(|| ConfigError::missing("connection"))?;
        let key = self
            .key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::missing("key"))?;

        Ok(HashConfigStore { connection, key })
    }
}

impl<C: StoreConnection> Default for HashConfigStoreBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
