//! Redis store backend.

use super::{MessageStream, StoreConnection, normalize_payload};
use crate::error::{ConfigError, Result};
use crate::settings::StoreSettings;
use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, Client, ConnectionInfo, aio::MultiplexedConnection};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Redis implementation of [`StoreConnection`].
///
/// Hash commands and publishes go over a multiplexed connection that is opened
/// on first use. Each channel subscription opens its own pub/sub connection.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::backend::RedisConnection;
///
/// # fn example() -> redis_config_store::error::Result<()> {
/// let connection = RedisConnection::open("redis://127.0.0.1:6379")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RedisConnection {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisConnection {
    /// Create a connection from a Redis URL (e.g. `redis://localhost:6379`).
    ///
    /// No I/O happens until the first command is issued.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| ConfigError::InvalidArgument(format!("Invalid Redis URL: {}", e)))?;
        Ok(Self::from_client(client))
    }

    /// Create a connection from loaded [`StoreSettings`], selecting the configured database.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self> {
        let mut connection_info: ConnectionInfo = Client::open(settings.url.as_str())
            .map_err(|e| ConfigError::InvalidArgument(format!("Invalid Redis URL: {}", e)))?
            .get_connection_info()
            .clone();

        connection_info.redis.db = settings.database;

        let client = Client::open(connection_info)
            .map_err(|e| ConfigError::store(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self::from_client(client))
    }

    /// Wrap an existing Redis client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
        }
    }

    /// Get (opening on first use) the multiplexed request connection.
    async fn connection(&self) -> Result<MultiplexedConnection> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let conn = self
                    .client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| {
                        ConfigError::store(format!("Failed to connect to Redis: {}", e))
                    })?;
                info!("Connected to Redis at {}", self.describe());
                Ok::<_, ConfigError>(conn)
            })
            .await?;

        Ok(connection.clone())
    }
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        let removed: u64 = conn.hdel(key, field).await?;
        Ok(removed)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let receivers: i64 = conn.publish(channel, message).await?;
        debug!("Published to '{}' ({} receivers)", channel, receivers);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            ConfigError::store(format!("Failed to open pub/sub connection: {}", e))
        })?;
        pubsub.subscribe(channel).await?;

        let stream = pubsub
            .into_on_message()
            .map(|msg| normalize_payload(msg.get_payload::<String>().ok()));

        Ok(stream.boxed())
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(Self::from_client(self.client.clone()))
    }

    fn describe(&self) -> String {
        let info = self.client.get_connection_info();
        format!("redis://{}/{}", info.addr, info.redis.db)
    }
}
