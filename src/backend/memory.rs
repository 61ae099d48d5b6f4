//! In-process store backend.

use super::{MessageStream, StoreConnection, normalize_payload};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 256;

/// State shared by a connection and all of its duplicates.
struct MemoryState {
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
    messages: broadcast::Sender<(String, Option<String>)>,
    closing: broadcast::Sender<()>,
    failing: AtomicBool,
    next_connection: AtomicUsize,
}

/// In-process implementation of [`StoreConnection`].
///
/// Every connection obtained through [`StoreConnection::duplicate`] talks to the
/// same underlying state, so a single test can stand in for several processes
/// sharing one store.
///
/// # Examples
///
/// ```rust
/// use redis_config_store::backend::{MemoryConnection, StoreConnection};
///
/// # async fn example() -> redis_config_store::error::Result<()> {
/// let connection = MemoryConnection::new();
/// connection.hash_set("cfg", "foo", "\"bar\"").await?;
///
/// let other = connection.duplicate()?;
/// assert_eq!(other.hash_get_all("cfg").await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryConnection {
    state: Arc<MemoryState>,
    id: usize,
}

impl MemoryConnection {
    /// Create a connection to a fresh, empty store.
    pub fn new() -> Self {
        let (messages, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (closing, _) = broadcast::channel(1);
        Self {
            state: Arc::new(MemoryState {
                hashes: RwLock::new(HashMap::new()),
                messages,
                closing,
                failing: AtomicBool::new(false),
                next_connection: AtomicUsize::new(1),
            }),
            id: 0,
        }
    }

    /// Make every subsequent operation on the shared store fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Deliver a raw message on `channel`, including one without any payload.
    pub fn inject(&self, channel: &str, payload: Option<&str>) {
        let _ = self
            .state
            .messages
            .send((channel.to_string(), payload.map(str::to_string)));
    }

    /// End every open channel subscription, as a dropped server connection would.
    ///
    /// Subscriptions opened afterwards are unaffected.
    pub fn close_subscriptions(&self) {
        let _ = self.state.closing.send(());
    }

    /// Number of live channel subscriptions across all connections.
    pub fn subscription_count(&self) -> usize {
        self.state.messages.receiver_count()
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(ConfigError::StoreError(format!(
                "{} failed: memory store unavailable",
                operation
            )));
        }
        Ok(())
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.check("HGETALL")?;
        Ok(self
            .state
            .hashes
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.check("HSET")?;
        self.state
            .hashes
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<u64> {
        self.check("HDEL")?;
        let mut hashes = self.state.hashes.write();
        let Some(hash) = hashes.get_mut(key) else {
            return Ok(0);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            hashes.remove(key);
        }
        Ok(u64::from(removed))
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        self.check("PUBLISH")?;
        // No receivers is not an error for a fan-out channel.
        let _ = self
            .state
            .messages
            .send((channel.to_string(), Some(message.to_string())));
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        self.check("SUBSCRIBE")?;
        let channel = channel.to_string();
        let receiver = self.state.messages.subscribe();
        let mut closing = self.state.closing.subscribe();

        let stream = BroadcastStream::new(receiver).filter_map(move |item| {
            let payload = match item {
                Ok((target, payload)) if target == channel => Some(normalize_payload(payload)),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Memory channel '{}' lagged: {}", channel, e);
                    None
                }
            };
            futures::future::ready(payload)
        });
        let closed = async move {
            let _ = closing.recv().await;
        };

        Ok(stream.take_until(closed).boxed())
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(Self {
            state: Arc::clone(&self.state),
            id: self.state.next_connection.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.id)
    }
}
