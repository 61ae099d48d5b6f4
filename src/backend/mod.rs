//! Shared store capability.
//!
//! The configuration store and the change publisher never talk to a concrete
//! client directly. They go through [`StoreConnection`], which exposes the two
//! capabilities they need from the shared data store: hash-field storage and a
//! fan-out publish/subscribe channel.

mod memory;

#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryConnection;

#[cfg(feature = "redis")]
pub use self::redis::RedisConnection;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

/// Stream of payloads received on a subscribed channel.
///
/// `None` marks a message that carried no payload (or an empty one).
pub type MessageStream = BoxStream<'static, Option<String>>;

/// A connection to a shared hash + pub/sub store.
///
/// Implement this trait to plug another store into [`HashConfigStore`] and
/// [`PubSubChangePublisher`].
///
/// [`HashConfigStore`]: crate::core::HashConfigStore
/// [`PubSubChangePublisher`]: crate::notify::PubSubChangePublisher
#[async_trait]
pub trait StoreConnection: Send + Sync + Sized + 'static {
    /// Read every field of the hash stored at `key`.
    ///
    /// Returns an empty map when the hash does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Write `value` into `field` of the hash at `key`, overwriting any previous value.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Remove `field` from the hash at `key`, returning the number of fields removed.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<u64>;

    /// Publish `message` to every subscriber of `channel`.
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;

    /// Subscribe to `channel` and return the stream of received payloads.
    ///
    /// The subscription must run over its own connection: many clients switch
    /// a connection into a receive-only mode once it subscribes.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream>;

    /// Create a connection to the same store that does not share this one's socket.
    fn duplicate(&self) -> Result<Self>;

    /// Human-readable description for logging.
    fn describe(&self) -> String;
}

/// Normalise a received payload: empty payloads count as absent.
pub(crate) fn normalize_payload(payload: Option<String>) -> Option<String> {
    payload.filter(|p| !p.is_empty())
}
