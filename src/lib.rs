//! # redis-config-store
//!
//! Shared key-value configuration stored in a Redis hash, with pub/sub change
//! notification between every process that uses it.
//!
//! ## Overview
//!
//! `redis-config-store` provides two collaborating pieces:
//! - [`HashConfigStore`](core::HashConfigStore): get/set/delete of JSON values
//!   in one shared hash collection
//! - [`PubSubChangePublisher`](notify::PubSubChangePublisher): announces local
//!   changes on a channel and refreshes its subscriber when another process
//!   announces one, never for its own announcements
//!
//! [`RefreshingConfig`](core::RefreshingConfig) ties them together into a
//! lock-free configuration handle that reloads whenever the shared data changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use redis_config_store::prelude::*;
//! use redis_config_store::backend::RedisConnection;
//!
//! # async fn example() -> redis_config_store::error::Result<()> {
//! let connection = RedisConnection::open("redis://127.0.0.1:6379")?;
//! let store = HashConfigStore::new(connection, "my-config-key")?;
//! let publisher = store.to_extension("my-config-key-channel")?;
//!
//! let config = RefreshingConfig::new(store).with_extension(publisher)?;
//! config.refresh().await?;
//!
//! config.set("max_connections", 32).await?;
//! println!("max_connections = {:?}", config.get("max_connections"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `redis` (default): Redis backend
//! - `metrics`: OpenTelemetry metrics for the notification pipeline
//!
//! Without `redis`, the in-process [`MemoryConnection`](backend::MemoryConnection)
//! is still available, and custom stores can implement
//! [`StoreConnection`](backend::StoreConnection).

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod backend;
pub mod core;
pub mod error;
pub mod notify;
pub mod settings;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::backend::StoreConnection;
    pub use crate::core::{ConfigMap, ConfigStore, HashConfigStore, RefreshingConfig};
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{ConfigExtension, PubSubChangePublisher, RefreshSubscriber};
}
