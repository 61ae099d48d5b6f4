//! Built-in metrics for the change notification pipeline.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Announcements published and received
//! - Self-notifications suppressed
//! - Subscriber refreshes, failures and duration
//!
//! # Examples
//!
//! ```rust,no_run
//! use redis_config_store::backend::MemoryConnection;
//! use redis_config_store::metrics::NotificationMetrics;
//! use redis_config_store::notify::PubSubChangePublisher;
//! use opentelemetry::global;
//!
//! # async fn example() -> redis_config_store::error::Result<()> {
//! let publisher = PubSubChangePublisher::builder()
//!     .with_connection(MemoryConnection::new())
//!     .with_channel("my-config-channel")
//!     .with_metrics(NotificationMetrics::new(global::meter("my-app")))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod notification_metrics;

pub use notification_metrics::NotificationMetrics;
