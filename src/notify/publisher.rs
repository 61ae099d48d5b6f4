//! Pub/sub change publisher and refresh policy.
//!
//! Every instance carries a random identity. `publish()` broadcasts that
//! identity on the channel; the instance's own listener drops messages that
//! carry it and refreshes the bound subscriber for everything else. A process
//! that writes therefore never reloads because of its own announcement, while
//! every other process sharing the channel does.

use crate::backend::StoreConnection;
use crate::error::{ConfigError, Result};
use crate::notify::{ConfigExtension, RefreshSubscriber};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

#[cfg(feature = "metrics")]
use crate::metrics::NotificationMetrics;

/// Lifecycle of the channel listener.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListenState {
    Connecting,
    Listening,
    Failed(String),
}

/// Delay before the first resubscription attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound for the delay between resubscription attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// State reachable from both the publisher handle and its listener task.
struct Shared {
    publisher_id: String,
    channel: String,
    subscriber: OnceLock<Arc<dyn RefreshSubscriber>>,
    #[cfg(feature = "metrics")]
    metrics: Option<NotificationMetrics>,
}

impl Shared {
    async fn handle_message(&self, incoming: Option<&str>) -> bool {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_message();
        }

        if incoming == Some(self.publisher_id.as_str()) {
            trace!(
                "Ignoring own change announcement on '{}' ({})",
                self.channel, self.publisher_id
            );
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_suppressed();
            }
            return false;
        }

        let Some(subscriber) = self.subscriber.get() else {
            trace!("Change on '{}' with no subscriber bound", self.channel);
            return false;
        };

        debug!(
            "Refreshing after change on '{}' from {}",
            self.channel,
            incoming.unwrap_or("<unknown>")
        );

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_refresh());

        // A failing subscriber must not take the listener down with it.
        let outcome = AssertUnwindSafe(subscriber.refresh()).catch_unwind().await;
        match &outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Subscriber refresh failed on '{}': {}", self.channel, e),
            Err(_) => warn!("Subscriber refresh panicked on '{}'", self.channel),
        }

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            if matches!(outcome, Ok(Ok(()))) {
                metrics.record_refresh_success(timer);
            } else {
                metrics.record_refresh_failure(timer);
            }
        }

        true
    }
}

/// Announces local changes on a pub/sub channel and refreshes its subscriber
/// when some other instance announces one.
///
/// Construction validates its arguments, duplicates the connection and starts
/// listening on the channel in a background task. The listener runs for as
/// long as the publisher is alive, whether or not a subscriber has been bound.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::backend::RedisConnection;
/// use redis_config_store::notify::PubSubChangePublisher;
///
/// # async fn example() -> redis_config_store::error::Result<()> {
/// let connection = RedisConnection::open("redis://127.0.0.1:6379")?;
/// let publisher = PubSubChangePublisher::new(connection, "my-config-channel")?;
/// publisher.wait_until_listening().await?;
///
/// // Tell every other process that something changed
/// publisher.publish().await?;
/// # Ok(())
/// # }
/// ```
pub struct PubSubChangePublisher<C: StoreConnection> {
    connection: C,
    shared: Arc<Shared>,
    listen_state: watch::Receiver<ListenState>,
    listener: JoinHandle<()>,
}

impl<C: StoreConnection> PubSubChangePublisher<C> {
    /// Create a publisher on `channel`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidArgument`] if `channel` is empty
    /// - [`ConfigError::RuntimeError`] if no tokio runtime is running
    /// - any error from duplicating the connection
    pub fn new(connection: C, channel: impl Into<String>) -> Result<Self> {
        Self::builder()
            .with_connection(connection)
            .with_channel(channel)
            .build()
    }

    /// Create a builder for a publisher.
    pub fn builder() -> PubSubChangePublisherBuilder<C> {
        PubSubChangePublisherBuilder::new()
    }

    /// The identity this instance tags its announcements with.
    pub fn publisher_id(&self) -> &str {
        &self.shared.publisher_id
    }

    /// The channel this instance publishes to and listens on.
    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    /// Whether a subscriber has been bound.
    pub fn is_subscribed(&self) -> bool {
        self.shared.subscriber.get().is_some()
    }

    /// Bind the subscriber to refresh on external changes.
    ///
    /// Binding is permanent: there is no way to unbind or replace it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadySubscribed`] if a subscriber is already bound.
    pub fn subscribe(&self, subscriber: Arc<dyn RefreshSubscriber>) -> Result<()> {
        self.shared
            .subscriber
            .set(subscriber)
            .map_err(|_| ConfigError::AlreadySubscribed)?;
        debug!("Subscriber bound to change channel '{}'", self.shared.channel);
        Ok(())
    }

    /// Announce a change to every instance listening on the channel.
    ///
    /// Transport failures are returned as-is.
    pub async fn publish(&self) -> Result<()> {
        self.connection
            .publish(&self.shared.channel, &self.shared.publisher_id)
            .await?;

        debug!(
            "Announced change on '{}' as {}",
            self.shared.channel, self.shared.publisher_id
        );
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_publish();
        }
        Ok(())
    }

    /// Process one channel message carrying `incoming` as publisher identity.
    ///
    /// Refreshes the bound subscriber unless `incoming` is this instance's own
    /// identity. A message without identity always refreshes. Subscriber
    /// failures are logged and discarded.
    ///
    /// Returns whether the subscriber was invoked.
    pub async fn handle_message(&self, incoming: Option<&str>) -> bool {
        self.shared.handle_message(incoming).await
    }

    /// Wait until the channel subscription is established.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StoreError`] if the latest subscription attempt
    /// failed. The listener keeps retrying in the background, so a later call
    /// may succeed.
    pub async fn wait_until_listening(&self) -> Result<()> {
        let mut state = self.listen_state.clone();
        let current = state
            .wait_for(|s| *s != ListenState::Connecting)
            .await
            .map_err(|_| ConfigError::StoreError("Channel listener stopped".to_string()))?
            .clone();

        match current {
            ListenState::Failed(message) => Err(ConfigError::StoreError(message)),
            ListenState::Listening | ListenState::Connecting => Ok(()),
        }
    }
}

impl<C: StoreConnection> Drop for PubSubChangePublisher<C> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl<C: StoreConnection> ConfigExtension for PubSubChangePublisher<C> {
    fn subscribe(&self, subscriber: Arc<dyn RefreshSubscriber>) -> Result<()> {
        PubSubChangePublisher::subscribe(self, subscriber)
    }

    async fn publish(&self) -> Result<()> {
        PubSubChangePublisher::publish(self).await
    }
}

/// Receive loop for one publisher.
///
/// Keeps a subscription on `channel` open for as long as the publisher is
/// alive, resubscribing with exponential backoff when subscribing fails or the
/// message stream ends.
async fn listen<C: StoreConnection>(
    connection: C,
    shared: Weak<Shared>,
    channel: String,
    state: watch::Sender<ListenState>,
) {
    let mut backoff = INITIAL_BACKOFF;

    while shared.strong_count() > 0 {
        match connection.subscribe(&channel).await {
            Ok(mut messages) => {
                info!(
                    "Listening for changes on '{}' via {}",
                    channel,
                    connection.describe()
                );
                let _ = state.send(ListenState::Listening);
                backoff = INITIAL_BACKOFF;

                while let Some(payload) = messages.next().await {
                    let Some(shared) = shared.upgrade() else {
                        debug!("Change channel '{}' listener stopped", channel);
                        return;
                    };
                    shared.handle_message(payload.as_deref()).await;
                }

                warn!(
                    "Lost subscription to change channel '{}', resubscribing in {:?}",
                    channel, backoff
                );
                let _ = state.send(ListenState::Connecting);
            }
            Err(e) => {
                warn!(
                    "Failed to subscribe to change channel '{}', retrying in {:?}: {}",
                    channel, backoff, e
                );
                let _ = state.send(ListenState::Failed(e.to_string()));
            }
        }

        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }

    debug!("Change channel '{}' listener stopped", channel);
}

/// Builder for constructing a [`PubSubChangePublisher`].
pub struct PubSubChangePublisherBuilder<C> {
    connection: Option<C>,
    channel: Option<String>,
    #[cfg(feature = "metrics")]
    metrics: Option<NotificationMetrics>,
}

impl<C: StoreConnection> PubSubChangePublisherBuilder<C> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            connection: None,
            channel: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the connection used for publishing. The listener uses a duplicate of it.
    pub fn with_connection(mut self, connection: C) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Set the channel name.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Record notification metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: NotificationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the publisher and start listening on the channel.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidArgument`] if the connection or channel is missing
    /// - [`ConfigError::RuntimeError`] if no tokio runtime is running
    pub fn build(self) -> Result<PubSubChangePublisher<C>> {
        let connection = self
            .connection
            .ok_or_else(|| ConfigError::missing("connection"))?;
        let channel = self
            .channel
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigError::missing("channel"))?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ConfigError::RuntimeError(
                "PubSubChangePublisher must be created inside a tokio runtime".to_string(),
            )
        })?;

        let listener_connection = connection.duplicate()?;

        let shared = Arc::new(Shared {
            publisher_id: Uuid::new_v4().to_string(),
            channel: channel.clone(),
            subscriber: OnceLock::new(),
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        });

        let (state_tx, state_rx) = watch::channel(ListenState::Connecting);
        let listener = runtime.spawn(listen(
            listener_connection,
            Arc::downgrade(&shared),
            channel,
            state_tx,
        ));

        Ok(PubSubChangePublisher {
            connection,
            shared,
            listen_state: state_rx,
            listener,
        })
    }
}

impl<C: StoreConnection> Default for PubSubChangePublisherBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
