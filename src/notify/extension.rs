//! Capabilities exchanged between the configuration layer and its extensions.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can reload itself when the shared configuration changed.
///
/// [`RefreshingConfig`](crate::core::RefreshingConfig) implements this for
/// itself; extensions only ever see it through this trait.
#[async_trait]
pub trait RefreshSubscriber: Send + Sync {
    /// Reload from the store.
    ///
    /// Failures are reported to the caller but refresh policies are free to
    /// ignore them.
    async fn refresh(&self) -> Result<()>;
}

/// A refresh policy and/or change publisher attached to a configuration.
#[async_trait]
pub trait ConfigExtension: Send + Sync {
    /// Bind the subscriber this extension should refresh.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadySubscribed`](crate::error::ConfigError::AlreadySubscribed)
    /// if the extension only supports a single subscriber and one is already bound.
    fn subscribe(&self, subscriber: Arc<dyn RefreshSubscriber>) -> Result<()>;

    /// Announce that the configuration was changed locally.
    ///
    /// Extensions that only refresh may keep the default no-op.
    async fn publish(&self) -> Result<()> {
        Ok(())
    }
}
