//! Configuration change notification system.
//!
//! Announces local changes to every other process sharing a channel, refreshes
//! on changes made elsewhere, and fans refreshed snapshots out to local callbacks.

pub mod extension;
pub mod publisher;
pub mod subscriber;

pub use extension::{ConfigExtension, RefreshSubscriber};
pub use publisher::{PubSubChangePublisher, PubSubChangePublisherBuilder};
pub use subscriber::{SubscriberRegistry, SubscriptionHandle};
