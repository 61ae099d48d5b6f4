//! Core configuration types: the store contract and the refreshing handle.

mod config_store;
mod refreshing;

pub use config_store::{ConfigMap, ConfigStore, HashConfigStore, HashConfigStoreBuilder};
pub use refreshing::RefreshingConfig;
