//! Error types for redis-config-store.

/// Result type alias for redis-config-store operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when working with the shared configuration store.
///
/// Argument and state violations are returned straight from constructors and
/// binding calls, before any I/O is attempted. Store failures only ever come
/// back from the asynchronous operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required constructor or call argument was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A subscriber is already bound to this change publisher.
    #[error("Already subscribed")]
    AlreadySubscribed,

    /// The underlying store or transport operation failed.
    #[error("Store operation failed: {0}")]
    StoreError(String),

    /// Failed to serialize a value before writing it.
    #[error("Failed to serialize value: {0}")]
    SerializationError(String),

    /// A stored value could not be deserialized.
    #[error("Failed to deserialize value: {0}")]
    DeserializationError(String),

    /// Failed to load store settings.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// A tokio runtime is required but none is running.
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Create an invalid argument error.
    pub fn missing(what: &str) -> Self {
        Self::InvalidArgument(format!("Missing {}", what))
    }

    /// Create a store error from any displayable transport error.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreError(err.to_string())
    }

    /// Whether this error reports a missing or invalid argument.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Whether this error reports an invalid state transition.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::AlreadySubscribed)
    }

    /// Whether this error came from the underlying store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::StoreError(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for ConfigError {
    fn from(err: redis::RedisError) -> Self {
        ConfigError::StoreError(err.to_string())
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_message() {
        let err = ConfigError::missing("channel");
        assert!(err.is_argument_error());
        assert!(err.to_string().contains("Missing channel"));
    }

    #[test]
    fn test_classification() {
        assert!(ConfigError::AlreadySubscribed.is_state_error());
        assert!(ConfigError::store("connection refused").is_store_error());
        assert!(!ConfigError::Other("x".to_string()).is_store_error());
    }
}
