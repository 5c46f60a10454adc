//! Error types for store operations.

use thiserror::Error;

/// Boxed error returned by application reducers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Reducer failed: {0}")]
    Reducer(#[source] BoxError),

    #[error("Unhandled action: {0}")]
    UnhandledAction(String),

    #[error("Action dispatched while a previous action is being reduced")]
    DispatchWhileReducing,

    #[error("Store has been dropped")]
    StoreDropped,

    #[error("Store has neither an initial state nor an init action")]
    MissingInitialState,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Wrap an arbitrary reducer error.
    pub fn reducer<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Reducer(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Config(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_reducer_error_keeps_source() {
        let err = StoreError::reducer("value out of range");
        assert_eq!(err.to_string(), "Reducer failed: value out of range");
        assert_eq!(err.source().unwrap().to_string(), "value out of range");
    }

    #[test]
    fn test_json_error_maps_to_config() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
