use mql_query::ParseError;
use thiserror::Error;

/// Errors raised while managing registrations. Per-event evaluation never fails.
#[derive(Error, Debug)]
pub enum MqlError {
    #[error("Query '{subscription_id}' rejected: {source}")]
    Parse {
        subscription_id: String,
        source: ParseError,
    },

    #[error("Subscription '{0}' is already registered")]
    DuplicateSubscription(String),

    #[error("Subscription '{0}' is not registered")]
    UnknownSubscription(String),

    #[error("Registry is full ({limit} queries)")]
    CapacityExceeded { limit: usize },

    #[error("Invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}
