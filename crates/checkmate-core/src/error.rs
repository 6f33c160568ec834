//! Core error types.

use thiserror::Error;

use crate::continuity::SubscriberId;

/// Errors reported by the continuity and credential primitives.
///
/// Failures local to a single subscriber or credential are recovered
/// internally; only structural misuse surfaces here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A subscriber was released that is not parked in the registry.
    #[error("subscriber {0} is not parked")]
    UnknownSubscriber(SubscriberId),

    /// A subscriber was parked while already parked in the registry.
    #[error("subscriber {0} is already parked")]
    AlreadyParked(SubscriberId),

    /// The registry has been torn down and accepts no new subscribers.
    #[error("registry '{0}' is closed")]
    RegistryClosed(String),
}

/// Failure of a single transport-level write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The peer went away.
    #[error("stream closed")]
    Closed,

    /// The underlying transport reported an error.
    #[error("io error: {0}")]
    Io(String),

    /// The write did not settle within the delivery timeout.
    #[error("write timed out")]
    TimedOut,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
