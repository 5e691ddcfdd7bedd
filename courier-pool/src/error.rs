use std::time::Duration;

use thiserror::Error;

/// Failure to construct a [`Pool`](crate::Pool). Fatal to startup.
#[derive(Debug, Error)]
pub enum BuildError<E> {
    #[error("Pool capacity must be at least one connection")]
    ZeroCapacity,

    /// One of the connection attempts failed. Every connection opened by the
    /// other attempts has been closed.
    #[error("Failed to establish pooled connection: {0}")]
    Establish(#[source] E),
}

/// Failure to obtain a connection from the pool. Recoverable per message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("Timed out after {0:?} waiting for an idle connection")]
    Timeout(Duration),

    #[error("Connection pool is closed")]
    Closed,
}
