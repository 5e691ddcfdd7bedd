use async_trait::async_trait;

/// A stateful connection that can be torn down explicitly.
#[async_trait]
pub trait Connection: Send + Sized + 'static {
    /// Closes the connection, consuming it.
    ///
    /// Failures are not reported: the connection is gone either way.
    async fn close(self);
}

/// Opens ready-to-use connections for a [`Pool`](crate::Pool).
///
/// Implementations must be safe to call concurrently, the pool invokes
/// [`Connector::connect`] once per slot at the same time.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens one connection. A failed attempt must not leave anything open.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;
}
