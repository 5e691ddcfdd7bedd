//! A fixed-size pool of pre-established, stateful connections.
//!
//! The pool is filled once at construction by fanning out to a [`Connector`]
//! and is never resized afterwards. Callers borrow connections through
//! [`Pool::acquire`], which waits at most the configured acquire timeout, and
//! hand them back through [`Checkout::release`] or, when the connection can no
//! longer be trusted, [`Checkout::discard`].
//!
//! ```no_run
//! use courier_pool::{Pool, PoolConfig};
//! # use courier_pool::{Connection, Connector};
//! # struct Conn;
//! # #[async_trait::async_trait]
//! # impl Connection for Conn { async fn close(self) {} }
//! # struct Dialer;
//! # #[async_trait::async_trait]
//! # impl Connector for Dialer {
//! #     type Connection = Conn;
//! #     type Error = std::io::Error;
//! #     async fn connect(&self) -> Result<Conn, std::io::Error> { Ok(Conn) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Pool::new(&PoolConfig::default(), &Dialer).await?;
//!
//! let connection = pool.acquire().await?;
//! // ... use the connection ...
//! connection.release();
//!
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod pool;

pub use config::PoolConfig;
pub use connection::{Connection, Connector};
pub use error::{AcquireError, BuildError};
pub use pool::{Checkout, Pool, PoolState, PoolStatus};
