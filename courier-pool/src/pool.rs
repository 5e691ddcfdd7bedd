use std::{
    collections::VecDeque,
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Duration,
};

use courier_common::{internal, tracing};
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::{AcquireError, BuildError, Connection, Connector, PoolConfig};

/// Lifecycle of a [`Pool`].
///
/// A pool only exists once it has been filled, so there is no value for the
/// construction phase: [`Pool::new`] either returns a `Ready` pool or an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Serving acquisitions.
    Ready,
    /// [`Pool::close`] is tearing down the idle connections.
    Draining,
    /// Every idle connection has been closed. Connections still checked out
    /// are closed when they come back.
    Closed,
}

/// A point-in-time view of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub state: PoolState,
    /// Connections opened at construction.
    pub capacity: usize,
    /// Connections neither discarded nor closed, idle or checked out.
    pub live: usize,
    pub idle: usize,
    pub checked_out: usize,
}

struct Slots<C> {
    state: PoolState,
    idle: VecDeque<C>,
    live: usize,
    checked_out: usize,
}

struct Shared<C> {
    slots: Mutex<Slots<C>>,
    /// One permit per connection in `slots.idle`. Permits are added only
    /// after the connection has been pushed, so a permit holder always finds
    /// a connection to pop.
    available: Semaphore,
    capacity: usize,
    acquire_timeout: Duration,
}

impl<C: Connection> Shared<C> {
    fn put_back(&self, connection: C) {
        let mut slots = self.slots.lock();
        slots.checked_out -= 1;

        if slots.state == PoolState::Ready {
            slots.idle.push_back(connection);
            drop(slots);
            self.available.add_permits(1);
            return;
        }

        slots.live -= 1;
        drop(slots);
        tracing::debug!("Connection returned to a closed pool, closing it");
        close_detached(connection);
    }

    /// Removes a checked out connection from the books, returning how many
    /// live connections remain.
    fn forget(&self) -> usize {
        let mut slots = self.slots.lock();
        slots.checked_out -= 1;
        slots.live -= 1;
        slots.live
    }
}

/// Closes a connection without waiting for it, for use where we cannot await.
fn close_detached<C: Connection>(connection: C) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(connection.close());
    } else {
        drop(connection);
    }
}

/// A fixed-size pool of established connections.
///
/// Cloning is cheap and every clone refers to the same set of connections.
pub struct Pool<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connection> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("status", &self.status()).finish()
    }
}

impl<C: Connection> Pool<C> {
    /// Opens `config.capacity` connections concurrently and waits for all of
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ZeroCapacity`] for an empty pool, or
    /// [`BuildError::Establish`] with the first failure if any attempt fails.
    /// In the latter case every connection that did open is closed before
    /// returning.
    pub async fn new<K>(config: &PoolConfig, connector: &K) -> Result<Self, BuildError<K::Error>>
    where
        K: Connector<Connection = C>,
    {
        let capacity = config.capacity;
        if capacity == 0 {
            return Err(BuildError::ZeroCapacity);
        }

        internal!(level = DEBUG, "Opening {} pooled connections", capacity);

        let attempts = join_all((0..capacity).map(|_| connector.connect())).await;

        let mut established = Vec::with_capacity(capacity);
        let mut failure = None;
        for attempt in attempts {
            match attempt {
                Ok(connection) => established.push(connection),
                Err(err) if failure.is_none() => failure = Some(err),
                Err(err) => tracing::debug!("Additional connection attempt failed: {err}"),
            }
        }

        if let Some(err) = failure {
            tracing::error!(
                opened = established.len(),
                capacity,
                "Connection pool construction failed, closing opened connections: {err}"
            );
            join_all(established.into_iter().map(|connection| connection.close())).await;
            return Err(BuildError::Establish(err));
        }

        internal!(level = INFO, "Connection pool ready with {} connections", capacity);

        Ok(Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Slots {
                    state: PoolState::Ready,
                    idle: established.into(),
                    live: capacity,
                    checked_out: 0,
                }),
                available: Semaphore::new(capacity),
                capacity,
                acquire_timeout: config.acquire_timeout(),
            }),
        })
    }

    /// Takes an idle connection, waiting up to the acquire timeout for one to
    /// be released.
    ///
    /// Waiters are served in arrival order.
    ///
    /// # Errors
    ///
    /// [`AcquireError::Timeout`] if no connection became idle in time, and
    /// [`AcquireError::Closed`] if the pool is closing or closed. Neither
    /// outcome changes the pool.
    pub async fn acquire(&self) -> Result<Checkout<C>, AcquireError> {
        let timeout = self.shared.acquire_timeout;

        let permit = match tokio::time::timeout(timeout, self.shared.available.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(AcquireError::Closed),
            Err(_) => {
                tracing::debug!(?timeout, "Timed out waiting for an idle connection");
                return Err(AcquireError::Timeout(timeout));
            }
        };
        // The connection itself stands in for the permit until it is put back.
        permit.forget();

        let mut slots = self.shared.slots.lock();
        if slots.state != PoolState::Ready {
            return Err(AcquireError::Closed);
        }
        let Some(connection) = slots.idle.pop_front() else {
            return Err(AcquireError::Closed);
        };
        slots.checked_out += 1;
        drop(slots);

        Ok(Checkout {
            connection: Some(connection),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Closes every idle connection and refuses further acquisitions.
    ///
    /// Does not wait for checked out connections; those are closed when they
    /// are released or discarded. Calling this more than once is harmless.
    pub async fn close(&self) {
        let idle = {
            let mut slots = self.shared.slots.lock();
            if slots.state != PoolState::Ready {
                return;
            }
            slots.state = PoolState::Draining;
            slots.live -= slots.idle.len();
            std::mem::take(&mut slots.idle)
        };
        self.shared.available.close();

        internal!(level = INFO, "Closing {} idle pooled connections", idle.len());
        join_all(idle.into_iter().map(|connection| connection.close())).await;

        let mut slots = self.shared.slots.lock();
        slots.state = PoolState::Closed;
        if slots.checked_out > 0 {
            tracing::warn!(
                checked_out = slots.checked_out,
                "Connection pool closed while connections are still checked out"
            );
        }
    }

    #[must_use]
    pub fn state(&self) -> PoolState {
        self.shared.slots.lock().state
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let slots = self.shared.slots.lock();
        PoolStatus {
            state: slots.state,
            capacity: self.shared.capacity,
            live: slots.live,
            idle: slots.idle.len(),
            checked_out: slots.checked_out,
        }
    }
}

/// Exclusive use of one pooled connection.
///
/// Only [`Checkout::release`] hands the connection back for reuse. Dropping
/// the guard any other way, including cancelling the task that holds it,
/// closes the connection in the background as [`Checkout::discard`] does,
/// since it may be mid-protocol with replies still unread.
pub struct Checkout<C: Connection> {
    connection: Option<C>,
    shared: Arc<Shared<C>>,
}

impl<C: Connection> Checkout<C> {
    /// Returns the connection to the idle set without checking its health.
    pub fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            self.shared.put_back(connection);
        }
    }

    /// Closes the connection and removes it from the pool for good.
    pub async fn discard(mut self) {
        if let Some(connection) = self.connection.take() {
            self.untrack("Discarded pooled connection");
            connection.close().await;
        }
    }

    fn untrack(&self, reason: &str) {
        let live = self.shared.forget();
        if live == 0 {
            tracing::warn!("{reason}, no live pooled connections remain, acquisitions will time out");
        } else {
            tracing::debug!(live, "{reason}");
        }
    }
}

impl<C: Connection> Deref for Checkout<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.connection
            .as_ref()
            .expect("connection is present until the checkout is consumed")
    }
}

impl<C: Connection> DerefMut for Checkout<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.connection
            .as_mut()
            .expect("connection is present until the checkout is consumed")
    }
}

impl<C: Connection> Drop for Checkout<C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.untrack("Checkout dropped without release, closing its connection");
            close_detached(connection);
        }
    }
}

impl<C: Connection> fmt::Debug for Checkout<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout")
            .field("held", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}
