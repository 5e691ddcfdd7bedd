//! In-memory connector for exercising the pool without a network.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_pool::{Connection, Connector};

/// A connection that only tracks whether it is still open.
#[derive(Debug)]
pub struct FakeConnection {
    pub id: usize,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn close(self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeConnector {
    calls: AtomicUsize,
    open: Arc<AtomicUsize>,
    fail_on: Option<usize>,
    delay: Option<Duration>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `call`-th connection attempt (1-indexed).
    #[must_use]
    pub const fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    /// Delay every attempt, so siblings are still in flight when one fails.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Connections opened and not yet closed.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;
    type Error = io::Error;

    async fn connect(&self) -> Result<FakeConnection, io::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on == Some(call) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("attempt {call} refused"),
            ));
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            id: call,
            open: Arc::clone(&self.open),
        })
    }
}
