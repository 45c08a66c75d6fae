//! Lazy, shared connection lifecycle.
//!
//! A [`ConnectionManager`] owns the connector of a store and at most one live
//! backend handle. The first [`acquire`](ConnectionManager::acquire) starts a
//! connection attempt; every caller arriving while it is in flight awaits the
//! same shared attempt, so concurrent callers never trigger a second connect.

use std::sync::Arc;

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use mea::mutex::Mutex;

use crate::{
    backend::{Connector, DocumentBackend},
    error::DocumentStoreResult,
};

type PendingConnection<B> = Shared<BoxFuture<'static, DocumentStoreResult<B>>>;

enum Phase<B: DocumentBackend> {
    Disconnected,
    Connecting(PendingConnection<B>),
    Connected(B),
}

struct ConnectionState<B: DocumentBackend> {
    /// Bumped whenever a new attempt starts or the connection is released, so
    /// a waiter only publishes the outcome of the attempt it awaited.
    generation: u64,
    phase: Phase<B>,
}

/// Holds at most one live connection handle for a store.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    state: Mutex<ConnectionState<C::Backend>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager that has not connected yet.
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            state: Mutex::new(ConnectionState {
                generation: 0,
                phase: Phase::Disconnected,
            }),
        }
    }

    /// Returns the connector used to establish connections.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the shared connection handle, establishing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the connector's error to every caller that awaited the failed
    /// attempt. The next call after a failure starts a fresh attempt.
    pub async fn acquire(&self) -> DocumentStoreResult<C::Backend> {
        let (generation, pending) = {
            let mut state = self.state.lock().await;

            match &state.phase {
                Phase::Connected(backend) => return Ok(backend.clone()),
                Phase::Connecting(pending) => (state.generation, pending.clone()),
                Phase::Disconnected => {
                    tracing::debug!("establishing connection");

                    let connector = Arc::clone(&self.connector);
                    let pending = async move { connector.connect().await }
                        .boxed()
                        .shared();

                    state.generation += 1;
                    state.phase = Phase::Connecting(pending.clone());
                    (state.generation, pending)
                }
            }
        };

        let result = pending.await;

        let mut state = self.state.lock().await;
        if state.generation == generation && matches!(state.phase, Phase::Connecting(_)) {
            state.phase = match &result {
                Ok(backend) => {
                    tracing::info!("connection established");
                    Phase::Connected(backend.clone())
                }
                Err(err) => {
                    tracing::warn!(error = %err, "connection attempt failed");
                    Phase::Disconnected
                }
            };
        }

        result
    }

    /// Closes the connection if one is open and resets to "not connected".
    ///
    /// Calling this while never connected is a no-op success. An attempt in
    /// flight is awaited and its handle closed.
    pub async fn release(&self) -> DocumentStoreResult<()> {
        let phase = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            std::mem::replace(&mut state.phase, Phase::Disconnected)
        };

        let backend = match phase {
            Phase::Disconnected => return Ok(()),
            Phase::Connected(backend) => backend,
            Phase::Connecting(pending) => match pending.await {
                Ok(backend) => backend,
                Err(_) => return Ok(()),
            },
        };

        backend.close().await?;
        tracing::info!("connection closed");

        Ok(())
    }

    /// Returns `true` while a connection attempt is in flight.
    pub async fn is_connecting(&self) -> bool {
        matches!(self.state.lock().await.phase, Phase::Connecting(_))
    }

    /// Returns `true` once a connection has been established and not released.
    pub async fn is_connected(&self) -> bool {
        matches!(self.state.lock().await.phase, Phase::Connected(_))
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager").finish_non_exhaustive()
    }
}
