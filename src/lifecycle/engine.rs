//! Startup and shutdown ordering for the redirect engine.
//!
//! # States
//! ```text
//! Unstarted → StoreOpen → Ready → Stopping → Stopped
//! ```
//!
//! # Design Decisions
//! - Acquire store, then canned responses, then listener; release in reverse
//! - A failed listener start closes the already-opened store before reporting
//! - `Engine` only exists once `Ready`, and `terminate` consumes it, so the
//!   stop sequence cannot run twice or before startup finished
//! - A lookup whose request timed out still runs on its blocking worker and
//!   holds the store; closing waits up to the store busy timeout for it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::EngineConfig;
use crate::http::{CannedResponses, Dispatcher, HttpServer, ListenerHandle};
use crate::net::ListenerError;
use crate::store::{RedirectStore, StoreError};

/// Fatal lifecycle failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unable to open redirect store: {0}")]
    StoreOpen(#[source] StoreError),

    #[error("unable to start listener: {0}")]
    ListenerStart(#[source] ListenerError),

    #[error("unable to close redirect store: {0}")]
    StoreClose(#[source] StoreError),
}

/// Lifecycle states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unstarted,
    StoreOpen,
    Ready,
    Stopping,
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Unstarted => "unstarted",
            EngineState::StoreOpen => "store-open",
            EngineState::Ready => "ready",
            EngineState::Stopping => "stopping",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

fn transition(state: &mut EngineState, next: EngineState) {
    tracing::info!(from = %state, to = %next, "Engine state changed");
    *state = next;
}

/// A running redirect engine: open store, canned responses and listener.
#[derive(Debug)]
pub struct Engine {
    state: EngineState,
    listener: ListenerHandle,
    canned: Arc<CannedResponses>,
    store: Arc<RedirectStore>,
    close_grace: Duration,
}

impl Engine {
    /// Open the store, build the canned responses and start listening.
    ///
    /// On error nothing is left open.
    pub async fn init(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut state = EngineState::Unstarted;

        let store = RedirectStore::open(&config.store).map_err(EngineError::StoreOpen)?;
        let store = Arc::new(store);
        transition(&mut state, EngineState::StoreOpen);

        let canned = Arc::new(CannedResponses::build());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), Arc::clone(&canned)));
        let server = HttpServer::new(&config.timeouts, dispatcher);

        let listener = match server.start(&config.listener).await {
            Ok(listener) => listener,
            Err(error) => {
                drop(canned);
                if let Err(close_error) = close_store(store, Duration::ZERO).await {
                    tracing::error!(error = %close_error, "Failed to close store after listener error");
                }
                return Err(EngineError::ListenerStart(error));
            }
        };

        transition(&mut state, EngineState::Ready);
        tracing::info!(
            address = %listener.local_addr(),
            "Redirect engine ready"
        );

        Ok(Self {
            state,
            listener,
            canned,
            store,
            close_grace: Duration::from_millis(config.store.busy_timeout_ms),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Stop the listener and drain it, release the canned responses, then
    /// close the store.
    pub async fn terminate(self) -> Result<(), EngineError> {
        let Engine {
            mut state,
            listener,
            canned,
            store,
            close_grace,
        } = self;

        transition(&mut state, EngineState::Stopping);
        listener.stop().await;

        drop(canned);
        tracing::debug!("Released canned responses");

        close_store(store, close_grace)
            .await
            .map_err(EngineError::StoreClose)?;
        transition(&mut state, EngineState::Stopped);
        Ok(())
    }
}

const CLOSE_POLL: Duration = Duration::from_millis(10);

/// Close the store once nothing else references it, waiting up to `grace`
/// for in-flight lookups to let go.
async fn close_store(mut store: Arc<RedirectStore>, grace: Duration) -> Result<(), StoreError> {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        match Arc::try_unwrap(store) {
            Ok(store) => return store.close(),
            Err(shared) if tokio::time::Instant::now() < deadline => {
                store = shared;
                tokio::time::sleep(CLOSE_POLL).await;
            }
            Err(shared) => {
                return Err(StoreError::InUse {
                    references: Arc::strong_count(&shared) - 1,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn open_store(home: &std::path::Path) -> Arc<RedirectStore> {
        let config = StoreConfig {
            home_dir: home.to_path_buf(),
            readers: 1,
            busy_timeout_ms: 1_000,
        };
        Arc::new(RedirectStore::open(&config).unwrap())
    }

    #[tokio::test]
    async fn close_waits_for_late_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        let lookup = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            std::thread::sleep(Duration::from_millis(100));
            drop(lookup);
        });

        close_store(store, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn close_gives_up_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let _held = Arc::clone(&store);

        let err = close_store(store, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, StoreError::InUse { references: 1 }));
    }

    #[tokio::test]
    async fn unshared_store_closes_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        close_store(open_store(dir.path()), Duration::ZERO)
            .await
            .unwrap();
    }
}
