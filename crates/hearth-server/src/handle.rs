//! [`ServerHandle`]: the public control surface over a running server —
//! `port()`, `stop()` (begin graceful shutdown) and `wait()` (block until
//! every worker has exited) (spec.md §4.7, §6).
//!
//! grounded on the teacher's `xitca_server::Handle`/`ServerFuture`, with
//! the future-based API collapsed to a blocking one since each worker
//! already owns its own runtime rather than sharing the caller's.

use std::{sync::Arc, thread::JoinHandle, time::Duration};

use tokio::sync::watch;

use crate::lifecycle::{LifecycleCell, LifecycleState};

pub struct ServerHandle {
    state: Arc<LifecycleCell>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    port: Option<u16>,
    shutdown_timeout: Duration,
}

impl ServerHandle {
    pub(crate) fn new(
        workers: Vec<JoinHandle<()>>,
        shutdown_tx: watch::Sender<bool>,
        port: Option<u16>,
        shutdown_timeout: Duration,
        initial: LifecycleState,
    ) -> Self {
        Self { state: Arc::new(LifecycleCell::new(initial)), shutdown_tx, workers, port, shutdown_timeout }
    }

    /// the bound TCP port, or `None` for a Unix-domain listener.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// begin a graceful shutdown: every worker stops accepting new
    /// connections and gives in-flight ones until `shutdown_timeout` to
    /// finish on their own. idempotent.
    pub fn stop(&self) {
        if self.state.get() == LifecycleState::Running {
            self.state.set(LifecycleState::ShuttingDown);
            let _ = self.shutdown_tx.send(true);
        }
    }

    /// block until every worker thread has exited, bounded overall by
    /// `shutdown_timeout` past the point [`stop`](Self::stop) was called.
    /// does not call `stop` itself: a caller that wants to wait on a
    /// server that is still happily running will simply wait forever.
    pub fn wait(mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.state.set(LifecycleState::Shutdown);
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}
