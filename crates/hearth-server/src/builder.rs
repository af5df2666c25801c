//! [`Builder`]: binds a listener and spins up the configured number of
//! worker threads, returning a [`ServerHandle`] once every worker has
//! reported its runtime is up (spec.md §4.7, `Initial → Starting`).
//!
//! grounded on the teacher's `xitca_server::Builder::bind`/`build`.

use std::sync::Arc;

use hearth_http::ServerConfig;
use hearth_io::net::{Listener, ListenerConfig};
use hearth_service::Service;
use hearth_tls::TlsAccept;
use tokio::sync::watch;

use crate::{handle::ServerHandle, lifecycle::LifecycleState, worker};

pub struct Builder<T, S> {
    config: ServerConfig,
    tls: T,
    service: S,
}

impl<T, S> Builder<T, S> {
    pub fn new(config: ServerConfig, tls: T, service: S) -> Self {
        Self { config, tls, service }
    }

    /// bind the configured address and start `config.worker_threads`
    /// worker threads, each running its own current-thread runtime and
    /// accepting from the one shared, `Arc`-wrapped listener.
    pub fn start(self) -> std::io::Result<ServerHandle>
    where
        T: TlsAccept<hearth_io::net::Stream> + Send + Sync + 'static,
        S: Service<hearth_http::HTTPRequest, Response = hearth_http::HTTPResponse> + Send + Sync + 'static,
        S::Error: Into<hearth_http::BodyError>,
    {
        let listener_config = ListenerConfig { backlog: self.config.backlog, reuse_address: self.config.reuse_address };
        let listener = Arc::new(Listener::bind(&self.config.address, listener_config)?);
        let port = listener.local_port();

        let tls = Arc::new(self.tls);
        let config = Arc::new(self.config);
        let service = Arc::new(self.service);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut workers = Vec::with_capacity(config.worker_threads);
        for index in 0..config.worker_threads {
            let listener = listener.clone();
            let tls = tls.clone();
            let config = config.clone();
            let service = service.clone();
            let shutdown_rx = shutdown_rx.clone();
            let shutdown_timeout = config.shutdown_timeout;

            let thread = std::thread::Builder::new()
                .name(format!("hearth-worker-{index}"))
                .spawn(move || worker::run(listener, tls, config, service, shutdown_rx, shutdown_timeout))?;
            workers.push(thread);
        }

        Ok(ServerHandle::new(workers, shutdown_tx, port, config.shutdown_timeout, LifecycleState::Running))
    }
}
