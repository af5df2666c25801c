//! the worker thread body: one OS thread running a current-thread Tokio
//! runtime plus a [`LocalSet`], accepting connections from a listener
//! shared with every other worker (spec.md §5 concurrency model).
//!
//! grounded on the teacher's `server::worker`, which runs the same
//! one-runtime-per-thread model; the `Rc::strong_count`-based connection
//! counter in the teacher's `worker::counter` is replaced here by driving
//! the `LocalSet` itself to completion, since `LocalSet` already resolves
//! once every spawned local task has finished.

use std::{sync::Arc, time::Duration};

use hearth_http::{ChannelInitializer, ServerConfig};
use hearth_io::net::Listener;
use hearth_service::Service;
use hearth_tls::TlsAccept;
use tokio::{sync::watch, task::LocalSet};
use tracing::Instrument;

pub(crate) fn run<T, S>(
    listener: Arc<Listener>,
    tls: Arc<T>,
    config: Arc<ServerConfig>,
    service: Arc<S>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_timeout: Duration,
) where
    T: TlsAccept<hearth_io::net::Stream> + 'static,
    S: Service<hearth_http::HTTPRequest, Response = hearth_http::HTTPResponse> + 'static,
    S::Error: Into<hearth_http::BodyError>,
{
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(%err, "failed to start worker runtime");
            return;
        }
    };

    let local = LocalSet::new();
    local.block_on(&rt, accept_until_shutdown(listener, tls, config, service, shutdown_rx));

    // the accept loop has stopped taking new connections; give whatever
    // is still in flight until `shutdown_timeout` to finish on its own.
    rt.block_on(async move {
        let _ = tokio::time::timeout(shutdown_timeout, local).await;
    });
}

async fn accept_until_shutdown<T, S>(
    listener: Arc<Listener>,
    tls: Arc<T>,
    config: Arc<ServerConfig>,
    service: Arc<S>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    T: TlsAccept<hearth_io::net::Stream> + 'static,
    S: Service<hearth_http::HTTPRequest, Response = hearth_http::HTTPResponse> + 'static,
    S::Error: Into<hearth_http::BodyError>,
{
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let tls = tls.clone();
                        let config = config.clone();
                        let service = service.clone();
                        let conn_shutdown = shutdown_rx.clone();
                        let span = tracing::debug_span!("connection", peer = %DebugPeer(&peer));
                        tokio::task::spawn_local(
                            async move {
                                let initializer = ChannelInitializer::new(&*tls, &*config, &*service);
                                if let Err(err) = initializer.initialize(stream, conn_shutdown).await {
                                    tracing::debug!(%err, "connection ended");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(err) => tracing::warn!(%err, "accept failed"),
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}

struct DebugPeer<'a>(&'a hearth_io::net::PeerAddr);

impl std::fmt::Display for DebugPeer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            hearth_io::net::PeerAddr::Tcp(addr) => write!(f, "{addr}"),
            hearth_io::net::PeerAddr::Unix(Some(path)) => write!(f, "{}", path.display()),
            hearth_io::net::PeerAddr::Unix(None) => write!(f, "unix"),
        }
    }
}
