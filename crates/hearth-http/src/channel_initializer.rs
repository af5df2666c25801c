//! [`ChannelInitializer`]: the fixed per-connection pipeline head — apply
//! `tcp_nodelay`, run the TLS handshake if one is configured, read the
//! negotiated ALPN protocol, and hand off to [`ConnectionHandler`]
//! (spec.md §4.6).

use std::time::Duration;

use hearth_io::net::Stream;
use hearth_tls::TlsAccept;
use tokio::sync::watch;

use crate::{
    connection::ConnectionHandler,
    config::ServerConfig,
    error::{CoreError, TimeoutError},
};

pub struct ChannelInitializer<'a, T, S> {
    tls: &'a T,
    handler: ConnectionHandler<'a, S>,
    config: &'a ServerConfig,
    tls_handshake_timeout: Duration,
}

impl<'a, T, S> ChannelInitializer<'a, T, S>
where
    T: TlsAccept<Stream>,
    S: hearth_service::Service<crate::request::HTTPRequest, Response = crate::response::HTTPResponse>,
    S::Error: Into<crate::error::BodyError>,
{
    pub fn new(tls: &'a T, config: &'a ServerConfig, service: &'a S) -> Self {
        Self {
            tls,
            handler: ConnectionHandler::new(config, service),
            config,
            tls_handshake_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }

    /// run one accepted connection from raw transport to close. `nodelay`
    /// is applied unconditionally, ahead of any TLS handshake, since there
    /// is no variant of the pipeline that bypasses it.
    pub async fn initialize(&self, stream: Stream, shutdown: watch::Receiver<bool>) -> Result<(), CoreError> {
        stream.set_nodelay(self.config.tcp_nodelay)?;

        let (io, protocol) = tokio::time::timeout(self.tls_handshake_timeout, self.tls.accept(stream))
            .await
            .map_err(|_| {
                tracing::debug!("tls handshake timed out");
                CoreError::Transport(timeout_to_io(TimeoutError::TlsAccept))
            })?
            .map_err(|e| {
                tracing::debug!(error = %e, "tls handshake failed");
                CoreError::Transport(tls_to_io(e))
            })?;

        tracing::trace!(?protocol, "channel negotiated");
        self.handler.handle(protocol, io, shutdown).await
    }
}

fn timeout_to_io(e: TimeoutError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::TimedOut, e.to_string())
}

fn tls_to_io(e: hearth_tls::TlsError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}
