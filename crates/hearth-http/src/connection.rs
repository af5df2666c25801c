//! [`ConnectionHandler`]: picks the HTTP/1.1 or HTTP/2 connection loop for
//! an already-accepted, already-TLS-terminated transport (spec.md §4.4).

use hearth_io::AsyncIo;
use hearth_service::Service;
use hearth_tls::AlpnProtocol;
use tokio::sync::watch;

use crate::{config::ServerConfig, error::CoreError, request::HTTPRequest, response::HTTPResponse};

pub struct ConnectionHandler<'a, S> {
    config: &'a ServerConfig,
    service: &'a S,
}

impl<'a, S> ConnectionHandler<'a, S>
where
    S: Service<HTTPRequest, Response = HTTPResponse>,
    S::Error: Into<crate::error::BodyError>,
{
    pub fn new(config: &'a ServerConfig, service: &'a S) -> Self {
        Self { config, service }
    }

    /// drive one connection with the protocol the channel initializer
    /// already negotiated. returns once the connection closes.
    pub async fn handle<IO>(&self, protocol: AlpnProtocol, io: IO, shutdown: watch::Receiver<bool>) -> Result<(), CoreError>
    where
        IO: AsyncIo,
    {
        match protocol {
            AlpnProtocol::Http1 => crate::h1::dispatcher::run(io, self.config, self.service, shutdown).await,
            AlpnProtocol::Http2 => crate::h2::dispatcher::run(io, self.config, self.service, shutdown).await,
        }
    }
}
