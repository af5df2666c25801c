use std::sync::Arc;

use hearth_io::AsyncIo;
use tokio_rustls::{rustls::ServerConfig, TlsAcceptor};

use super::{AlpnProtocol, TlsAccept, TlsError};

/// rustls-backed TLS front handler. `alpn_protocols` drives what
/// [`AlpnProtocol`] is reported after the handshake; callers that want the
/// HTTP/1.1→HTTP/2 secure-upgrade initializer must include both `b"h2"` and
/// `b"http/1.1"`.
pub struct RustlsAcceptor {
    acceptor: TlsAcceptor,
}

impl RustlsAcceptor {
    pub fn new(mut config: ServerConfig, alpn_protocols: Vec<Vec<u8>>) -> Self {
        config.alpn_protocols = alpn_protocols;
        Self { acceptor: TlsAcceptor::from(Arc::new(config)) }
    }
}

impl<St> TlsAccept<St> for RustlsAcceptor
where
    St: AsyncIo,
{
    type Stream = tokio_rustls::server::TlsStream<St>;

    async fn accept(&self, io: St) -> Result<(Self::Stream, AlpnProtocol), TlsError> {
        let stream = self.acceptor.accept(io).await.map_err(TlsError::from)?;
        let protocol = stream
            .get_ref()
            .1
            .alpn_protocol()
            .map(AlpnProtocol::from_wire_id)
            .unwrap_or(AlpnProtocol::Http1);
        Ok((stream, protocol))
    }
}
