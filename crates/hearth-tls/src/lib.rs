//! the TLS engine contract consumed by the core: a stream handler that sits
//! at pipeline-head, transparently encrypts/decrypts, and surfaces the
//! ALPN-negotiated protocol so [`ChannelInitializer`](../hearth_http)
//! can choose between HTTP/1.1 and HTTP/2.
//!
//! TLS context construction, certificate loading and cipher policy stay an
//! explicit non-goal: this crate only describes the interface and, behind
//! the `rustls` feature, one concrete implementation of it.

use std::{fmt, future::Future, io};

use hearth_io::AsyncIo;

#[cfg(feature = "rustls")]
pub mod rustls;

/// protocol an ALPN negotiation settled on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlpnProtocol {
    Http1,
    Http2,
}

impl AlpnProtocol {
    /// parse the wire ALPN identifier (`"h2"` / `"http/1.1"`). anything else
    /// is treated as HTTP/1.1, the universally-understood fallback.
    pub fn from_wire_id(id: &[u8]) -> Self {
        if id == b"h2" {
            Self::Http2
        } else {
            Self::Http1
        }
    }
}

#[derive(Debug)]
pub struct TlsError(pub Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tls handshake failed: {}", self.0)
    }
}

impl std::error::Error for TlsError {}

impl From<io::Error> for TlsError {
    fn from(e: io::Error) -> Self {
        Self(Box::new(e))
    }
}

/// the leading TLS handler slot: accepts a plaintext transport and produces
/// an encrypted one plus the negotiated ALPN protocol, or fails the
/// handshake.
pub trait TlsAccept<St> {
    type Stream: AsyncIo;

    fn accept(&self, io: St) -> impl Future<Output = Result<(Self::Stream, AlpnProtocol), TlsError>>;
}

/// the absence of a leading TLS handler: passes the transport through
/// unchanged and reports HTTP/1.1, since there is no ALPN negotiation to
/// consult.
#[derive(Clone, Copy, Default)]
pub struct NoTls;

impl<St> TlsAccept<St> for NoTls
where
    St: AsyncIo,
{
    type Stream = St;

    async fn accept(&self, io: St) -> Result<(St, AlpnProtocol), TlsError> {
        Ok((io, AlpnProtocol::Http1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpn_defaults_to_http1() {
        assert_eq!(AlpnProtocol::from_wire_id(b"spdy/3"), AlpnProtocol::Http1);
        assert_eq!(AlpnProtocol::from_wire_id(b"h2"), AlpnProtocol::Http2);
    }
}
