//! [`BindAddress`], [`Listener`] and [`Stream`]: the TCP/Unix abstraction the
//! server lifecycle binds and accepts on.

use std::{io, path::PathBuf};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

/// where a listener is bound. immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindAddress {
    /// `host:port`. port `0` means "let the OS pick one"; the bound port is
    /// observable through `Listener::local_port` after the listener is created.
    Tcp { host: String, port: u16 },
    /// a unix domain socket path.
    Unix(PathBuf),
}

impl BindAddress {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp { host: host.into(), port }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }

    pub fn requested_port(&self) -> Option<u16> {
        match self {
            Self::Tcp { port, .. } => Some(*port),
            Self::Unix(_) => None,
        }
    }
}

/// socket options applied at bind time. `tcp_nodelay` is a per-connection
/// option and lives on `Stream::set_nodelay` instead.
#[derive(Clone, Copy, Debug)]
pub struct ListenerConfig {
    pub backlog: u32,
    pub reuse_address: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { backlog: 1024, reuse_address: true }
    }
}

/// a bound, listening socket. one exists per worker thread for a TCP bind
/// (the underlying fd is shared via `Arc`), or a single shared instance for
/// a unix bind.
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    pub fn bind(address: &BindAddress, config: ListenerConfig) -> io::Result<Self> {
        match address {
            BindAddress::Tcp { host, port } => {
                let addr = format!("{host}:{port}").parse().map_err(|e| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid bind address: {e}"))
                })?;
                let socket = build_tcp_socket(&addr, config)?;
                socket.listen(config.backlog as i32)?;
                socket.set_nonblocking(true)?;
                Ok(Self::Tcp(TcpListener::from_std(socket.into())?))
            }
            BindAddress::Unix(path) => {
                let _ = std::fs::remove_file(path);
                Ok(Self::Unix(UnixListener::bind(path)?))
            }
        }
    }

    pub async fn accept(&self) -> io::Result<(Stream, PeerAddr)> {
        match self {
            Self::Tcp(l) => {
                let (stream, addr) = l.accept().await?;
                Ok((Stream::Tcp(stream), PeerAddr::Tcp(addr)))
            }
            Self::Unix(l) => {
                let (stream, addr) = l.accept().await?;
                Ok((Stream::Unix(stream), PeerAddr::Unix(addr.as_pathname().map(PathBuf::from))))
            }
        }
    }

    pub fn local_port(&self) -> Option<u16> {
        match self {
            Self::Tcp(l) => l.local_addr().ok().map(|a| a.port()),
            Self::Unix(_) => None,
        }
    }
}

fn build_tcp_socket(addr: &std::net::SocketAddr, config: ListenerConfig) -> io::Result<Socket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if config.reuse_address {
        socket.set_reuse_address(true)?;
    }
    socket.bind(&(*addr).into())?;
    Ok(socket)
}

#[derive(Clone, Debug)]
pub enum PeerAddr {
    Tcp(std::net::SocketAddr),
    Unix(Option<PathBuf>),
}

/// accepted connection transport.
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Stream {
    /// `SO_NODELAY` is meaningful only for the TCP path; a unix socket has
    /// no Nagle algorithm to disable, so this is a no-op there rather than
    /// an error.
    pub fn set_nodelay(&self, enabled: bool) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.set_nodelay(enabled),
            Self::Unix(_) => Ok(()),
        }
    }
}

impl tokio::io::AsyncRead for Stream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            Self::Unix(s) => std::pin::Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for Stream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            Self::Unix(s) => std::pin::Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => std::pin::Pin::new(s).poll_flush(cx),
            Self::Unix(s) => std::pin::Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            Self::Unix(s) => std::pin::Pin::new(s).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_ephemeral_port_is_observable() {
        let listener = Listener::bind(&BindAddress::tcp("127.0.0.1", 0), ListenerConfig::default()).unwrap();
        assert!(listener.local_port().unwrap() > 0);
    }
}
