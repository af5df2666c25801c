//! error kinds from spec.md §7, hand-rolled in the teacher's style rather
//! than with `thiserror` — xitca-web's `http` crate has no such dependency
//! anywhere in the pack.

use std::{error, fmt, io};

/// default request/response body error type: any boxed `std::error::Error`.
pub type BodyError = Box<dyn error::Error + Send + Sync>;

#[derive(Debug)]
pub enum CoreError<RE = BodyError> {
    /// `start()` called while `Starting` or `Running`: a programmer error.
    ServerNotRunning,
    ServerShuttingDown,
    ServerShutdown,
    /// an operation was attempted on a connection already closing.
    ConnectionClosing,
    /// the request body exceeded `max_upload_size`.
    PayloadTooLarge,
    /// a codec-level parse error.
    MalformedRequest,
    /// an error the responder itself produced.
    Responder(RE),
    /// a below-HTTP IO or TLS error.
    Transport(io::Error),
}

impl<RE: fmt::Debug> fmt::Display for CoreError<RE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerNotRunning => write!(f, "server is not running"),
            Self::ServerShuttingDown => write!(f, "server is shutting down"),
            Self::ServerShutdown => write!(f, "server has shut down"),
            Self::ConnectionClosing => write!(f, "connection is closing"),
            Self::PayloadTooLarge => write!(f, "request body exceeded the configured upload limit"),
            Self::MalformedRequest => write!(f, "malformed request"),
            Self::Responder(e) => write!(f, "responder error: {e:?}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl<RE: fmt::Debug> error::Error for CoreError<RE> {}

impl<RE> From<io::Error> for CoreError<RE> {
    fn from(e: io::Error) -> Self {
        Self::Transport(e)
    }
}

/// timeout on an async task bounded by a deadline (TLS accept, H2
/// handshake, keep-alive expiry).
#[derive(Debug)]
pub enum TimeoutError {
    TlsAccept,
    H2Handshake,
    KeepAliveExpired,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Self::TlsAccept => "tls accept",
            Self::H2Handshake => "http/2 handshake",
            Self::KeepAliveExpired => "keep-alive",
        };
        write!(f, "{what} timed out")
    }
}

impl error::Error for TimeoutError {}
