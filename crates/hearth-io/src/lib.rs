//! async network io types shared by the http core and the server lifecycle.

pub mod net;

pub mod bytes {
    pub use bytes::{Buf, BufMut, Bytes, BytesMut};
}

use tokio::io::{AsyncRead, AsyncWrite};

/// marker trait for a connection's transport: a unified read/write half that
/// the http core drives without caring whether TLS sits in front of it.
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
