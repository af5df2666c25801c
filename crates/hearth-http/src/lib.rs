//! the connection-and-request core: accepts a transport already produced
//! by a TLS front (or none), assembles it into a uniform [`HTTPRequest`],
//! invokes a [`Service`](hearth_service::Service) responder, and writes
//! back an [`HTTPResponse`] — for both HTTP/1.1 and HTTP/2.
//!
//! grounded on the teacher's `xitca-http` crate; protocol framing is split
//! the same way (`h1`/`h2` submodules) while the request-assembly and
//! response-writing stages spec.md names are pulled out as their own
//! modules rather than inlined into the dispatcher.

pub mod assembler;
pub mod byte_streamer;
pub mod channel_initializer;
pub mod config;
pub mod connection;
pub mod error;
#[cfg(feature = "http1")]
pub mod h1;
#[cfg(feature = "http2")]
pub mod h2;
pub mod h2_tracker;
pub mod request;
pub mod response;
pub mod writer;

pub use byte_streamer::{ByteStreamer, ByteStreamerProducer};
pub use channel_initializer::ChannelInitializer;
pub use config::{Builder, IdleTimeouts, ServerConfig};
pub use connection::ConnectionHandler;
pub use error::{BodyError, CoreError, TimeoutError};
pub use request::{HTTPRequest, RequestBody, RequestHead};
pub use response::{BodySize, HTTPResponse, ResponseBody, ResponseHead};
