//! the uniform request shape both the HTTP/1.1 and HTTP/2 paths assemble
//! into (spec.md §3 data model).

use hearth_io::bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};

use crate::byte_streamer::ByteStreamer;

/// everything about a request that is known before its body arrives.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

/// a request body in one of its three representations. small bodies are
/// read fully into a buffer before the responder is invoked; bodies past
/// the small-body threshold are promoted to `Streaming` so the responder
/// can read them incrementally (spec.md §4.2).
pub enum RequestBody {
    Empty,
    Buffered(Bytes),
    Streaming(ByteStreamer),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

pub struct HTTPRequest {
    pub head: RequestHead,
    pub body: RequestBody,
}

impl HTTPRequest {
    pub fn new(head: RequestHead, body: RequestBody) -> Self {
        Self { head, body }
    }
}
