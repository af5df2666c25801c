//! the uniform response shape a responder hands back to the core
//! (spec.md §3), and the framing decision ([`BodySize`]) the response
//! writer derives from it.

use std::pin::Pin;

use futures_core::Stream;
use hearth_io::bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

use crate::error::BodyError;

#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self { status, version: Version::HTTP_11, headers: HeaderMap::new() }
    }
}

pub type BoxBodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BodyError>>>>;

/// a response body as handed back by a responder. `Sized` bodies carry a
/// known length up front and are framed with `Content-Length`; `Streamed`
/// bodies have no length known in advance and are framed chunked on
/// HTTP/1.1 or as ordinary DATA frames on HTTP/2.
pub enum ResponseBody {
    Empty,
    Sized(Bytes),
    Streamed(BoxBodyStream),
}

impl ResponseBody {
    pub fn size_hint(&self) -> BodySize {
        match self {
            Self::Empty => BodySize::Known(0),
            Self::Sized(b) => BodySize::Known(b.len() as u64),
            Self::Streamed(_) => BodySize::Unknown,
        }
    }
}

/// framing decision the response writer makes from a body's size hint
/// (spec.md §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodySize {
    Known(u64),
    Unknown,
}

pub struct HTTPResponse {
    pub head: ResponseHead,
    pub body: ResponseBody,
}

impl HTTPResponse {
    pub fn new(status: StatusCode) -> Self {
        Self { head: ResponseHead::new(status), body: ResponseBody::Empty }
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }
}
