//! [`RequestAssembler`]: decides, per request, whether a body is small
//! enough to buffer whole or must be handed to the responder as a
//! [`ByteStreamer`] (spec.md §4.2).
//!
//! protocol-specific head parsing (httparse for HTTP/1.1, `h2`'s own header
//! decode for HTTP/2) lives in the `h1`/`h2` modules; this is the shared
//! decision the teacher's dispatcher makes inline but spec.md promotes to
//! its own component.

use futures_util::StreamExt;
use hearth_io::bytes::{Bytes, BytesMut};

use crate::{
    byte_streamer::ByteStreamer,
    error::CoreError,
    request::{HTTPRequest, RequestBody, RequestHead},
};

pub struct RequestAssembler {
    /// bodies at or below this size are buffered whole before the
    /// responder is invoked; larger bodies are streamed.
    small_body_threshold: u64,
}

impl RequestAssembler {
    pub fn new(small_body_threshold: u64) -> Self {
        Self { small_body_threshold }
    }

    /// assemble a full request from its head and a body source already
    /// wired to the transport. `content_length` is `None` for chunked or
    /// bodyless requests.
    pub async fn assemble(
        &self,
        head: RequestHead,
        content_length: Option<u64>,
        body: ByteStreamer,
    ) -> Result<HTTPRequest, CoreError> {
        if content_length == Some(0) {
            return Ok(HTTPRequest::new(head, RequestBody::Empty));
        }

        if let Some(len) = content_length {
            if len > self.small_body_threshold {
                return Ok(HTTPRequest::new(head, RequestBody::Streaming(body)));
            }
        }

        self.buffer_or_promote(head, body).await
    }

    async fn buffer_or_promote(
        &self,
        head: RequestHead,
        mut body: ByteStreamer,
    ) -> Result<HTTPRequest, CoreError> {
        let mut buffered = BytesMut::new();

        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    let prospective = buffered.len() as u64 + chunk.len() as u64;
                    if prospective > self.small_body_threshold {
                        body.unread(chunk);
                        if !buffered.is_empty() {
                            body.unread(std::mem::replace(&mut buffered, BytesMut::new()).freeze());
                        }
                        return Ok(HTTPRequest::new(head, RequestBody::Streaming(body)));
                    }
                    buffered.extend_from_slice(&chunk);
                }
                Some(Err(e)) => return Err(e),
                None => {
                    let body = if buffered.is_empty() {
                        RequestBody::Empty
                    } else {
                        RequestBody::Buffered(Bytes::from(buffered))
                    };
                    return Ok(HTTPRequest::new(head, body));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_streamer::ByteStreamer as Streamer;
    use http::{HeaderMap, Method, Uri, Version};

    fn head() -> RequestHead {
        RequestHead {
            method: Method::GET,
            uri: Uri::from_static("/"),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn small_body_is_buffered() {
        let (tx, rx) = Streamer::channel(1024);
        tx.feed_bytes(Bytes::from_static(b"hi"));
        tx.feed_end();

        let assembler = RequestAssembler::new(16);
        let req = assembler.assemble(head(), Some(2), rx).await.unwrap();
        match req.body {
            RequestBody::Buffered(b) => assert_eq!(&b[..], b"hi"),
            _ => panic!("expected buffered body"),
        }
    }

    #[tokio::test]
    async fn oversized_content_length_goes_straight_to_streaming() {
        // dropping an unconsumed `Streaming` body spawns a background drain
        // task, which needs a `LocalSet` to land in.
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (tx, rx) = Streamer::channel(1024);
                tx.feed_end();
                let assembler = RequestAssembler::new(4);
                let req = assembler.assemble(head(), Some(100), rx).await.unwrap();
                assert!(matches!(req.body, RequestBody::Streaming(_)));
            })
            .await;
    }

    #[tokio::test]
    async fn chunked_body_promotes_once_threshold_is_exceeded() {
        let (tx, rx) = Streamer::channel(1024);
        tx.feed_bytes(Bytes::from_static(b"0123456789"));
        tx.feed_end();

        let assembler = RequestAssembler::new(4);
        let req = assembler.assemble(head(), None, rx).await.unwrap();
        match req.body {
            RequestBody::Streaming(mut s) => {
                let mut out = Vec::new();
                while let Some(chunk) = s.next().await {
                    out.extend_from_slice(&chunk.unwrap());
                }
                assert_eq!(out, b"0123456789");
            }
            _ => panic!("expected promoted streaming body"),
        }
    }
}
