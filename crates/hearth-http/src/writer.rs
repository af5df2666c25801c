//! [`ResponseWriter`]: serializes an [`HTTPResponse`] onto an HTTP/1.1
//! transport (spec.md §4.3). the HTTP/2 path hands the same
//! [`ResponseHead`]/[`ResponseBody`] pair to the `h2` crate's own
//! `SendResponse`/`SendStream`, which performs the equivalent framing
//! itself — see `h2::dispatcher`.

use futures_util::StreamExt;
use hearth_io::bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    error::CoreError,
    response::{BodySize, HTTPResponse, ResponseBody},
};

pub struct ResponseWriter {
    /// when disabled, header names/values are written without the
    /// visible-ASCII check the teacher's codec applies.
    validate_headers: bool,
    /// appended as a `Server` header when set (spec.md §4.3/§6).
    server_name: Option<String>,
}

impl ResponseWriter {
    pub fn new(validate_headers: bool, server_name: Option<String>) -> Self {
        Self { validate_headers, server_name }
    }

    /// write status line, headers and body to `io`, choosing
    /// `Content-Length` or chunked framing per the body's [`BodySize`]
    /// (invariant: exactly one framing header is ever emitted). `keep_alive`
    /// picks the `Connection` header value the dispatcher has already
    /// decided on for this response.
    pub async fn write_response<W>(&self, io: &mut W, response: HTTPResponse, keep_alive: bool) -> Result<(), CoreError>
    where
        W: AsyncWrite + Unpin,
    {
        let HTTPResponse { head, body } = response;
        let size = body.size_hint();

        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(b"HTTP/1.1 ");
        buf.put_slice(head.status.as_str().as_bytes());
        buf.put_slice(b" ");
        buf.put_slice(head.status.canonical_reason().unwrap_or("").as_bytes());
        buf.put_slice(b"\r\n");

        for (name, value) in head.headers.iter() {
            if self.validate_headers && !is_visible_ascii(value.as_bytes()) {
                return Err(CoreError::MalformedRequest);
            }
            buf.put_slice(name.as_str().as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(if keep_alive { b"connection: keep-alive\r\n" } else { b"connection: close\r\n" });
        if let Some(name) = self.server_name.as_deref() {
            buf.put_slice(b"server: ");
            buf.put_slice(name.as_bytes());
            buf.put_slice(b"\r\n");
        }

        match size {
            BodySize::Known(n) => {
                buf.put_slice(b"content-length: ");
                let mut tmp = itoa::Buffer::new();
                buf.put_slice(tmp.format(n).as_bytes());
                buf.put_slice(b"\r\n");
            }
            BodySize::Unknown => {
                buf.put_slice(b"transfer-encoding: chunked\r\n");
            }
        }
        buf.put_slice(b"\r\n");
        io.write_all(&buf).await?;

        match body {
            ResponseBody::Empty => {}
            ResponseBody::Sized(b) => io.write_all(&b).await?,
            ResponseBody::Streamed(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(CoreError::Responder)?;
                    if chunk.is_empty() {
                        continue;
                    }
                    let mut framed = BytesMut::with_capacity(chunk.len() + 16);
                    let mut tmp = String::new();
                    std::fmt::Write::write_fmt(&mut tmp, format_args!("{:x}", chunk.len())).ok();
                    framed.put_slice(tmp.as_bytes());
                    framed.put_slice(b"\r\n");
                    framed.put_slice(&chunk);
                    framed.put_slice(b"\r\n");
                    io.write_all(&framed).await?;
                }
                io.write_all(b"0\r\n\r\n").await?;
            }
        }

        io.flush().await?;
        Ok(())
    }
}

fn is_visible_ascii(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == b'\t' || (0x20..0x7f).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseHead;
    use http::StatusCode;
    use tokio::io::BufWriter;

    #[tokio::test]
    async fn sized_body_gets_content_length_framing() {
        let writer = ResponseWriter::new(true, None);
        let response = HTTPResponse::new(StatusCode::OK).with_body(ResponseBody::Sized(hearth_io::bytes::Bytes::from_static(b"hi")));
        let mut out = BufWriter::new(Vec::new());
        writer.write_response(&mut out, response, true).await.unwrap();
        let out = String::from_utf8(out.into_inner()).unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("connection: keep-alive\r\n"));
        assert!(out.contains("content-length: 2\r\n"));
        assert!(out.ends_with("hi"));
    }

    #[tokio::test]
    async fn empty_body_reports_zero_length() {
        let writer = ResponseWriter::new(true, None);
        let response = HTTPResponse::new(StatusCode::NO_CONTENT);
        let mut out = BufWriter::new(Vec::new());
        writer.write_response(&mut out, response, true).await.unwrap();
        let out = String::from_utf8(out.into_inner()).unwrap();
        assert!(out.contains("content-length: 0\r\n"));
    }

    #[tokio::test]
    async fn closing_response_announces_connection_close() {
        let writer = ResponseWriter::new(true, None);
        let response = HTTPResponse::new(StatusCode::OK);
        let mut out = BufWriter::new(Vec::new());
        writer.write_response(&mut out, response, false).await.unwrap();
        let out = String::from_utf8(out.into_inner()).unwrap();
        assert!(out.contains("connection: close\r\n"));
    }

    #[tokio::test]
    async fn server_name_is_appended_when_configured() {
        let writer = ResponseWriter::new(true, Some("hearth".to_string()));
        let response = HTTPResponse::new(StatusCode::OK);
        let mut out = BufWriter::new(Vec::new());
        writer.write_response(&mut out, response, true).await.unwrap();
        let out = String::from_utf8(out.into_inner()).unwrap();
        assert!(out.contains("server: hearth\r\n"));
    }

    #[tokio::test]
    async fn streamed_body_uses_chunked_framing() {
        use futures_util::stream;

        let writer = ResponseWriter::new(true, None);
        let chunks = vec![
            Ok::<_, crate::error::BodyError>(hearth_io::bytes::Bytes::from_static(b"ab")),
            Ok(hearth_io::bytes::Bytes::from_static(b"cde")),
        ];
        let body = ResponseBody::Streamed(Box::pin(stream::iter(chunks)));
        let response = HTTPResponse { head: ResponseHead::new(StatusCode::OK), body };
        let mut out = BufWriter::new(Vec::new());
        writer.write_response(&mut out, response, true).await.unwrap();
        let out = String::from_utf8(out.into_inner()).unwrap();
        assert!(out.contains("transfer-encoding: chunked\r\n"));
        assert!(out.contains("2\r\nab\r\n"));
        assert!(out.contains("3\r\ncde\r\n"));
        assert!(out.ends_with("0\r\n\r\n"));
    }
}
