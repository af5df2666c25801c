//! HTTP/1.1 wire codec: head parsing via `httparse` and a compact
//! `Content-Length`/chunked body decoder.
//!
//! the teacher's `h1::proto::codec` drives a const-generic buffer and a
//! much larger `TransferCoding` state machine covering trailers, expect
//! continue and upgrade framing; this keeps only what spec.md's body
//! framing invariants require.

use hearth_io::bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};

use crate::{error::CoreError, request::RequestHead};

pub struct ParsedHead {
    pub head: RequestHead,
    pub content_length: Option<u64>,
    pub chunked: bool,
    pub keep_alive: bool,
}

const MAX_HEADERS: usize = 64;

/// attempt to parse one request head out of `buf`. returns `Ok(None)` if
/// the head is incomplete and more bytes are needed; otherwise returns the
/// parsed head and how many leading bytes of `buf` it consumed.
pub fn parse_head(buf: &[u8], max_header_bytes: usize) -> Result<Option<(ParsedHead, usize)>, CoreError> {
    if buf.len() > max_header_bytes {
        // httparse would eventually report TooManyHeaders/HeaderName errors
        // for pathological input, but a head this large is rejected outright.
        return Err(CoreError::MalformedRequest);
    }

    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut raw_headers);

    let consumed = match parsed.parse(buf).map_err(|_| CoreError::MalformedRequest)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let method = Method::from_bytes(parsed.method.ok_or(CoreError::MalformedRequest)?.as_bytes())
        .map_err(|_| CoreError::MalformedRequest)?;
    let uri: Uri = parsed.path.ok_or(CoreError::MalformedRequest)?.parse().map_err(|_| CoreError::MalformedRequest)?;
    let version = if parsed.version == Some(1) { Version::HTTP_11 } else { Version::HTTP_10 };

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    for raw in parsed.headers.iter() {
        if raw.name.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(raw.name.as_bytes()).map_err(|_| CoreError::MalformedRequest)?;
        let value = HeaderValue::from_bytes(raw.value).map_err(|_| CoreError::MalformedRequest)?;
        headers.append(name, value);
    }

    let content_length = match headers.get(http::header::CONTENT_LENGTH) {
        Some(v) => Some(v.to_str().ok().and_then(|s| s.parse::<u64>().ok()).ok_or(CoreError::MalformedRequest)?),
        None => None,
    };
    let chunked = headers
        .get(http::header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    if content_length.is_some() && chunked {
        // a request may never frame its body both ways (RFC 9112 §6.1).
        return Err(CoreError::MalformedRequest);
    }

    let keep_alive = match headers.get(http::header::CONNECTION).and_then(|v| v.to_str().ok()) {
        Some(v) if v.eq_ignore_ascii_case("close") => false,
        Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
        _ => version == Version::HTTP_11,
    };

    Ok(Some((
        ParsedHead { head: RequestHead { method, uri, version, headers }, content_length, chunked, keep_alive },
        consumed,
    )))
}

pub enum BodyDecoder {
    None,
    ContentLength { remaining: u64 },
    Chunked(ChunkedState),
}

pub enum ChunkedState {
    Size,
    Data(u64),
    DataTrailingCrlf,
    Trailer,
    Done,
}

pub struct DecodeOutcome {
    pub data: Option<Bytes>,
    pub done: bool,
}

impl BodyDecoder {
    pub fn for_head(content_length: Option<u64>, chunked: bool) -> Self {
        if chunked {
            Self::Chunked(ChunkedState::Size)
        } else {
            match content_length {
                Some(0) | None => Self::None,
                Some(n) => Self::ContentLength { remaining: n },
            }
        }
    }

    /// consume as much of `buf` as can be decoded right now. never blocks;
    /// returns `data: None, done: false` when more bytes are needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<DecodeOutcome, CoreError> {
        match self {
            Self::None => Ok(DecodeOutcome { data: None, done: true }),
            Self::ContentLength { remaining } => {
                if *remaining == 0 {
                    return Ok(DecodeOutcome { data: None, done: true });
                }
                if buf.is_empty() {
                    return Ok(DecodeOutcome { data: None, done: false });
                }
                let take = (*remaining).min(buf.len() as u64) as usize;
                let chunk = buf.split_to(take).freeze();
                *remaining -= take as u64;
                Ok(DecodeOutcome { data: Some(chunk), done: *remaining == 0 })
            }
            Self::Chunked(state) => decode_chunked(state, buf),
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn decode_chunked(state: &mut ChunkedState, buf: &mut BytesMut) -> Result<DecodeOutcome, CoreError> {
    loop {
        match state {
            ChunkedState::Size => {
                let Some(pos) = find_crlf(buf) else {
                    return Ok(DecodeOutcome { data: None, done: false });
                };
                let line = &buf[..pos];
                let size_str = line.split(|&b| b == b';').next().unwrap_or(line);
                let size_str = std::str::from_utf8(size_str).map_err(|_| CoreError::MalformedRequest)?;
                let size = u64::from_str_radix(size_str.trim(), 16).map_err(|_| CoreError::MalformedRequest)?;
                buf.advance(pos + 2);
                *state = if size == 0 { ChunkedState::Trailer } else { ChunkedState::Data(size) };
            }
            ChunkedState::Data(remaining) => {
                if buf.is_empty() {
                    return Ok(DecodeOutcome { data: None, done: false });
                }
                let take = (*remaining).min(buf.len() as u64) as usize;
                let chunk = buf.split_to(take).freeze();
                *remaining -= take as u64;
                if *remaining == 0 {
                    *state = ChunkedState::DataTrailingCrlf;
                }
                return Ok(DecodeOutcome { data: Some(chunk), done: false });
            }
            ChunkedState::DataTrailingCrlf => {
                if buf.len() < 2 {
                    return Ok(DecodeOutcome { data: None, done: false });
                }
                buf.advance(2);
                *state = ChunkedState::Size;
            }
            ChunkedState::Trailer => {
                let Some(pos) = find_crlf(buf) else {
                    return Ok(DecodeOutcome { data: None, done: false });
                };
                let blank = pos == 0;
                buf.advance(pos + 2);
                if blank {
                    *state = ChunkedState::Done;
                    return Ok(DecodeOutcome { data: None, done: true });
                }
            }
            ChunkedState::Done => return Ok(DecodeOutcome { data: None, done: true }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_head() {
        let raw = b"GET /hello HTTP/1.1\r\nHost: x\r\ncontent-length: 3\r\n\r\nabc";
        let (parsed, consumed) = parse_head(raw, 8192).unwrap().unwrap();
        assert_eq!(parsed.head.method, Method::GET);
        assert_eq!(parsed.content_length, Some(3));
        assert!(!parsed.chunked);
        assert_eq!(&raw[consumed..], b"abc");
    }

    #[test]
    fn partial_head_returns_none() {
        let raw = b"GET /hello HTTP/1.1\r\nHost: x";
        assert!(parse_head(raw, 8192).unwrap().is_none());
    }

    #[test]
    fn content_length_and_chunked_together_is_malformed() {
        let raw = b"GET / HTTP/1.1\r\ncontent-length: 1\r\ntransfer-encoding: chunked\r\n\r\n";
        assert!(matches!(parse_head(raw, 8192), Err(CoreError::MalformedRequest)));
    }

    #[test]
    fn content_length_decoder_yields_exact_bytes() {
        let mut decoder = BodyDecoder::for_head(Some(5), false);
        let mut buf = BytesMut::from(&b"hel"[..]);
        let out = decoder.decode(&mut buf).unwrap();
        assert_eq!(out.data.as_deref(), Some(&b"hel"[..]));
        assert!(!out.done);

        let mut buf = BytesMut::from(&b"lo"[..]);
        let out = decoder.decode(&mut buf).unwrap();
        assert_eq!(out.data.as_deref(), Some(&b"lo"[..]));
        assert!(out.done);
    }

    #[test]
    fn chunked_decoder_strips_framing() {
        let mut decoder = BodyDecoder::for_head(None, true);
        let mut buf = BytesMut::from(&b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"[..]);

        let mut out = Vec::new();
        loop {
            let outcome = decoder.decode(&mut buf).unwrap();
            if let Some(data) = outcome.data {
                out.extend_from_slice(&data);
            }
            if outcome.done {
                break;
            }
        }
        assert_eq!(out, b"Wikipedia");
    }
}
