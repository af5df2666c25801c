//! the HTTP/1.1 connection loop: repeatedly parse a request head, assemble
//! its body, invoke the responder, write the response, and either keep the
//! connection alive for the next request or close it (spec.md §4.2–§4.4).
//!
//! grounded on the teacher's `h1::proto::dispatcher::Dispatcher::run`, with
//! its readiness-polled `BufferedIo` replaced by a split reader/writer pair
//! and a background body-pump task, per the simplifications recorded in
//! SPEC_FULL.md.

use std::time::Duration;

use hearth_io::{
    bytes::{Buf, BytesMut},
    AsyncIo,
};
use hearth_service::Service;
use http::StatusCode;
use tokio::{io::AsyncReadExt, sync::watch};

use crate::{
    assembler::RequestAssembler,
    byte_streamer::{ByteStreamer, ByteStreamerProducer},
    config::ServerConfig,
    error::CoreError,
    h1::codec::{parse_head, BodyDecoder, ParsedHead},
    request::HTTPRequest,
    response::HTTPResponse,
    writer::ResponseWriter,
};

/// status a connection auto-replies with when `http_error_handling` is on,
/// for the error kinds that are the core's own fault to report rather than
/// the responder's (spec.md §7; `PayloadTooLarge` is deliberately excluded —
/// it only ever surfaces to a responder already consuming a body, which is
/// the one in a position to decide how to answer it).
fn auto_reply_status(e: &CoreError) -> Option<StatusCode> {
    match e {
        CoreError::MalformedRequest => Some(StatusCode::BAD_REQUEST),
        _ => None,
    }
}

/// drive one HTTP/1.1 connection to completion. returns once the
/// connection closes, either because the peer did, because a request
/// declined keep-alive, or because `shutdown` turned true between
/// requests.
pub async fn run<IO, S>(
    io: IO,
    config: &ServerConfig,
    service: &S,
    shutdown: watch::Receiver<bool>,
) -> Result<(), CoreError>
where
    IO: AsyncIo,
    S: Service<HTTPRequest, Response = HTTPResponse>,
    S::Error: Into<crate::error::BodyError>,
{
    let (mut reader, mut writer) = tokio::io::split(io);
    let mut read_buf = BytesMut::with_capacity(8 * 1024);
    let response_writer = ResponseWriter::new(config.outbound_header_validation, config.server_name.clone());

    loop {
        let (parsed, consumed) = match read_head(&mut reader, &mut read_buf, config, &shutdown).await {
            Ok(Some(head)) => head,
            Ok(None) => return Ok(()),
            Err(e) => return reply_or_propagate(&response_writer, &mut writer, config, e).await,
        };
        read_buf.advance(consumed);

        let assembler = RequestAssembler::new(config.max_streaming_buffer_size);
        let (producer, consumer) = ByteStreamer::channel(config.max_upload_size);
        let decoder = BodyDecoder::for_head(parsed.content_length, parsed.chunked);
        let keep_alive = parsed.keep_alive;

        // the pump task, when there is a body, runs concurrently with both
        // assembling the request and the responder consuming it — joining
        // it before calling the responder would serialize what streaming
        // exists to let run in parallel in the first place.
        let pump_handle = if matches!(decoder, BodyDecoder::None) {
            producer.feed_end();
            None
        } else {
            let mut pump_reader = reader;
            let mut pump_buf = read_buf;
            let max_buffered = config.max_streaming_buffer_size;
            let idle_read_timeout = config.h1_idle_timeouts.read_timeout;
            Some(tokio::task::spawn_local(async move {
                let result = pump_body(&mut pump_reader, decoder, producer, &mut pump_buf, max_buffered, idle_read_timeout).await;
                (pump_reader, pump_buf, result)
            }))
        };

        let assembled = assembler.assemble(parsed.head, parsed.content_length, consumer).await;
        let request = match assembled {
            Ok(request) => request,
            Err(e) => {
                if let Some(handle) = pump_handle {
                    if let Ok((r, b, _)) = handle.await {
                        reader = r;
                        read_buf = b;
                    }
                }
                return reply_or_propagate(&response_writer, &mut writer, config, e).await;
            }
        };

        // `request` (and the `ByteStreamer` consumer inside it, if the body
        // was streaming) is dropped the instant this future resolves. a
        // responder that never read it to completion leaves `ByteStreamer`'s
        // own `Drop` to spawn a background drain, so the pump below is never
        // left stuck waiting on a consumer that no longer exists.
        let response = service.call(request).await.map_err(|e| CoreError::Responder(e.into()))?;

        let effective_keep_alive = keep_alive && !*shutdown.borrow();
        with_idle_timeout(config.h1_idle_timeouts.write_timeout, async {
            response_writer.write_response(&mut writer, response, effective_keep_alive).await
        })
        .await?;

        // joined only to reclaim `reader`/`read_buf` for the next request; a
        // slow-draining body no longer delays the response that just went out.
        let mut pump_failed = false;
        if let Some(handle) = pump_handle {
            let (r, b, pump_result) = handle.await.map_err(|_| CoreError::ConnectionClosing)?;
            reader = r;
            read_buf = b;
            pump_failed = pump_result.is_err();
        }

        if !effective_keep_alive || pump_failed {
            tracing::trace!(keep_alive, pump_failed, shutting_down = *shutdown.borrow(), "closing http/1.1 connection");
            return Ok(());
        }
    }
}

/// bound `fut` by `timeout` when one is configured, reporting an expiry as
/// [`CoreError::ConnectionClosing`] (spec.md §4.5's idle read/write policy).
async fn with_idle_timeout<F, T>(timeout: Option<Duration>, fut: F) -> Result<T, CoreError>
where
    F: std::future::Future<Output = Result<T, CoreError>>,
{
    match timeout {
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| CoreError::ConnectionClosing)?,
        None => fut.await,
    }
}

/// when `config.http_error_handling` is on and `e` maps to a client-facing
/// status, write that response and close the connection cleanly; otherwise
/// propagate `e` to the caller, who closes without replying.
async fn reply_or_propagate<W>(
    response_writer: &ResponseWriter,
    writer: &mut W,
    config: &ServerConfig,
    e: CoreError,
) -> Result<(), CoreError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    if config.http_error_handling {
        if let Some(status) = auto_reply_status(&e) {
            let _ = with_idle_timeout(config.h1_idle_timeouts.write_timeout, async {
                response_writer.write_response(writer, HTTPResponse::new(status), false).await
            })
            .await;
            return Ok(());
        }
    }
    Err(e)
}

/// read from `reader` into `buf` until a full head is available, an idle
/// timeout fires, or the peer closes the connection cleanly between
/// requests (in which case `Ok(None)` is returned).
async fn read_head<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    config: &ServerConfig,
    shutdown: &watch::Receiver<bool>,
) -> Result<Option<(ParsedHead, usize)>, CoreError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        if let Some(parsed) = parse_head(buf, config.max_header_bytes)? {
            return Ok(Some(parsed));
        }

        if buf.is_empty() && *shutdown.borrow() {
            return Ok(None);
        }

        let n = match tokio::time::timeout(config.h1_keep_alive_timeout, reader.read_buf(buf)).await {
            Ok(result) => result?,
            Err(_) => return Err(CoreError::ConnectionClosing),
        };

        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(CoreError::MalformedRequest);
        }
    }
}

/// pump bytes from `reader`, through `decoder`, into `producer`, pausing
/// transport reads while `buffered_size` is at or above `max_buffered` and
/// resuming once the consumer has drained it below that mark (spec.md §4.1
/// backpressure contract).
async fn pump_body<R>(
    reader: &mut R,
    mut decoder: BodyDecoder,
    producer: ByteStreamerProducer,
    buf: &mut BytesMut,
    max_buffered: u64,
    idle_read_timeout: Option<Duration>,
) -> Result<(), CoreError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let resume = std::rc::Rc::new(tokio::sync::Notify::new());
    producer.set_on_consume({
        let resume = resume.clone();
        move || resume.notify_one()
    });

    loop {
        while producer.buffered_size() >= max_buffered {
            resume.notified().await;
        }

        let outcome = decoder.decode(buf)?;
        if let Some(data) = outcome.data {
            producer.feed_bytes(data);
            if producer.is_terminated() {
                // most likely max_upload_size was just exceeded; nothing
                // downstream can use more bytes off this connection's body,
                // so stop reading it rather than chase the rest of a
                // declared length nobody wants.
                return Err(CoreError::PayloadTooLarge);
            }
        }
        if outcome.done {
            producer.feed_end();
            return Ok(());
        }
        let n = with_idle_timeout(idle_read_timeout, async { reader.read_buf(buf).await.map_err(CoreError::from) }).await?;
        if n == 0 {
            tracing::debug!("connection closed while a request body was still being read");
            let err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed mid-body");
            let reported = std::io::Error::new(err.kind(), err.to_string());
            producer.feed_error(reported);
            return Err(CoreError::Transport(err));
        }
    }
}
